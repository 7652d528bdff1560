//! Curriculum Catalog: the read-only block → level → problem hierarchy.
//!
//! Loaded once at startup (JSON file or the built-in seed course) and shared as
//! `Arc<Catalog>`. Structural invariants are checked at load time; a violation
//! is a fatal configuration error, never something gameplay has to cope with.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{Block, Level, Problem, ProblemBank};

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("IO error reading catalog: {0}")]
  Io(#[from] std::io::Error),
  #[error("catalog JSON parse error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("invalid catalog: {0}")]
  Invalid(String),
  #[error("block {0} not found")]
  BlockNotFound(u32),
  #[error("level {level_id} not found in block {block_id}")]
  LevelNotFound { block_id: u32, level_id: u32 },
  #[error("problem '{problem_id}' not found in block {block_id} level {level_id}")]
  ProblemNotFound { block_id: u32, level_id: u32, problem_id: String },
}

/// Where a student stands in the course. A checkpoint keeps the level id of the
/// block's last level.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
  pub block_id: u32,
  pub level_id: u32,
  pub problem_id: String,
}

impl Position {
  pub fn new(block_id: u32, level_id: u32, problem_id: impl Into<String>) -> Self {
    Self { block_id, level_id, problem_id: problem_id.into() }
  }
}

/// A gate in the course order: every level, then the block checkpoint if any.
#[derive(Clone, Copy, Debug)]
pub enum Unit<'a> {
  Level { block: &'a Block, level: &'a Level },
  Checkpoint { block: &'a Block },
}

#[derive(Debug)]
pub struct Catalog {
  bank: ProblemBank,
}

impl Catalog {
  /// Validate and wrap an already parsed problem bank.
  pub fn new(bank: ProblemBank) -> Result<Self, CatalogError> {
    validate(&bank)?;
    let problems: usize = bank.blocks
      .iter()
      .map(|b| b.levels.iter().map(|l| l.problems.len()).sum::<usize>() + b.checkpoint.iter().count())
      .sum();
    info!(target: "catalog", app = %bank.app_name, blocks = bank.blocks.len(), problems, "Catalog loaded");
    Ok(Self { bank })
  }

  pub fn from_json(json: &str) -> Result<Self, CatalogError> {
    let bank: ProblemBank = serde_json::from_str(json)?;
    Self::new(bank)
  }

  pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_json(&content)
  }

  pub fn app_name(&self) -> &str {
    &self.bank.app_name
  }

  pub fn app_description(&self) -> &str {
    &self.bank.app_description
  }

  pub fn blocks(&self) -> &[Block] {
    &self.bank.blocks
  }

  pub fn get_block(&self, block_id: u32) -> Option<&Block> {
    self.bank.blocks.iter().find(|b| b.id == block_id)
  }

  pub fn get_level(&self, block_id: u32, level_id: u32) -> Option<&Level> {
    self.get_block(block_id)?.levels.iter().find(|l| l.id == level_id)
  }

  /// Level problems first, then the block checkpoint. A checkpoint lives under
  /// the block's last level, the same position `locate` gives it.
  pub fn get_problem(&self, block_id: u32, level_id: u32, problem_id: &str) -> Option<&Problem> {
    let block = self.get_block(block_id)?;
    let level = block.levels.iter().find(|l| l.id == level_id)?;
    if let Some(p) = level.problems.iter().find(|p| p.id == problem_id) {
      return Some(p);
    }
    if block.levels.last().map(|l| l.id) != Some(level_id) {
      return None;
    }
    block.checkpoint
      .as_ref()
      .map(|c| &c.problem)
      .filter(|p| p.id == problem_id)
  }

  pub fn problem_at(&self, at: &Position) -> Result<&Problem, CatalogError> {
    self.get_problem(at.block_id, at.level_id, &at.problem_id)
      .ok_or_else(|| CatalogError::ProblemNotFound {
        block_id: at.block_id,
        level_id: at.level_id,
        problem_id: at.problem_id.clone(),
      })
  }

  pub fn block_at(&self, block_id: u32) -> Result<&Block, CatalogError> {
    self.get_block(block_id).ok_or(CatalogError::BlockNotFound(block_id))
  }

  pub fn level_at(&self, block_id: u32, level_id: u32) -> Result<&Level, CatalogError> {
    self.get_level(block_id, level_id)
      .ok_or(CatalogError::LevelNotFound { block_id, level_id })
  }

  pub fn block_index(&self, block_id: u32) -> Option<usize> {
    self.bank.blocks.iter().position(|b| b.id == block_id)
  }

  /// First problem of the first level of the first block.
  pub fn first_position(&self) -> Position {
    // Non-empty by validation.
    let block = &self.bank.blocks[0];
    first_of_block(block)
  }

  /// Find the canonical position of a problem id anywhere in the course.
  pub fn locate(&self, problem_id: &str) -> Option<Position> {
    for block in &self.bank.blocks {
      for level in &block.levels {
        if level.problems.iter().any(|p| p.id == problem_id) {
          return Some(Position::new(block.id, level.id, problem_id));
        }
      }
      if block.is_checkpoint(problem_id) {
        let last = block.levels.last()?;
        return Some(Position::new(block.id, last.id, problem_id));
      }
    }
    None
  }

  /// Course order used for unlocking.
  pub fn units(&self) -> Vec<Unit<'_>> {
    let mut out = Vec::new();
    for block in &self.bank.blocks {
      for level in &block.levels {
        out.push(Unit::Level { block, level });
      }
      if block.checkpoint.is_some() {
        out.push(Unit::Checkpoint { block });
      }
    }
    out
  }
}

pub(crate) fn first_of_block(block: &Block) -> Position {
  let level = &block.levels[0];
  Position::new(block.id, level.id, level.problems[0].id.clone())
}

fn validate(bank: &ProblemBank) -> Result<(), CatalogError> {
  if bank.blocks.is_empty() {
    return Err(CatalogError::Invalid("catalog has no blocks".into()));
  }
  let mut block_ids = HashSet::new();
  let mut problem_ids = HashSet::new();

  for block in &bank.blocks {
    if !block_ids.insert(block.id) {
      return Err(CatalogError::Invalid(format!("duplicate block id {}", block.id)));
    }
    if block.levels.is_empty() {
      return Err(CatalogError::Invalid(format!("block {} has no levels", block.id)));
    }
    let mut level_ids = HashSet::new();
    for level in &block.levels {
      if !level_ids.insert(level.id) {
        return Err(CatalogError::Invalid(format!("duplicate level id {} in block {}", level.id, block.id)));
      }
      if level.problems.is_empty() {
        return Err(CatalogError::Invalid(format!("level {} in block {} has no problems", level.id, block.id)));
      }
      for p in &level.problems {
        check_problem(p, &mut problem_ids)?;
      }
    }
    if let Some(cp) = &block.checkpoint {
      check_problem(&cp.problem, &mut problem_ids)?;
    }
  }
  Ok(())
}

fn check_problem<'a>(p: &'a Problem, seen: &mut HashSet<&'a str>) -> Result<(), CatalogError> {
  if !seen.insert(p.id.as_str()) {
    return Err(CatalogError::Invalid(format!("duplicate problem id '{}'", p.id)));
  }
  if p.solution.is_empty() {
    return Err(CatalogError::Invalid(format!("problem '{}' has an empty solution", p.id)));
  }
  if let Some(u) = p.unknowns.iter().find(|u| !p.solution.contains_key(*u)) {
    return Err(CatalogError::Invalid(format!("problem '{}' has no solution value for '{}'", p.id, u)));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::seed_problem_bank;

  fn seed() -> Catalog {
    Catalog::new(seed_problem_bank()).unwrap()
  }

  #[test]
  fn seed_course_validates() {
    let c = seed();
    assert_eq!(c.first_position(), Position::new(1, 1, "1.1"));
  }

  #[test]
  fn get_problem_falls_back_to_checkpoint() {
    let c = seed();
    let block = c.get_block(1).unwrap();
    let cp_id = block.checkpoint.as_ref().unwrap().problem.id.clone();
    let last_level = block.levels.last().unwrap().id;
    assert!(c.get_problem(1, last_level, &cp_id).is_some());
    assert!(c.get_problem(1, 1, "nope").is_none());
    assert!(c.get_problem(99, 1, "1.1").is_none());
  }

  #[test]
  fn checkpoint_needs_a_real_level() {
    let c = seed();
    assert!(c.get_problem(1, 1, "CP1").is_none());
    assert!(c.get_problem(1, 99, "CP1").is_none());
    assert!(matches!(
      c.problem_at(&Position::new(1, 99, "CP1")),
      Err(CatalogError::ProblemNotFound { level_id: 99, .. })
    ));
  }

  #[test]
  fn locate_finds_levels_and_checkpoints() {
    let c = seed();
    assert_eq!(c.locate("1.2"), Some(Position::new(1, 1, "1.2")));
    let cp = c.locate("CP1").unwrap();
    assert_eq!(cp.block_id, 1);
    assert_eq!(cp.level_id, c.get_block(1).unwrap().levels.last().unwrap().id);
    assert!(c.locate("missing").is_none());
  }

  #[test]
  fn empty_level_is_rejected_loudly() {
    let mut bank = seed_problem_bank();
    bank.blocks[0].levels[0].problems.clear();
    let err = Catalog::new(bank).unwrap_err();
    assert!(matches!(err, CatalogError::Invalid(msg) if msg.contains("has no problems")));
  }

  #[test]
  fn duplicate_problem_ids_are_rejected() {
    let mut bank = seed_problem_bank();
    let dup = bank.blocks[0].levels[0].problems[0].clone();
    bank.blocks[0].levels[0].problems.push(dup);
    assert!(Catalog::new(bank).is_err());
  }

  #[test]
  fn unknown_without_solution_is_rejected() {
    let mut bank = seed_problem_bank();
    bank.blocks[0].levels[0].problems[0].unknowns.push("hexagon".into());
    assert!(Catalog::new(bank).is_err());
  }

  #[test]
  fn units_follow_course_order() {
    let c = seed();
    let units = c.units();
    // block 1: two levels + checkpoint; block 2: one level.
    assert_eq!(units.len(), 4);
    assert!(matches!(units[2], Unit::Checkpoint { block } if block.id == 1));
  }
}
