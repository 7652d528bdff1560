//! Progression Resolver: where does a student go after solving the current problem?
//!
//! Two strategies share the `Resolver` interface because they disagree when
//! problems are solved out of order:
//! - `Linear` walks the course strictly by position (problem → level →
//!   checkpoint → block → end), ignoring history.
//! - `HistoryDriven` looks at the last correctly solved problem of the current
//!   level and continues after it; used by free-navigation flows.
//!
//! Both are pure: same catalog, history and position give the same answer.

use serde::{Deserialize, Serialize};

use crate::catalog::{first_of_block, Catalog, CatalogError, Position, Unit};
use crate::domain::{Block, HistoryEntry, Level};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Next {
  /// Next problem inside the same level.
  Problem(Position),
  /// Level finished; first problem of the following level.
  LevelComplete(Position),
  /// Last level finished; the block checkpoint.
  Checkpoint(Position),
  /// Block finished; first problem of the following block.
  BlockComplete(Position),
  CourseComplete,
}

impl Next {
  pub fn position(&self) -> Option<&Position> {
    match self {
      Next::Problem(p) | Next::LevelComplete(p) | Next::Checkpoint(p) | Next::BlockComplete(p) => Some(p),
      Next::CourseComplete => None,
    }
  }

  pub fn crosses_level(&self) -> bool {
    matches!(self, Next::LevelComplete(_) | Next::BlockComplete(_))
  }
}

/// History-driven answer within a single level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelStep<'a> {
  Problem(&'a str),
  LevelComplete,
}

pub trait Resolver: Send + Sync {
  fn name(&self) -> &'static str;
  fn next(&self, catalog: &Catalog, history: &[HistoryEntry], at: &Position) -> Result<Next, CatalogError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

#[derive(Clone, Copy, Debug, Default)]
pub struct HistoryDriven;

impl Resolver for Linear {
  fn name(&self) -> &'static str { "linear" }

  fn next(&self, catalog: &Catalog, _history: &[HistoryEntry], at: &Position) -> Result<Next, CatalogError> {
    next_linear(catalog, at)
  }
}

impl Resolver for HistoryDriven {
  fn name(&self) -> &'static str { "history" }

  fn next(&self, catalog: &Catalog, history: &[HistoryEntry], at: &Position) -> Result<Next, CatalogError> {
    let block = catalog.block_at(at.block_id)?;
    if block.is_checkpoint(&at.problem_id) {
      return Ok(after_checkpoint(catalog, block));
    }
    catalog.problem_at(at)?;
    let level = catalog.level_at(at.block_id, at.level_id)?;
    match next_in_level(history, level) {
      LevelStep::Problem(id) => Ok(Next::Problem(Position::new(block.id, level.id, id))),
      LevelStep::LevelComplete => Ok(after_level(catalog, block, level)),
    }
  }
}

/// Which strategy a deployment advances with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionMode {
  #[default]
  Linear,
  History,
}

impl ProgressionMode {
  pub fn resolver(self) -> &'static dyn Resolver {
    match self {
      ProgressionMode::Linear => &Linear,
      ProgressionMode::History => &HistoryDriven,
    }
  }
}

/// Strict positional successor of `at`.
pub fn next_linear(catalog: &Catalog, at: &Position) -> Result<Next, CatalogError> {
  let block = catalog.block_at(at.block_id)?;
  if block.is_checkpoint(&at.problem_id) {
    return Ok(after_checkpoint(catalog, block));
  }
  let level = catalog.level_at(at.block_id, at.level_id)?;
  let idx = level.position_of(&at.problem_id).ok_or_else(|| CatalogError::ProblemNotFound {
    block_id: at.block_id,
    level_id: at.level_id,
    problem_id: at.problem_id.clone(),
  })?;

  if let Some(p) = level.problems.get(idx + 1) {
    return Ok(Next::Problem(Position::new(block.id, level.id, p.id.clone())));
  }
  Ok(after_level(catalog, block, level))
}

/// Continue after the last correctly solved problem of `level`; first problem
/// if nothing in the level is solved yet.
pub fn next_in_level<'a>(history: &[HistoryEntry], level: &'a Level) -> LevelStep<'a> {
  let last_solved = history
    .iter()
    .rev()
    .filter(|h| h.correct)
    .find_map(|h| level.position_of(&h.problem_id));

  match last_solved {
    None => LevelStep::Problem(&level.problems[0].id),
    Some(i) => match level.problems.get(i + 1) {
      Some(p) => LevelStep::Problem(&p.id),
      None => LevelStep::LevelComplete,
    },
  }
}

/// Navigation gate: the unit containing `at` is open when it is the first unit
/// of the course or the unit before it is complete.
pub fn is_unlocked(catalog: &Catalog, history: &[HistoryEntry], at: &Position) -> Result<bool, CatalogError> {
  catalog.problem_at(at)?;
  let block = catalog.block_at(at.block_id)?;
  let on_checkpoint = block.is_checkpoint(&at.problem_id);

  let units = catalog.units();
  let idx = units
    .iter()
    .position(|u| match *u {
      Unit::Checkpoint { block: b } => on_checkpoint && b.id == at.block_id,
      Unit::Level { block: b, level } => !on_checkpoint && b.id == at.block_id && level.id == at.level_id,
    })
    .ok_or(CatalogError::LevelNotFound { block_id: at.block_id, level_id: at.level_id })?;

  if idx == 0 {
    return Ok(true);
  }
  Ok(match units[idx - 1] {
    Unit::Level { level, .. } => level_complete(history, level),
    Unit::Checkpoint { block } => block
      .checkpoint
      .as_ref()
      .is_some_and(|cp| history.iter().any(|h| h.correct && h.problem_id == cp.problem.id)),
  })
}

/// Every problem solved, or the history-driven walk has run off the end.
fn level_complete(history: &[HistoryEntry], level: &Level) -> bool {
  let solved = |id: &str| history.iter().any(|h| h.correct && h.problem_id == id);
  level.problem_ids().all(solved) || next_in_level(history, level) == LevelStep::LevelComplete
}

fn after_checkpoint(catalog: &Catalog, block: &Block) -> Next {
  match next_block(catalog, block) {
    Some(nb) => Next::BlockComplete(first_of_block(nb)),
    None => Next::CourseComplete,
  }
}

fn after_level(catalog: &Catalog, block: &Block, level: &Level) -> Next {
  let li = block.levels.iter().position(|l| l.id == level.id).unwrap_or(block.levels.len());
  if let Some(nl) = block.levels.get(li + 1) {
    return Next::LevelComplete(Position::new(block.id, nl.id, nl.problems[0].id.clone()));
  }
  if let Some(cp) = &block.checkpoint {
    return Next::Checkpoint(Position::new(block.id, level.id, cp.problem.id.clone()));
  }
  match next_block(catalog, block) {
    Some(nb) => Next::BlockComplete(first_of_block(nb)),
    None => Next::CourseComplete,
  }
}

fn next_block<'a>(catalog: &'a Catalog, block: &Block) -> Option<&'a Block> {
  let bi = catalog.block_index(block.id)?;
  catalog.blocks().get(bi + 1)
}
