//! Domain models: the curriculum document (blocks → levels → problems) and the
//! append-only `SolutionAttempt` fact.
//!
//! The document types mirror the JSON problem bank field for field (camelCase on
//! the wire) and are never mutated after the catalog is loaded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::StarRating;

/// Unknown symbol → numeric value. Ordered by symbol so positional comparisons
/// and serializations are stable.
pub type Values = BTreeMap<String, f64>;

pub type ProblemId = String;

/// One shape equation, e.g. `star + star + circle = 14`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Equation {
  pub parts: Vec<String>,
  pub equals: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub id: ProblemId,
  #[serde(default)] pub title: Option<String>,
  pub equations: Vec<Equation>,
  pub unknowns: Vec<String>,
  pub solution: Values,
  #[serde(default)] pub hints: Vec<String>,
  #[serde(default)] pub checkpoint: bool,
}

impl Problem {
  /// Plain-text rendering of the equations, one per line.
  pub fn describe(&self) -> String {
    self.equations
      .iter()
      .map(|eq| format!("{} = {}", eq.parts.join(" + "), fmt_number(eq.equals)))
      .collect::<Vec<_>>()
      .join("\n")
  }
}

fn fmt_number(v: f64) -> String {
  if v.fract() == 0.0 { format!("{}", v as i64) } else { format!("{}", v) }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstructorNote {
  #[serde(default)] pub common_errors: Vec<String>,
  #[serde(default)] pub guiding_questions: Vec<String>,
  #[serde(default)] pub intervention: String,
  #[serde(default)] pub limit_line: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
  pub id: u32,
  pub title: String,
  #[serde(default)] pub focus: String,
  #[serde(default)] pub main_skill: String,
  #[serde(default)] pub mental_sentence: String,
  #[serde(default)] pub instructor_note: InstructorNote,
  /// Solve order.
  pub problems: Vec<Problem>,
}

impl Level {
  pub fn problem_ids(&self) -> impl Iterator<Item = &str> {
    self.problems.iter().map(|p| p.id.as_str())
  }

  pub fn position_of(&self, problem_id: &str) -> Option<usize> {
    self.problems.iter().position(|p| p.id == problem_id)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
  pub title: String,
  pub problem: Problem,
  #[serde(default)] pub pass_condition: String,
  #[serde(default)] pub fail_condition: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
  pub id: u32,
  pub title: String,
  #[serde(default)] pub rationale: String,
  pub levels: Vec<Level>,
  #[serde(default)] pub checkpoint: Option<Checkpoint>,
}

impl Block {
  pub fn is_checkpoint(&self, problem_id: &str) -> bool {
    self.checkpoint.as_ref().is_some_and(|c| c.problem.id == problem_id)
  }
}

/// Root of the problem bank document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemBank {
  #[serde(default)] pub app_name: String,
  #[serde(default)] pub app_description: String,
  pub blocks: Vec<Block>,
}

/// Append-only record of one submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionAttempt {
  pub id: Uuid,
  pub problem_id: ProblemId,
  pub student_id: String,
  pub block_id: u32,
  pub level_id: u32,
  pub timestamp: u64,
  pub submitted_solution: Values,
  pub is_consistent: bool,
}

/// One solved problem in a student's history. At most one entry per problem:
/// a re-solve overwrites the earlier entry in place.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub problem_id: ProblemId,
  pub correct: bool,
  pub hints: u32,
  pub attempts: u32,
  pub stars: StarRating,
  #[serde(default)] pub points: u32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn problem_document_uses_camel_case_and_defaults() {
    let json = r#"{
      "id": "1.1",
      "equations": [{ "parts": ["star", "star"], "equals": 10 }],
      "unknowns": ["star"],
      "solution": { "star": 5 }
    }"#;
    let p: Problem = serde_json::from_str(json).unwrap();
    assert_eq!(p.solution["star"], 5.0);
    assert!(p.hints.is_empty());
    assert!(!p.checkpoint);
    assert_eq!(p.describe(), "star + star = 10");
  }
}
