//! Student metrics for the parental progress report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::struggle::classify;
use crate::catalog::Catalog;
use crate::domain::{HistoryEntry, SolutionAttempt};

/// Percentages are whole numbers in 0..=100.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMetrics {
  pub student_name: String,
  pub challenges_completed: u32,
  /// Share of hard-won solves (more than one attempt) finished without hints.
  pub patience_score: u32,
  /// Share of problems with a detected struggle that were still solved.
  pub strategy_adaptation_score: u32,
  /// Share of solves on the first attempt.
  pub focus_score: u32,
  pub strengths: Vec<String>,
  pub struggles: Vec<String>,
}

fn percent(part: usize, whole: usize, empty: u32) -> u32 {
  if whole == 0 { empty } else { ((part * 100) as f64 / whole as f64).round() as u32 }
}

pub(super) fn compute_metrics(
  catalog: &Catalog,
  student_name: &str,
  history: &[HistoryEntry],
  attempts: &[SolutionAttempt],
) -> StudentMetrics {
  let solved: Vec<&HistoryEntry> = history.iter().filter(|h| h.correct).collect();
  let is_solved = |id: &str| solved.iter().any(|h| h.problem_id == id);

  let first_try = solved.iter().filter(|h| h.attempts <= 1).count();
  let hard_won: Vec<&&HistoryEntry> = solved.iter().filter(|h| h.attempts > 1).collect();
  let unaided = hard_won.iter().filter(|h| h.hints == 0).count();

  let mut by_problem: BTreeMap<&str, Vec<SolutionAttempt>> = BTreeMap::new();
  for a in attempts {
    by_problem.entry(a.problem_id.as_str()).or_default().push(a.clone());
  }
  let struggled: Vec<&str> = by_problem
    .iter()
    .filter(|(_, list)| classify(list).is_struggle())
    .map(|(id, _)| *id)
    .collect();
  let recovered = struggled.iter().filter(|id| is_solved(**id)).count();

  let mut strengths = Vec::new();
  let mut struggles = Vec::new();
  for block in catalog.blocks() {
    for level in &block.levels {
      let skill = if level.main_skill.is_empty() { level.title.clone() } else { level.main_skill.clone() };
      let entries: Vec<&&HistoryEntry> = solved
        .iter()
        .filter(|h| level.position_of(&h.problem_id).is_some())
        .collect();
      if entries.len() == level.problems.len() {
        let total: u32 = entries.iter().map(|h| u8::from(h.stars) as u32).sum();
        if total as f64 / entries.len() as f64 >= 2.0 {
          strengths.push(skill.clone());
        }
      }
      if struggled.iter().any(|id| level.position_of(id).is_some()) {
        struggles.push(skill);
      }
    }
  }
  strengths.dedup();
  struggles.dedup();

  StudentMetrics {
    student_name: student_name.to_string(),
    challenges_completed: solved.len() as u32,
    patience_score: percent(unaided, hard_won.len(), 100),
    strategy_adaptation_score: percent(recovered, struggled.len(), 100),
    focus_score: percent(first_try, solved.len(), 0),
    strengths,
    struggles,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Values;
  use crate::scoring::StarRating;
  use crate::seeds::seed_problem_bank;
  use uuid::Uuid;

  fn entry(id: &str, attempts: u32, hints: u32, stars: StarRating) -> HistoryEntry {
    HistoryEntry { problem_id: id.into(), correct: true, hints, attempts, stars, points: u8::from(stars) as u32 }
  }

  fn wrong(problem: &str, a: f64, b: f64) -> SolutionAttempt {
    SolutionAttempt {
      id: Uuid::new_v4(),
      problem_id: problem.into(),
      student_id: "s".into(),
      block_id: 1,
      level_id: 1,
      timestamp: 0,
      submitted_solution: Values::from([("a".to_string(), a), ("b".to_string(), b)]),
      is_consistent: false,
    }
  }

  #[test]
  fn empty_history_reads_neutral() {
    let c = Catalog::new(seed_problem_bank()).unwrap();
    let m = compute_metrics(&c, "Ana", &[], &[]);
    assert_eq!(m.challenges_completed, 0);
    assert_eq!((m.patience_score, m.strategy_adaptation_score, m.focus_score), (100, 100, 0));
    assert!(m.strengths.is_empty() && m.struggles.is_empty());
  }

  #[test]
  fn metrics_reflect_history_and_struggles() {
    let c = Catalog::new(seed_problem_bank()).unwrap();
    let level_one_skill = {
      let l = c.get_level(1, 1).unwrap();
      if l.main_skill.is_empty() { l.title.clone() } else { l.main_skill.clone() }
    };
    let history = vec![
      entry("1.1", 1, 0, StarRating::Three),
      entry("1.2", 4, 0, StarRating::One),
    ];
    let attempts = vec![wrong("1.2", 1.0, 1.0), wrong("1.2", 7.0, 2.0), wrong("1.2", 4.0, 9.0)];

    let m = compute_metrics(&c, "Ana", &history, &attempts);
    assert_eq!(m.challenges_completed, 2);
    assert_eq!(m.focus_score, 50);
    assert_eq!(m.patience_score, 100);
    assert_eq!(m.strategy_adaptation_score, 100);
    assert_eq!(m.strengths, vec![level_one_skill.clone()]);
    assert_eq!(m.struggles, vec![level_one_skill]);
  }
}
