//! Struggle Detector. Private to `assist`: gameplay code cannot name these
//! items, so a classification can never steer scoring or progression.

use std::collections::HashSet;

use crate::domain::SolutionAttempt;

const MIN_ATTEMPTS: usize = 3;
const RANDOM_DISTINCT_RATIO: f64 = 0.8;
const MIN_FIXATION_UNKNOWNS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum StrugglePattern {
  None,
  RandomGuessing,
  SingleVariableFixation,
  InconsistentReasoning,
}

impl StrugglePattern {
  pub(super) fn label(self) -> &'static str {
    match self {
      StrugglePattern::None => "none",
      StrugglePattern::RandomGuessing => "random_guessing",
      StrugglePattern::SingleVariableFixation => "single_variable_fixation",
      StrugglePattern::InconsistentReasoning => "inconsistent_reasoning",
    }
  }

  pub(super) fn is_struggle(self) -> bool {
    self != StrugglePattern::None
  }
}

/// Classify the ordered attempts a student made on one problem.
///
/// Fixation is checked before random guessing: three submissions that each
/// move one unknown are also all distinct, and the narrower diagnosis is the
/// more useful one. With a single unknown every guess moves "one value", so
/// fixation needs at least two.
pub(super) fn classify(attempts: &[SolutionAttempt]) -> StrugglePattern {
  if attempts.len() < MIN_ATTEMPTS {
    return StrugglePattern::None;
  }
  let incorrect: Vec<&SolutionAttempt> = attempts.iter().filter(|a| !a.is_consistent).collect();
  if incorrect.len() < MIN_ATTEMPTS {
    return StrugglePattern::None;
  }

  let first: Vec<f64> = incorrect[0].submitted_solution.values().copied().collect();
  let fixated = first.len() >= MIN_FIXATION_UNKNOWNS && incorrect.iter().all(|a| {
    let current: Vec<f64> = a.submitted_solution.values().copied().collect();
    let changed = first
      .iter()
      .enumerate()
      .filter(|(i, v)| current.get(*i) != Some(*v))
      .count();
    changed <= 1
  });
  if fixated {
    return StrugglePattern::SingleVariableFixation;
  }

  let distinct: HashSet<String> = incorrect
    .iter()
    .map(|a| serde_json::to_string(&a.submitted_solution).unwrap_or_default())
    .collect();
  if distinct.len() as f64 / incorrect.len() as f64 > RANDOM_DISTINCT_RATIO {
    return StrugglePattern::RandomGuessing;
  }

  StrugglePattern::InconsistentReasoning
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Values;
  use uuid::Uuid;

  fn attempt(values: &[(&str, f64)], consistent: bool) -> SolutionAttempt {
    SolutionAttempt {
      id: Uuid::new_v4(),
      problem_id: "1.1".into(),
      student_id: "s".into(),
      block_id: 1,
      level_id: 1,
      timestamp: 0,
      submitted_solution: values.iter().map(|(k, v)| (k.to_string(), *v)).collect::<Values>(),
      is_consistent: consistent,
    }
  }

  fn wrong(a: f64, b: f64) -> SolutionAttempt {
    attempt(&[("a", a), ("b", b)], false)
  }

  #[test]
  fn too_little_evidence_is_none() {
    assert_eq!(classify(&[]), StrugglePattern::None);
    assert_eq!(classify(&[wrong(1.0, 1.0), wrong(2.0, 9.0)]), StrugglePattern::None);
    let mostly_right = [wrong(1.0, 1.0), wrong(7.0, 2.0), attempt(&[("a", 3.0), ("b", 5.0)], true)];
    assert_eq!(classify(&mostly_right), StrugglePattern::None);
  }

  #[test]
  fn unrelated_guesses_are_random() {
    let attempts = [wrong(1.0, 1.0), wrong(7.0, 2.0), wrong(4.0, 9.0)];
    assert_eq!(classify(&attempts), StrugglePattern::RandomGuessing);
  }

  #[test]
  fn moving_one_unknown_is_fixation() {
    let attempts = [wrong(1.0, 5.0), wrong(2.0, 5.0), wrong(4.0, 5.0)];
    assert_eq!(classify(&attempts), StrugglePattern::SingleVariableFixation);
  }

  #[test]
  fn single_unknown_guesses_are_random_not_fixation() {
    let guess = |v: f64| attempt(&[("triangle", v)], false);
    assert_eq!(classify(&[guess(1.0), guess(7.0), guess(2.0)]), StrugglePattern::RandomGuessing);
    assert_eq!(
      classify(&[guess(1.0), guess(7.0), guess(1.0), guess(7.0), guess(1.0)]),
      StrugglePattern::InconsistentReasoning
    );
  }

  #[test]
  fn missing_value_counts_as_a_change() {
    let attempts = [wrong(1.0, 5.0), attempt(&[("a", 2.0)], false), wrong(6.0, 6.0)];
    assert_eq!(classify(&attempts), StrugglePattern::RandomGuessing);
  }

  #[test]
  fn repeating_two_way_swaps_is_inconsistent() {
    let attempts = [wrong(1.0, 1.0), wrong(2.0, 2.0), wrong(1.0, 1.0), wrong(2.0, 2.0), wrong(1.0, 1.0)];
    assert_eq!(classify(&attempts), StrugglePattern::InconsistentReasoning);
  }

  #[test]
  fn labels_are_stable() {
    assert_eq!(StrugglePattern::SingleVariableFixation.label(), "single_variable_fixation");
    assert!(!StrugglePattern::None.is_struggle());
  }
}
