//! Scoring / Mastery Calculator.
//!
//! Two generations of the same idea, selectable per configuration:
//! - `Stars`: a 1–3 mastery rating from attempts and hints.
//! - `Points`: 100 base, −15 per hint, −5 per extra attempt, +50 for a clean
//!   first-try solve, never below 10.
//!
//! `attempts` counts the correct submission itself, so a first-try solve is 1.

use serde::{Deserialize, Serialize};

const BASE_POINTS: i64 = 100;
const HINT_PENALTY: i64 = 15;
const ATTEMPT_PENALTY: i64 = 5;
const PERFECT_BONUS: i64 = 50;
const MIN_POINTS: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StarRating {
  One = 1,
  Two = 2,
  Three = 3,
}

impl From<StarRating> for u8 {
  fn from(s: StarRating) -> u8 { s as u8 }
}

impl TryFrom<u8> for StarRating {
  type Error = String;
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      1 => Ok(StarRating::One),
      2 => Ok(StarRating::Two),
      3 => Ok(StarRating::Three),
      other => Err(format!("star rating out of range: {other}")),
    }
  }
}

/// Mastery stars. Ties go to the student: the best matching band wins.
pub fn rate(attempts: u32, hints: u32) -> StarRating {
  let attempts = attempts.max(1);
  if hints == 0 && attempts == 1 {
    StarRating::Three
  } else if hints <= 1 && attempts <= 2 {
    StarRating::Two
  } else {
    StarRating::One
  }
}

pub fn points(attempts: u32, hints: u32) -> u32 {
  let attempts = attempts.max(1) as i64;
  let hints = hints as i64;
  let mut p = BASE_POINTS - hints * HINT_PENALTY - (attempts - 1) * ATTEMPT_PENALTY;
  if hints == 0 && attempts == 1 {
    p += PERFECT_BONUS;
  }
  p.max(MIN_POINTS) as u32
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
  #[default]
  Stars,
  Points,
}

/// Result of one correct solve. `points` is what the active policy adds to the
/// cumulative score (the star count itself under `Stars`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Award {
  pub stars: StarRating,
  pub points: u32,
}

impl ScoringPolicy {
  pub fn award(self, attempts: u32, hints: u32) -> Award {
    let stars = rate(attempts, hints);
    let points = match self {
      ScoringPolicy::Stars => u8::from(stars) as u32,
      ScoringPolicy::Points => points(attempts, hints),
    };
    Award { stars, points }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn star_bands() {
    assert_eq!(rate(1, 0), StarRating::Three);
    assert_eq!(rate(2, 1), StarRating::Two);
    assert_eq!(rate(1, 1), StarRating::Two);
    assert_eq!(rate(2, 0), StarRating::Two);
    assert_eq!(rate(3, 2), StarRating::One);
    assert_eq!(rate(5, 0), StarRating::One);
    assert_eq!(rate(1, 2), StarRating::One);
  }

  #[test]
  fn zero_attempts_reads_as_first_try() {
    assert_eq!(rate(0, 0), StarRating::Three);
    assert_eq!(points(0, 0), 150);
  }

  #[test]
  fn points_policy() {
    assert_eq!(points(1, 0), 150);
    assert_eq!(points(3, 2), 60);
    assert_eq!(points(2, 0), 95);
    assert_eq!(points(1, 1), 85);
  }

  #[test]
  fn points_floor_at_ten() {
    assert_eq!(points(20, 6), 10);
    assert_eq!(points(1, 100), 10);
  }

  #[test]
  fn award_follows_policy() {
    assert_eq!(ScoringPolicy::Stars.award(1, 0), Award { stars: StarRating::Three, points: 3 });
    assert_eq!(ScoringPolicy::Points.award(1, 0), Award { stars: StarRating::Three, points: 150 });
  }

  #[test]
  fn stars_serialize_as_numbers() {
    assert_eq!(serde_json::to_string(&StarRating::Two).unwrap(), "2");
    let s: StarRating = serde_json::from_str("3").unwrap();
    assert_eq!(s, StarRating::Three);
    assert!(serde_json::from_str::<StarRating>("4").is_err());
  }
}
