//! Evaluation Engine: decides whether a submitted mapping solves a problem.
//!
//! Exact numeric equality on every expected unknown. Extra keys are ignored, a
//! missing key is a wrong answer. Anything that is not a finite number is
//! dropped during coercion, so malformed input can only ever evaluate as
//! incorrect.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::Values;

/// Submission as it arrives on the wire: whatever the form fields held.
pub type RawValues = BTreeMap<String, Value>;

pub fn evaluate(expected: &Values, submitted: &Values) -> bool {
  expected
    .iter()
    .all(|(symbol, want)| submitted.get(symbol).is_some_and(|got| got == want))
}

/// Coerce one form value to a number. Numeric strings are accepted, blanks and
/// everything else are not.
pub fn coerce(v: &Value) -> Option<f64> {
  let n = match v {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => {
      let s = s.trim();
      if s.is_empty() { return None; }
      s.parse::<f64>().ok()?
    }
    _ => return None,
  };
  n.is_finite().then_some(n)
}

/// Keep only the entries that coerce to finite numbers.
pub fn normalize(raw: &RawValues) -> Values {
  raw.iter()
    .filter_map(|(k, v)| coerce(v).map(|n| (k.clone(), n)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn values(pairs: &[(&str, f64)]) -> Values {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
  }

  fn raw(v: Value) -> RawValues {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn exact_match_is_correct() {
    let s = values(&[("a", 3.0), ("b", 5.0)]);
    assert!(evaluate(&s, &values(&[("a", 3.0), ("b", 5.0)])));
  }

  #[test]
  fn one_wrong_value_is_incorrect() {
    let s = values(&[("a", 3.0), ("b", 5.0)]);
    assert!(!evaluate(&s, &values(&[("a", 3.0), ("b", 6.0)])));
  }

  #[test]
  fn missing_key_is_incorrect_extra_key_is_ignored() {
    let s = values(&[("a", 3.0), ("b", 5.0)]);
    assert!(!evaluate(&s, &values(&[("a", 3.0)])));
    assert!(evaluate(&s, &values(&[("a", 3.0), ("b", 5.0), ("c", 99.0)])));
  }

  #[test]
  fn no_tolerance_is_applied() {
    let s = values(&[("a", 3.0)]);
    assert!(!evaluate(&s, &values(&[("a", 3.0000001)])));
  }

  #[test]
  fn numeric_strings_coerce_garbage_does_not() {
    let n = normalize(&raw(json!({ "a": "3", "b": " 5 ", "c": "five", "d": null, "e": true, "f": "" })));
    assert_eq!(n, values(&[("a", 3.0), ("b", 5.0)]));
  }

  #[test]
  fn malformed_submission_fails_closed() {
    let s = values(&[("a", 3.0), ("b", 5.0)]);
    let n = normalize(&raw(json!({ "a": 3, "b": "abc" })));
    assert!(!evaluate(&s, &n));
  }
}
