//! Values attached to (entity, key) pairs.
//!
//! Keys are entities themselves; the store maps `(EntityId, EntityId)` to a
//! [`Value`]. [`Annotation`] is the distinguished confidence value that is
//! replicated under the reserved annotation key.

use serde::{Deserialize, Serialize};

/// A confidence annotation: how strongly, and how surely, something holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub strength: f64,
    pub confidence: f64,
}

/// Typed data attached to an (entity, key) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Value {
    FloatValue { floats: Vec<f64> },
    StringValue { strings: Vec<String> },
    Annotation(Annotation),
}

impl Value {
    pub fn floats(floats: impl Into<Vec<f64>>) -> Self {
        Value::FloatValue {
            floats: floats.into(),
        }
    }

    pub fn strings<S: Into<String>>(strings: impl IntoIterator<Item = S>) -> Self {
        Value::StringValue {
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }

    /// Merges `delta` into `current`.
    ///
    /// Float deltas are added element-wise onto a float current value; the
    /// shorter vector is padded with zeros. Every other combination, and a
    /// missing current value, yields the delta itself.
    pub fn apply_delta(current: Option<&Value>, delta: &Value) -> Value {
        match (current, delta) {
            (Some(Value::FloatValue { floats: old }), Value::FloatValue { floats: inc }) => {
                let len = old.len().max(inc.len());
                let summed = (0..len)
                    .map(|i| old.get(i).copied().unwrap_or(0.0) + inc.get(i).copied().unwrap_or(0.0))
                    .collect();
                Value::FloatValue { floats: summed }
            }
            _ => delta.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_delta_adds_elementwise() {
        let current = Value::floats(vec![1.0, 2.0, 3.0]);
        let merged = Value::apply_delta(Some(&current), &Value::floats(vec![0.5, 0.5, 0.5]));
        assert_eq!(merged, Value::floats(vec![1.5, 2.5, 3.5]));
    }

    #[test]
    fn float_delta_pads_shorter_side() {
        let current = Value::floats(vec![1.0]);
        let merged = Value::apply_delta(Some(&current), &Value::floats(vec![1.0, 4.0]));
        assert_eq!(merged, Value::floats(vec![2.0, 4.0]));
    }

    #[test]
    fn delta_on_missing_value_is_the_delta() {
        let delta = Value::floats(vec![3.0]);
        assert_eq!(Value::apply_delta(None, &delta), delta);
    }

    #[test]
    fn non_float_delta_replaces() {
        let current = Value::floats(vec![1.0]);
        let delta = Value::strings(["x"]);
        assert_eq!(Value::apply_delta(Some(&current), &delta), delta);
    }

    #[test]
    fn value_json_shape() {
        let json = serde_json::to_value(Value::floats(vec![1.0])).unwrap();
        assert_eq!(json, serde_json::json!({"type": "FloatValue", "floats": [1.0]}));

        let annotation: Value = serde_json::from_str(
            r#"{"type":"Annotation","strength":0.8,"confidence":0.3}"#,
        )
        .unwrap();
        assert_eq!(
            annotation,
            Value::Annotation(Annotation {
                strength: 0.8,
                confidence: 0.3
            })
        );
    }
}
