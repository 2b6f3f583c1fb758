//! Dot-path configuration knobs.
//!
//! Configuration is round-tripped through JSON so that any field of
//! [`SwarmConfig`] can be listed or overridden by path, e.g.
//! `aggregation.wait_time=200` or `sensors.angles_deg=[-30,0,30]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swarmsim_core::SwarmConfig;
use thiserror::Error;

/// Primitive type of a knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnobKind {
    Number,
    Integer,
    Boolean,
    String,
    Array,
    Object,
    Null,
}

/// A single leaf of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobEntry {
    pub path: String,
    pub kind: KnobKind,
    pub value: Value,
}

/// Request to set the knob at `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobUpdate {
    pub path: String,
    pub value: Value,
}

impl KnobUpdate {
    /// Parse `path=value`; the value is read as JSON, falling back to a raw string.
    pub fn parse(raw: &str) -> Result<Self, KnobError> {
        let Some((path, value)) = raw.split_once('=') else {
            return Err(KnobError::Syntax(format!(
                "expected path=value, got '{raw}'"
            )));
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(KnobError::Syntax("empty knob path".into()));
        }
        let value = value.trim();
        let value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
        Ok(Self {
            path: path.to_owned(),
            value,
        })
    }
}

#[derive(Debug, Error)]
pub enum KnobError {
    #[error("invalid knob syntax: {0}")]
    Syntax(String),
    #[error("unknown knob path: {0}")]
    UnknownPath(String),
    #[error("knob {path} holds {expected:?}, cannot set {found:?}")]
    KindMismatch {
        path: String,
        expected: KnobKind,
        found: KnobKind,
    },
    #[error("knob {path}: '{raw}' is not a finite number")]
    NotANumber { path: String, raw: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KnobKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => KnobKind::Integer,
            Value::Number(_) => KnobKind::Number,
            Value::String(_) => KnobKind::String,
            Value::Bool(_) => KnobKind::Boolean,
            Value::Array(_) => KnobKind::Array,
            Value::Object(_) => KnobKind::Object,
            Value::Null => KnobKind::Null,
        }
    }

    const fn is_numeric(self) -> bool {
        matches!(self, KnobKind::Number | KnobKind::Integer)
    }

    /// Whether a value of kind `other` may replace a value of this kind.
    fn accepts(self, other: KnobKind) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

/// Every leaf knob of `config`, sorted by path.
pub fn list_knobs(config: &SwarmConfig) -> Result<Vec<KnobEntry>, KnobError> {
    let tree = serde_json::to_value(config)?;
    let mut entries = Vec::new();
    let mut pending = vec![(String::new(), &tree)];
    while let Some((path, node)) = pending.pop() {
        match node {
            Value::Object(fields) => pending.extend(fields.iter().map(|(key, child)| {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                (child_path, child)
            })),
            leaf => entries.push(KnobEntry {
                path,
                kind: KnobKind::of(leaf),
                value: leaf.clone(),
            }),
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Apply `updates` in order on top of `config`, returning the patched configuration.
///
/// The result is not validated here; world construction does that.
pub fn apply_updates(
    config: &SwarmConfig,
    updates: &[KnobUpdate],
) -> Result<SwarmConfig, KnobError> {
    let mut tree = serde_json::to_value(config)?;
    for update in updates {
        let slot = locate(&mut tree, &update.path)?;
        assign(slot, &update.value, &update.path)?;
    }
    Ok(serde_json::from_value(tree)?)
}

fn locate<'a>(tree: &'a mut Value, path: &str) -> Result<&'a mut Value, KnobError> {
    if path.split('.').any(str::is_empty) {
        return Err(KnobError::Syntax(format!("malformed knob path '{path}'")));
    }
    path.split('.').try_fold(tree, |node, segment| {
        node.as_object_mut()
            .and_then(|fields| fields.get_mut(segment))
            .ok_or_else(|| KnobError::UnknownPath(path.to_owned()))
    })
}

fn assign(slot: &mut Value, value: &Value, path: &str) -> Result<(), KnobError> {
    let expected = KnobKind::of(slot);
    let found = KnobKind::of(value);
    match value {
        // Optional fields (such as the RNG seed) serialize as null and take anything.
        _ if expected == KnobKind::Null => *slot = value.clone(),
        Value::Object(fields) if expected == KnobKind::Object => {
            for (key, nested) in fields {
                let nested_path = format!("{path}.{key}");
                let target = slot
                    .get_mut(key)
                    .ok_or_else(|| KnobError::UnknownPath(nested_path.clone()))?;
                assign(target, nested, &nested_path)?;
            }
        }
        Value::String(raw) if expected.is_numeric() => *slot = parse_number(path, raw)?,
        _ if expected.accepts(found) => *slot = value.clone(),
        _ => {
            return Err(KnobError::KindMismatch {
                path: path.to_owned(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn parse_number(path: &str, raw: &str) -> Result<Value, KnobError> {
    let trimmed = raw.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(Value::from(integer));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| KnobError::NotANumber {
            path: path.to_owned(),
            raw: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmsim_core::BehaviorKind;

    fn update(raw: &str) -> KnobUpdate {
        KnobUpdate::parse(raw).expect("parse")
    }

    #[test]
    fn nested_updates_are_applied() {
        let config = apply_updates(
            &SwarmConfig::default(),
            &[
                update("aggregation.wait_time=200"),
                update("sensors.angles_deg=[-30, 0, 30]"),
                update("behavior=timed_aggregation"),
                update("rng_seed=99"),
            ],
        )
        .expect("apply");
        assert_eq!(config.aggregation.wait_time, 200);
        assert_eq!(config.sensors.angles_deg, vec![-30.0, 0.0, 30.0]);
        assert_eq!(config.behavior, BehaviorKind::TimedAggregation);
        assert_eq!(config.rng_seed, Some(99));
    }

    #[test]
    fn quoted_numbers_are_coerced() {
        let config = apply_updates(
            &SwarmConfig::default(),
            &[KnobUpdate {
                path: "motion.cruise_speed".into(),
                value: Value::String("1.25".into()),
            }],
        )
        .expect("apply");
        assert_eq!(config.motion.cruise_speed, 1.25);
    }

    #[test]
    fn unknown_paths_and_type_mismatches_fail() {
        let err = apply_updates(&SwarmConfig::default(), &[update("does.not.exist=1")])
            .expect_err("unknown path");
        assert!(matches!(err, KnobError::UnknownPath(path) if path == "does.not.exist"));

        let err = apply_updates(&SwarmConfig::default(), &[update("sensors=5")])
            .expect_err("object replaced by scalar");
        assert!(matches!(
            err,
            KnobError::KindMismatch {
                expected: KnobKind::Object,
                found: KnobKind::Integer,
                ..
            }
        ));

        let err = apply_updates(&SwarmConfig::default(), &[update("motion.max_speed=fast")])
            .expect_err("word for a number");
        assert!(matches!(err, KnobError::NotANumber { path, .. } if path == "motion.max_speed"));

        assert!(matches!(KnobUpdate::parse("no_equals_sign"), Err(KnobError::Syntax(_))));
        assert!(matches!(
            apply_updates(&SwarmConfig::default(), &[update("motion..max_speed=1")]),
            Err(KnobError::Syntax(_))
        ));
    }

    #[test]
    fn integers_fill_float_knobs_and_objects_merge_per_field() {
        let config = apply_updates(
            &SwarmConfig::default(),
            &[
                update("motion.max_speed=4"),
                update(r#"aggregation={"wait_time": 60, "center_bias": 0.5}"#),
            ],
        )
        .expect("apply");
        assert_eq!(config.motion.max_speed, 4.0);
        assert_eq!(config.aggregation.wait_time, 60);
        assert_eq!(config.aggregation.center_bias, 0.5);
        assert_eq!(
            config.aggregation.leave_duration,
            SwarmConfig::default().aggregation.leave_duration
        );
    }

    #[test]
    fn listing_reaches_every_leaf() {
        let knobs = list_knobs(&SwarmConfig::default()).expect("knobs");
        let find = |path: &str| knobs.iter().find(|k| k.path == path).map(|k| k.kind);
        assert_eq!(find("aggregation.wait_time"), Some(KnobKind::Integer));
        assert_eq!(find("motion.max_speed"), Some(KnobKind::Number));
        assert_eq!(find("behavior"), Some(KnobKind::String));
        assert_eq!(find("rng_seed"), Some(KnobKind::Null));
        assert_eq!(find("sensors.angles_deg"), Some(KnobKind::Array));
        assert!(knobs.windows(2).all(|w| w[0].path <= w[1].path));
    }
}
