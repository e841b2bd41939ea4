//! The tagged value type every connectable publishes.
//!
//! The original implementation relied on Python's dynamic typing plus a
//! closed set of ground types reflected in its MySQL column mapping
//! (`shc/interfaces/mysql.py::_type_to_column`: int/bool, float, str, enum).
//! Rust's static typing replaces runtime duck typing with this tagged sum
//! plus connect-time [`ValueKind`] checks (see [`crate::conversion`]).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// Interns a tag string to a process-lifetime `&'static str`, leaking at
/// most once per distinct tag. Tags are a small, caller-chosen set fixed
/// at configuration time (one per enum/record type registered), so the
/// total leaked footprint is bounded regardless of how often `kind()` is
/// called on `Other` values.
fn intern_tag(tag: &str) -> &'static str {
    static INTERNED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let set = INTERNED.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = set.lock().expect("tag interner poisoned");
    if let Some(existing) = guard.get(tag) {
        return existing;
    }
    let leaked: &'static str = Box::leak(tag.to_owned().into_boxed_str());
    guard.insert(leaked);
    leaked
}

/// The ground type a connectable's value belongs to.
///
/// `Other` is the escape hatch for enums and records: such values are
/// identified by a caller-chosen tag (e.g. the enum's type name) and
/// round-trip through JSON via the conversion registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The timer scheduler's firing signal carries no information beyond
    /// "now" — it publishes `Unit`, never any other kind.
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Other(&'static str),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Unit => write!(f, "unit"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Str => write!(f, "str"),
            ValueKind::Other(tag) => write!(f, "other({tag})"),
        }
    }
}

/// A value carried across the propagation network.
///
/// Structural equality (`PartialEq`) backs the [`crate::variable::Variable`]
/// dedup check described in the spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The timer scheduler's firing signal; carries no payload.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// JSON-encoded payload for enums/records, tagged by a caller-chosen
    /// type name so the conversion registry knows how to decode it.
    Other { tag: String, json: serde_json::Value },
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Other { tag, .. } => ValueKind::Other(intern_tag(tag)),
        }
    }

    /// True for any value considered "on"/truthy for `ON_TIME` aggregation:
    /// nonzero numbers, non-empty strings, and `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Unit => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Other { .. } => true,
        }
    }

    /// Numeric projection used by AVERAGE/MINIMUM/MAXIMUM aggregation.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Other { tag, json } => write!(f, "{tag}({json})"),
        }
    }
}
