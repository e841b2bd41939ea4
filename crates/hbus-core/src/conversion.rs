//! The conversion registry: type-directed value conversion resolved once,
//! at `connect()` time, rather than re-dispatched on every value.
//!
//! The original implementation converted opportunistically inside
//! `_publish`/`_write` using Python's duck typing. Rust's static
//! [`crate::value::ValueKind`] tagging moves that decision earlier: two
//! connectables of different kinds can only be wired together if a
//! converter for that exact `(from, to)` pair has been registered, and the
//! failure is a configuration error raised by [`crate::base::connect`]
//! rather than a runtime surprise on the first mismatched value.

use std::collections::HashMap;
use std::sync::Arc;

use crate::base::{Converter, ConverterLookup};
use crate::error::{CoreError, CoreResult};
use crate::value::{Value, ValueKind};

/// A registry of `(from, to)` value converters, consulted by `connect()`.
///
/// Also backs the web API's JSON boundary: [`ConversionRegistry::to_json`]
/// and [`ConversionRegistry::from_json`] use the same `Other`-tag mechanism
/// so enum/record values round-trip through `/api/v1/object/{name}` the
/// same way they round-trip through a converter edge.
#[derive(Default)]
pub struct ConversionRegistry {
    converters: HashMap<(ValueKind, ValueKind), Converter>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion function for `from -> to`. Re-registering the
    /// same pair replaces the previous converter.
    pub fn register(
        &mut self,
        from: ValueKind,
        to: ValueKind,
        f: impl Fn(&Value) -> CoreResult<Value> + Send + Sync + 'static,
    ) {
        self.converters.insert((from, to), Arc::new(f));
    }

    /// Registers the numeric widenings and string coercions that come for
    /// free: bool<->int<->float, and any ground type's `Display` into str.
    pub fn with_standard_conversions() -> Self {
        let mut reg = Self::new();
        reg.register(ValueKind::Bool, ValueKind::Int, |v| match v {
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            _ => unreachable!("registered only for Bool source"),
        });
        reg.register(ValueKind::Bool, ValueKind::Float, |v| match v {
            Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            _ => unreachable!("registered only for Bool source"),
        });
        reg.register(ValueKind::Int, ValueKind::Float, |v| match v {
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            _ => unreachable!("registered only for Int source"),
        });
        reg.register(ValueKind::Int, ValueKind::Bool, |v| match v {
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            _ => unreachable!("registered only for Int source"),
        });
        reg.register(ValueKind::Float, ValueKind::Int, |v| match v {
            Value::Float(f) => Ok(Value::Int(*f as i64)),
            _ => unreachable!("registered only for Float source"),
        });
        reg.register(ValueKind::Bool, ValueKind::Str, |v| Ok(Value::Str(v.to_string())));
        reg.register(ValueKind::Int, ValueKind::Str, |v| Ok(Value::Str(v.to_string())));
        reg.register(ValueKind::Float, ValueKind::Str, |v| Ok(Value::Str(v.to_string())));
        reg
    }

    /// Encode a value for the web API JSON boundary. Ground types map to
    /// their natural JSON representation; `Other` values are wrapped so the
    /// tag survives the round trip.
    pub fn to_json(value: &Value) -> serde_json::Value {
        match value {
            Value::Unit => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::json!(f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Other { tag, json } => serde_json::json!({ "__type": tag, "value": json }),
        }
    }

    /// Decode a JSON payload into a `Value` of the expected kind. Plain
    /// JSON scalars decode into the matching ground type; the `{"__type":
    /// ..., "value": ...}` envelope decodes into `Other` only when
    /// `expected` names that same tag.
    pub fn from_json(expected: ValueKind, json: serde_json::Value) -> CoreResult<Value> {
        match (expected, json) {
            (ValueKind::Unit, serde_json::Value::Null) => Ok(Value::Unit),
            (ValueKind::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(b)),
            (ValueKind::Int, serde_json::Value::Number(n)) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| CoreError::Configuration(format!("{n} is not a valid int"))),
            (ValueKind::Float, serde_json::Value::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| CoreError::Configuration(format!("{n} is not a valid float"))),
            (ValueKind::Str, serde_json::Value::String(s)) => Ok(Value::Str(s)),
            (ValueKind::Other(expected_tag), serde_json::Value::Object(mut obj)) => {
                let tag = obj
                    .remove("__type")
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .ok_or_else(|| CoreError::Configuration("missing __type envelope".into()))?;
                if tag != expected_tag {
                    return Err(CoreError::Configuration(format!(
                        "expected __type {expected_tag}, got {tag}"
                    )));
                }
                let inner = obj
                    .remove("value")
                    .ok_or_else(|| CoreError::Configuration("missing value envelope".into()))?;
                Ok(Value::Other { tag, json: inner })
            }
            (expected, actual) => Err(CoreError::Configuration(format!(
                "cannot decode {actual} as {expected}"
            ))),
        }
    }
}

impl ConverterLookup for ConversionRegistry {
    fn lookup(&self, from: ValueKind, to: ValueKind) -> Option<Converter> {
        self.converters.get(&(from, to)).cloned()
    }
}
