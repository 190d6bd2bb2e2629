//! Per-entity key/value scratch memory.
//!
//! Values come from a closed set of kinds. Reading a key back as a different kind is an
//! error rather than a silent conversion, except for the numeric helpers ([`Blackboard::inc`],
//! [`Blackboard::exp_decay`]) which accept any numeric kind.

use core::fmt;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::Vec2;

/// Opaque handle to another entity, stored by its stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Entity(EntityHandle),
    Vec2(Vec2),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Str(_) => ValueKind::Str,
            Value::Entity(_) => ValueKind::Entity,
            Value::Vec2(_) => ValueKind::Vec2,
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Double(v) => Some(v as f32),
            Value::Int(v) => Some(v as f32),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "bool:{v}"),
            Value::Int(v) => write!(f, "int:{v}"),
            Value::Float(v) => write!(f, "float:{v}"),
            Value::Double(v) => write!(f, "double:{v}"),
            Value::Str(v) => write!(f, "string:{v:?}"),
            Value::Entity(EntityHandle(id)) => write!(f, "entity:#{id}"),
            Value::Vec2(v) => write!(f, "vec2:({}, {})", v.x, v.y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Double,
    Str,
    Entity,
    Vec2,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Str => "string",
            ValueKind::Entity => "entity",
            ValueKind::Vec2 => "vec2",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("blackboard key '{0}' is not set")]
    Missing(String),
    #[error("blackboard key '{key}' holds {found}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Types that can be stored in a [`Blackboard`].
pub trait BbValue: Sized {
    const KIND: ValueKind;

    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! bb_value {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl BbValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

bb_value!(bool, Bool, Bool);
bb_value!(i64, Int, Int);
bb_value!(f32, Float, Float);
bb_value!(f64, Double, Double);
bb_value!(String, Str, Str);
bb_value!(EntityHandle, Entity, Entity);
bb_value!(Vec2, Vec2, Vec2);

impl BbValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blackboard {
    values: BTreeMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set<T: BbValue>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), value.into_value());
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get<T: BbValue>(&self, key: &str) -> Result<T, BlackboardError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| BlackboardError::Missing(key.to_string()))?;
        T::from_value(value).ok_or_else(|| BlackboardError::TypeMismatch {
            key: key.to_string(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Like [`Blackboard::get`] but falls back to `default` when the key is missing.
    /// A kind mismatch is still an error.
    pub fn get_or<T: BbValue>(&self, key: &str, default: T) -> Result<T, BlackboardError> {
        match self.get(key) {
            Err(BlackboardError::Missing(_)) => Ok(default),
            other => other,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn set_vec2(&mut self, key: impl Into<String>, x: f32, y: f32) {
        self.set(key, Vec2::new(x, y));
    }

    pub fn get_vec2(&self, key: &str) -> Result<Vec2, BlackboardError> {
        self.get(key)
    }

    pub fn set_entity(&mut self, key: impl Into<String>, stable_id: u64) {
        self.set(key, EntityHandle(stable_id));
    }

    pub fn get_entity(&self, key: &str) -> Result<u64, BlackboardError> {
        self.get::<EntityHandle>(key).map(|h| h.0)
    }

    /// Adds `delta` to a numeric key (starting from `default` when unset) and stores the result
    /// as a float.
    pub fn inc(&mut self, key: &str, delta: f32, default: f32) -> f32 {
        let next = self.numeric_or(key, default) + delta;
        self.set(key, next);
        next
    }

    /// Exponential decay towards zero: `v * exp(-rate * dt)`, stored as a float.
    pub fn exp_decay(&mut self, key: &str, rate: f32, dt: f32, default: f32) -> f32 {
        let next = self.numeric_or(key, default) * (-rate * dt).exp();
        self.set(key, next);
        next
    }

    /// One `key = kind:value` line per entry, sorted by key.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value.to_string());
            out.push('\n');
        }
        out
    }

    fn numeric_or(&self, key: &str, default: f32) -> f32 {
        self.values
            .get(key)
            .and_then(Value::as_f32)
            .unwrap_or(default)
    }
}
