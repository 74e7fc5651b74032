//! Artifact serialization.
//!
//! Callers hand the guard live data: plain JSON values, zero-argument
//! callables, lazy content fields, or containers mixing all three. Before
//! anything is written to the artifact store it is flattened to a plain
//! `serde_json::Value`: callables are invoked, lazy fields resolved, and
//! containers walked element-wise with keys and order preserved.

use serde_json::{Map, Value};

/// A lazy, typed scalar wrapper the host integration supplies, the
/// generalization of a CMS "content field". Resolution happens exactly once
/// at serialization time.
pub trait LazyField: Send {
    fn resolve(&self) -> Value;
}

impl<F> LazyField for F
where
    F: Fn() -> Value + Send,
{
    fn resolve(&self) -> Value {
        self()
    }
}

/// Input accepted by [`CacheGuard::data`](crate::guard::CacheGuard::data)
/// and [`CacheGuard::render`](crate::guard::CacheGuard::render).
pub enum CacheInput {
    /// Already-plain value, passed through unchanged.
    Value(Value),
    /// Zero-argument callable, invoked and its result serialized.
    Lazy(Box<dyn FnOnce() -> CacheInput + Send>),
    /// Lazy scalar wrapper, unwrapped to its underlying value.
    Field(Box<dyn LazyField>),
    /// Ordered container, serialized element-wise.
    List(Vec<CacheInput>),
    /// Keyed container, serialized element-wise with keys preserved.
    Map(Vec<(String, CacheInput)>),
}

impl CacheInput {
    pub fn lazy(f: impl FnOnce() -> CacheInput + Send + 'static) -> Self {
        Self::Lazy(Box::new(f))
    }

    pub fn field(field: impl LazyField + 'static) -> Self {
        Self::Field(Box::new(field))
    }

    /// A literal null, the "nothing to cache" marker.
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }
}

impl std::fmt::Debug for CacheInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
            Self::Field(_) => f.write_str("Field(..)"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

impl From<Value> for CacheInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for CacheInput {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for CacheInput {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<Vec<CacheInput>> for CacheInput {
    fn from(items: Vec<CacheInput>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<(String, CacheInput)>> for CacheInput {
    fn from(entries: Vec<(String, CacheInput)>) -> Self {
        Self::Map(entries)
    }
}

/// Flatten an input tree to a plain value.
///
/// A falsy or empty top-level result (null, `false`, `0`, `""`, `[]`, `{}`)
/// becomes an explicit `Value::Null`: "absent", never an error.
pub fn serialize(input: CacheInput) -> Value {
    let value = flatten(input);
    if is_empty(&value) { Value::Null } else { value }
}

fn flatten(input: CacheInput) -> Value {
    match input {
        CacheInput::Value(value) => value,
        CacheInput::Lazy(f) => flatten(f()),
        CacheInput::Field(field) => field.resolve(),
        CacheInput::List(items) => Value::Array(items.into_iter().map(flatten).collect()),
        CacheInput::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key, flatten(item));
            }
            Value::Object(map)
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
