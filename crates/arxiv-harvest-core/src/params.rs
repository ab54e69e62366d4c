//! Loosely-typed function arguments and integer parameter resolution.
//!
//! Callers of the retrieval function (an LLM tool call, an HTTP request,
//! the CLI) hand over an [`ArgumentBag`] whose values may be integers,
//! numeric strings, or anything else. [`resolve`] turns one named entry
//! into an integer using a fixed precedence:
//!
//! 1. an explicit integer argument;
//! 2. an explicit string argument that parses as an integer;
//! 3. the declared default in the parameter metadata, if it is an integer;
//! 4. the caller's hard default.
//!
//! Resolution never fails.

use std::collections::HashMap;

use serde::Serialize;

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ArgValue {
    #[default]
    Absent,
    Integer(i64),
    String(String),
    /// Any other shape (float, bool, list, object). Never resolves to an integer.
    Other(serde_json::Value),
}

impl ArgValue {
    /// Parse an integer out of this value following resolution steps 1–2.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(n) => Some(*n),
            ArgValue::String(s) => s.trim().parse().ok(),
            ArgValue::Absent | ArgValue::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Absent => serde_json::Value::Null,
            ArgValue::Integer(n) => serde_json::Value::from(*n),
            ArgValue::String(s) => serde_json::Value::from(s.as_str()),
            ArgValue::Other(v) => v.clone(),
        }
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ArgValue::Absent,
            serde_json::Value::String(s) => ArgValue::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Integer(i),
                None => ArgValue::Other(serde_json::Value::Number(n)),
            },
            other => ArgValue::Other(other),
        }
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

/// Named arguments for one function invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentBag {
    values: HashMap<String, ArgValue>,
}

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Missing names read as [`ArgValue::Absent`].
    pub fn get(&self, name: &str) -> &ArgValue {
        static ABSENT: ArgValue = ArgValue::Absent;
        self.values.get(name).unwrap_or(&ABSENT)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert a JSON object into a bag. Non-object values yield an empty bag.
    pub fn from_json(value: serde_json::Value) -> Self {
        let values = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, ArgValue::from(v)))
                .collect(),
            _ => HashMap::new(),
        };
        Self { values }
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for ArgumentBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Declared type of a parameter, for discovery only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
}

/// Metadata declared for one function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMeta {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: Option<ParamType>,
    pub default: ArgValue,
}

impl ParamMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            param_type: None,
            default: ArgValue::Absent,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn param_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    pub fn default_value(mut self, default: impl Into<ArgValue>) -> Self {
        self.default = default.into();
        self
    }

    /// JSON Schema fragment for tool discovery.
    pub fn schema(&self) -> serde_json::Value {
        let mut prop = serde_json::json!({ "description": self.description });
        if let Some(t) = self.param_type {
            prop["type"] = serde_json::json!(t);
        }
        if self.default != ArgValue::Absent {
            prop["default"] = self.default.to_json();
        }
        prop
    }
}

/// Resolve `name` to an integer: explicit argument, then declared default,
/// then `hard_default`.
///
/// Only an integer declared default counts at step 3; a string default
/// such as `"5"` is ignored.
pub fn resolve(args: &ArgumentBag, declared: &[ParamMeta], name: &str, hard_default: i64) -> i64 {
    if let Some(n) = args.get(name).as_integer() {
        return n;
    }

    let declared_default = declared
        .iter()
        .find(|p| p.name == name)
        .map(|p| &p.default);

    match declared_default {
        Some(ArgValue::Integer(n)) => *n,
        _ => hard_default,
    }
}
