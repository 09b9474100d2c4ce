//! Attribute values exchanged between configuration and resource kinds

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically typed attribute value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// An empty string, list or map is treated the same as null when diffing
    pub fn is_empty_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(m: BTreeMap<String, String>) -> Self {
        Value::Map(m.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
    }
}

/// One attribute of the desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Explicitly set in configuration
    Set(Value),
    /// Not set; the remote side decides the value
    Computed,
    /// Previously set, now removed from configuration
    Removed,
}

/// The attribute map produced from configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    attributes: BTreeMap<String, Attribute>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a map of explicitly set values
    pub fn from_values(values: BTreeMap<String, Value>) -> Self {
        Self {
            attributes: values
                .into_iter()
                .map(|(k, v)| (k, Attribute::Set(v)))
                .collect(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes
            .insert(name.into(), Attribute::Set(value.into()));
    }

    pub fn mark_removed(&mut self, name: impl Into<String>) {
        self.attributes.insert(name.into(), Attribute::Removed);
    }

    pub fn mark_computed(&mut self, name: impl Into<String>) {
        self.attributes.insert(name.into(), Attribute::Computed);
    }

    pub fn attribute(&self, name: &str) -> &Attribute {
        self.attributes.get(name).unwrap_or(&Attribute::Computed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    /// The explicitly set value, if any
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.attributes.get(name) {
            Some(Attribute::Set(v)) if !v.is_null() => Some(v),
            _ => None,
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn string(&self, name: &str) -> Result<String> {
        self.optional_string(name)?
            .ok_or_else(|| CloudError::validation(name, "is required"))
    }

    pub fn optional_string(&self, name: &str) -> Result<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch(name, "string", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.optional_int(name)?
            .ok_or_else(|| CloudError::validation(name, "is required"))
    }

    pub fn optional_int(&self, name: &str) -> Result<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(mismatch(name, "int", other)),
        }
    }

    /// An int that must fit the given inclusive range
    pub fn int_in_range(&self, name: &str, min: i64, max: i64) -> Result<Option<i64>> {
        match self.optional_int(name)? {
            Some(i) if i < min || i > max => Err(CloudError::validation(
                name,
                format!("expected to be in the range ({} - {}), got {}", min, max, i),
            )),
            other => Ok(other),
        }
    }

    pub fn optional_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(mismatch(name, "bool", other)),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self.optional_bool(name)?.unwrap_or(default))
    }

    /// A string restricted to a fixed set of choices (compared case-sensitively)
    pub fn string_one_of(&self, name: &str, choices: &[&str]) -> Result<Option<String>> {
        match self.optional_string(name)? {
            Some(s) if !choices.contains(&s.as_str()) => Err(CloudError::validation(
                name,
                format!("expected one of {:?}, got {:?}", choices, s),
            )),
            other => Ok(other),
        }
    }

    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(mismatch(name, "list of string", other)),
                })
                .collect(),
            Some(other) => Err(mismatch(name, "list", other)),
        }
    }

    pub fn string_map(&self, name: &str) -> Result<BTreeMap<String, String>> {
        match self.value(name) {
            None => Ok(BTreeMap::new()),
            Some(Value::Map(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(mismatch(&format!("{}.{}", name, k), "string", other)),
                })
                .collect(),
            Some(other) => Err(mismatch(name, "map", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, actual: &Value) -> CloudError {
    CloudError::validation(
        name,
        format!("expected {} but got {}", expected, actual.type_name()),
    )
}

/// The fully populated attribute map produced by a successful Read
pub type ObservedState = BTreeMap<String, Value>;
