//! Loosely typed parameter bags handed to object constructors.
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    RealList(Vec<f64>),
    TextList(Vec<String>),
}

impl ParameterValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::RealList(_) => "real list",
            Self::TextList(_) => "text list",
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        Self::RealList(value)
    }
}

impl From<Vec<&str>> for ParameterValue {
    fn from(value: Vec<&str>) -> Self {
        Self::TextList(value.into_iter().map(str::to_string).collect())
    }
}

/// Named parameters of a single object, e.g. `{ "variable": "u", "diffusivity": 2.0 }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParameterValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Looks up a required parameter. `owner` names the object in error messages.
    pub fn require(&self, owner: &str, key: &str) -> Result<&ParameterValue, ConfigurationError> {
        self.get(key).ok_or_else(|| ConfigurationError::MissingParameter {
            object: owner.to_string(),
            parameter: key.to_string(),
        })
    }

    pub fn real(&self, owner: &str, key: &str) -> Result<f64, ConfigurationError> {
        match self.require(owner, key)? {
            ParameterValue::Real(value) => Ok(*value),
            ParameterValue::Integer(value) => Ok(*value as f64),
            other => Err(invalid(owner, key, "real", other)),
        }
    }

    pub fn real_or(&self, owner: &str, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        if self.contains(key) {
            self.real(owner, key)
        } else {
            Ok(default)
        }
    }

    pub fn boolean_or(&self, owner: &str, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.get(key) {
            None => Ok(default),
            Some(ParameterValue::Boolean(value)) => Ok(*value),
            Some(other) => Err(invalid(owner, key, "boolean", other)),
        }
    }

    pub fn text(&self, owner: &str, key: &str) -> Result<&str, ConfigurationError> {
        match self.require(owner, key)? {
            ParameterValue::Text(value) => Ok(value),
            other => Err(invalid(owner, key, "text", other)),
        }
    }

    pub fn optional_text(&self, owner: &str, key: &str) -> Result<Option<&str>, ConfigurationError> {
        if self.contains(key) {
            self.text(owner, key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// A list of names. A single text value is accepted as a list of one.
    pub fn text_list(&self, owner: &str, key: &str) -> Result<Vec<String>, ConfigurationError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(ParameterValue::Text(value)) => Ok(vec![value.clone()]),
            Some(ParameterValue::TextList(values)) => Ok(values.clone()),
            Some(other) => Err(invalid(owner, key, "text list", other)),
        }
    }

    pub fn real_list(&self, owner: &str, key: &str) -> Result<Vec<f64>, ConfigurationError> {
        match self.require(owner, key)? {
            ParameterValue::RealList(values) => Ok(values.clone()),
            ParameterValue::Real(value) => Ok(vec![*value]),
            ParameterValue::Integer(value) => Ok(vec![*value as f64]),
            other => Err(invalid(owner, key, "real list", other)),
        }
    }
}

fn invalid(owner: &str, key: &str, expected: &str, found: &ParameterValue) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        object: owner.to_string(),
        parameter: key.to_string(),
        reason: format!("expected {}, found {}", expected, found.type_name()),
    }
}
