//! Criteria objects
//! ----------------
//! A criteria object maps logical column names to filter values. Each
//! non-omitted entry becomes one predicate with bound parameters when injected.
//!
//! The JSON form is permissive:
//! `{"id": 42, "name": {"like": "%a%"}, "price": {"min": 1, "max": 9}, "tag": ["a", "b"], "x": null}`

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{SqlError, SqlResult};
use crate::ident::ident_eq;

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaValue {
    Equals(Value),
    Like(String),
    GreaterOrEqual(Value),
    LessOrEqual(Value),
    Range { min: Option<Value>, max: Option<Value> },
    In(Vec<Value>),
    Omitted,
}

impl CriteriaValue {
    pub fn is_omitted(&self) -> bool {
        matches!(self.clone().normalized(), CriteriaValue::Omitted)
    }

    /// A range with one bound becomes the matching comparison; with none it is omitted.
    pub fn normalized(self) -> CriteriaValue {
        match self {
            CriteriaValue::Range { min: Some(min), max: None } => CriteriaValue::GreaterOrEqual(min),
            CriteriaValue::Range { min: None, max: Some(max) } => CriteriaValue::LessOrEqual(max),
            CriteriaValue::Range { min: None, max: None } => CriteriaValue::Omitted,
            other => other,
        }
    }

    fn from_json(key: &str, value: &Value) -> SqlResult<CriteriaValue> {
        match value {
            Value::Null => Ok(CriteriaValue::Omitted),
            Value::Array(items) => Ok(CriteriaValue::In(items.clone())),
            Value::Object(ops) => Self::from_operators(key, ops),
            scalar => Ok(CriteriaValue::Equals(scalar.clone())),
        }
    }

    fn from_operators(key: &str, ops: &Map<String, Value>) -> SqlResult<CriteriaValue> {
        if ops.is_empty() {
            return Err(SqlError::invalid(format!("criteria '{}': empty operator object", key)));
        }
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;
        let mut single: Option<CriteriaValue> = None;
        for (op, v) in ops {
            let bound = if v.is_null() { None } else { Some(v.clone()) };
            match op.to_ascii_lowercase().as_str() {
                "min" | ">=" | "gte" => min = bound,
                "max" | "<=" | "lte" => max = bound,
                "like" => match v {
                    Value::String(s) => single = Some(CriteriaValue::Like(s.clone())),
                    Value::Null => {}
                    _ => return Err(SqlError::invalid(format!("criteria '{}': like pattern must be a string", key))),
                },
                "eq" | "=" => {
                    if !v.is_null() { single = Some(CriteriaValue::Equals(v.clone())); }
                }
                "in" => match v {
                    Value::Array(items) => single = Some(CriteriaValue::In(items.clone())),
                    Value::Null => {}
                    _ => return Err(SqlError::invalid(format!("criteria '{}': in expects an array", key))),
                },
                other => {
                    return Err(SqlError::invalid(format!("criteria '{}': unknown operator '{}'", key, other)));
                }
            }
        }
        let has_range = min.is_some() || max.is_some();
        match (single, has_range) {
            (Some(_), true) => Err(SqlError::invalid(format!("criteria '{}': range bounds cannot be combined with other operators", key))),
            (Some(v), false) => Ok(v),
            (None, _) => Ok(CriteriaValue::Range { min, max }.normalized()),
        }
    }
}

/// Ordered criteria entries; keys are compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(String, CriteriaValue)>,
}

impl Criteria {
    pub fn new() -> Self { Self::default() }

    /// Set `key`, replacing an existing entry in place.
    pub fn insert<S: Into<String>>(&mut self, key: S, value: CriteriaValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| ident_eq(k, &key)) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with<S: Into<String>>(mut self, key: S, value: CriteriaValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn equals<S: Into<String>, V: Into<Value>>(self, key: S, value: V) -> Self {
        self.with(key, CriteriaValue::Equals(value.into()))
    }

    pub fn like<S: Into<String>, P: Into<String>>(self, key: S, pattern: P) -> Self {
        self.with(key, CriteriaValue::Like(pattern.into()))
    }

    pub fn range<S: Into<String>>(self, key: S, min: Option<Value>, max: Option<Value>) -> Self {
        self.with(key, CriteriaValue::Range { min, max })
    }

    pub fn one_of<S: Into<String>>(self, key: S, values: Vec<Value>) -> Self {
        self.with(key, CriteriaValue::In(values))
    }

    pub fn entries(&self) -> &[(String, CriteriaValue)] {
        &self.entries
    }

    /// Entries that produce a predicate, normalised.
    pub fn active(&self) -> Vec<(String, CriteriaValue)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().normalized()))
            .filter(|(_, v)| !matches!(v, CriteriaValue::Omitted))
            .collect()
    }

    pub fn is_empty(&self) -> bool { self.active().is_empty() }

    pub fn from_json(value: &Value) -> SqlResult<Criteria> {
        let Value::Object(map) = value else {
            return Err(SqlError::invalid("criteria must be a JSON object"));
        };
        let mut out = Criteria::new();
        for (k, v) in map {
            out.insert(k.clone(), CriteriaValue::from_json(k, v)?);
        }
        Ok(out)
    }

    pub fn from_json_str(text: &str) -> SqlResult<Criteria> {
        let value: Value = serde_json::from_str(text).map_err(|e| SqlError::invalid(format!("criteria json: {}", e)))?;
        Criteria::from_json(&value)
    }
}

impl TryFrom<Value> for Criteria {
    type Error = SqlError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Criteria::from_json(&value)
    }
}

impl<'de> Deserialize<'de> for Criteria {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Criteria::from_json(&value).map_err(serde::de::Error::custom)
    }
}
