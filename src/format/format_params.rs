use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{SqlError, SqlResult};
use crate::format::dialect::ParameterStyle;
use crate::query::query_common::Param;

/// Parameter values extracted while rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Params {
    /// One entry per distinct name, in first-occurrence order
    Named(Vec<(String, Value)>),
    /// One entry per placeholder occurrence
    Positional(Vec<Value>),
}

impl Params {
    pub fn len(&self) -> usize {
        match self {
            Params::Named(v) => v.len(),
            Params::Positional(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Named(v) => v.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            Params::Positional(_) => None,
        }
    }

    pub fn values(&self) -> Vec<&Value> {
        match self {
            Params::Named(v) => v.iter().map(|(_, v)| v).collect(),
            Params::Positional(v) => v.iter().collect(),
        }
    }

    /// A JSON object for named parameters, an array for positional ones.
    pub fn to_json(&self) -> Value {
        match self {
            Params::Named(v) => {
                let mut map = Map::new();
                for (n, val) in v { map.insert(n.clone(), val.clone()); }
                Value::Object(map)
            }
            Params::Positional(v) => Value::Array(v.clone()),
        }
    }
}

/// Collects parameter values in rendering order and hands out placeholder text.
pub struct ParamSink {
    style: ParameterStyle,
    symbol: String,
    named: Vec<(String, Option<Value>)>,
    positional: Vec<Value>,
}

impl ParamSink {
    pub fn new(style: ParameterStyle, symbol: &str) -> Self {
        ParamSink { style, symbol: symbol.to_string(), named: Vec::new(), positional: Vec::new() }
    }

    pub fn placeholder(&mut self, param: &Param) -> SqlResult<String> {
        let Some(name) = param.name.as_deref() else {
            return Err(SqlError::format("anonymous '?' placeholders cannot be re-parameterised; use named parameters"));
        };
        match self.style {
            ParameterStyle::Named => {
                match self.named.iter_mut().find(|(n, _)| n == name) {
                    Some((_, existing)) => match (existing.as_ref(), param.value.as_ref()) {
                        (Some(a), Some(b)) if a != b => {
                            return Err(SqlError::format(format!("parameter {} is bound to conflicting values {} and {}", name, a, b)));
                        }
                        (None, Some(b)) => *existing = Some(b.clone()),
                        _ => {}
                    },
                    None => self.named.push((name.to_string(), param.value.clone())),
                }
                Ok(format!("{}{}", self.symbol, name))
            }
            ParameterStyle::Indexed => {
                self.positional.push(param.value.clone().unwrap_or(Value::Null));
                Ok(format!("{}{}", self.symbol, self.positional.len()))
            }
            ParameterStyle::Anonymous => {
                self.positional.push(param.value.clone().unwrap_or(Value::Null));
                Ok(self.symbol.clone())
            }
        }
    }

    pub fn finish(self) -> Params {
        match self.style {
            ParameterStyle::Named => Params::Named(self.named.into_iter().map(|(n, v)| (n, v.unwrap_or(Value::Null))).collect()),
            ParameterStyle::Indexed | ParameterStyle::Anonymous => Params::Positional(self.positional),
        }
    }
}
