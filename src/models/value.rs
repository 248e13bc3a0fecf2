use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as Json;

use crate::error::{CatalogError, Result};

/// A domain value held by a product attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Integer(_) => ValueKind::Integer,
            Self::Number(_) => ValueKind::Number,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

/// The representation an attribute type converts values to and from.
///
/// Every kind maps onto a JSON primitive in storage. `Timestamp` is stored as
/// an RFC 3339 string; the others are stored as the matching JSON scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Text,
    Integer,
    Number,
    Boolean,
    Timestamp,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "timestamp" => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Domain → storage.
    pub fn to_storage(&self, value: &Value) -> Result<Json> {
        match (self, value) {
            (Self::Text, Value::Text(s)) => Ok(Json::String(s.clone())),
            (Self::Integer, Value::Integer(i)) => Ok(Json::from(*i)),
            (Self::Number, Value::Number(n)) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .ok_or_else(|| CatalogError::Validation(format!("{n} is not a finite number"))),
            (Self::Number, Value::Integer(i)) => Ok(Json::from(*i as f64)),
            (Self::Boolean, Value::Boolean(b)) => Ok(Json::Bool(*b)),
            (Self::Timestamp, Value::Timestamp(t)) => Ok(Json::String(
                t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            (kind, value) => Err(CatalogError::Validation(format!(
                "expected a {} value, got {}",
                kind.as_str(),
                value.kind().as_str()
            ))),
        }
    }

    /// Storage → domain.
    pub fn from_storage(&self, raw: &Json) -> Result<Value> {
        let value = match (self, raw) {
            (Self::Text, Json::String(s)) => Some(Value::Text(s.clone())),
            (Self::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
            (Self::Number, Json::Number(n)) => n.as_f64().map(Value::Number),
            (Self::Boolean, Json::Bool(b)) => Some(Value::Boolean(*b)),
            (Self::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc))),
            _ => None,
        };
        value.ok_or_else(|| {
            CatalogError::Validation(format!("stored value {raw} is not a valid {}", self.as_str()))
        })
    }

    /// Parse user input (e.g. a shell argument) into a value of this kind.
    pub fn parse(&self, input: &str) -> Result<Value> {
        let invalid = || CatalogError::Validation(format!("{input:?} is not a valid {}", self.as_str()));
        match self {
            Self::Text => Ok(Value::Text(input.to_string())),
            Self::Integer => input.trim().parse().map(Value::Integer).map_err(|_| invalid()),
            Self::Number => input.trim().parse().map(Value::Number).map_err(|_| invalid()),
            Self::Boolean => match input.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Boolean(true)),
                "false" | "no" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid()),
            },
            Self::Timestamp => DateTime::parse_from_rfc3339(input.trim())
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|_| invalid()),
        }
    }
}
