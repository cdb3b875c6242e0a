//! Report Parameters - Named, Typed Scalar Inputs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// The closed set of value shapes a parameter can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateRange(DateRange),
}

impl ParameterValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::DateRange(_) => "date_range",
        }
    }

    /// Plain JSON form used in template contexts (no type tag).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(i) => json!(i),
            // String keeps full precision; templates format it with a helper.
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::DateRange(r) => json!({
                "start": r.start.format("%Y-%m-%d").to_string(),
                "end": r.end.format("%Y-%m-%d").to_string(),
            }),
        }
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Decimal> for ParameterValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<NaiveDate> for ParameterValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateRange> for ParameterValue {
    fn from(v: DateRange) -> Self {
        Self::DateRange(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParameter {
    pub name: String,
    pub value: ParameterValue,
}

impl ReportParameter {
    pub fn new(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Typed view of a stored [`ParameterValue`].
pub trait FromParameter: Sized {
    const TYPE_NAME: &'static str;

    fn from_parameter(value: &ParameterValue) -> Option<Self>;
}

macro_rules! from_parameter {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromParameter for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_parameter(value: &ParameterValue) -> Option<Self> {
                match value {
                    ParameterValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_parameter!(String, Text, "text");
from_parameter!(i64, Integer, "integer");
from_parameter!(Decimal, Decimal, "decimal");
from_parameter!(bool, Boolean, "boolean");
from_parameter!(NaiveDate, Date, "date");
from_parameter!(DateRange, DateRange, "date_range");
