use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::status::DecisionStatus;

/// A single cell: an item attribute, a scenario domain field, or an
/// import/export column value.
///
/// JSON numbers become `Number`, JSON strings stay `Text` verbatim (so `"007"`
/// keeps its leading zeros) and `null` is `Empty`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Number(Decimal),
    Text(String),
    Empty,
}

impl FieldValue {
    /// Numeric reading of the cell. Text holding a plain decimal literal
    /// counts, anything else does not.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) => Decimal::from_str(value.trim()).ok(),
            Self::Empty => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Number(_) | Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Renders the cell the way a label or key component would show it.
    pub fn display_text(&self) -> String {
        match self {
            Self::Number(value) => value.normalize().to_string(),
            Self::Text(value) => value.trim().to_string(),
            Self::Empty => String::new(),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Number(value) => serialize_number(*value, serializer),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Empty => serializer.serialize_unit(),
        }
    }
}

/// Writes a JSON number when it reads back exactly; otherwise the decimal
/// string, which `as_decimal` still reads as a number.
fn serialize_number<S>(value: Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.fract().is_zero() {
        if let Some(integer) = value.to_i64() {
            return serializer.serialize_i64(integer);
        }
    }
    if let Some(float) = value.to_f64() {
        if Decimal::from_str(&float.to_string()).is_ok_and(|back| back == value) {
            return serializer.serialize_f64(float);
        }
    }
    serializer.serialize_str(&value.to_string())
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a number, a string or null")
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Number(Decimal::from(value)))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Number(Decimal::from(value)))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Decimal::from_str(&value.to_string())
            .map(FieldValue::Number)
            .map_err(|_| E::custom(format!("number `{value}` is outside the decimal range")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Text(value.to_string()))
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Text(value))
    }

    fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Text(value.to_string()))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Empty)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Empty)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

/// One item's figures under one scenario.
///
/// `override_amount` is the figure that feeds totals. It starts equal to
/// `suggested` and is always numeric; a missing value reads as zero. When
/// deserialized without an `override`, it takes the suggested amount.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScenarioValueRecord")]
pub struct ScenarioValue {
    pub suggested: Decimal,
    #[serde(rename = "override")]
    pub override_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DecisionStatus>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Deserialize)]
struct ScenarioValueRecord {
    #[serde(default)]
    suggested: Decimal,
    #[serde(default, rename = "override")]
    override_amount: Option<Decimal>,
    #[serde(default)]
    status: Option<DecisionStatus>,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl From<ScenarioValueRecord> for ScenarioValue {
    fn from(record: ScenarioValueRecord) -> Self {
        Self {
            suggested: record.suggested,
            override_amount: record.override_amount.unwrap_or(record.suggested),
            status: record.status,
            fields: record.fields,
        }
    }
}

/// Returned by reads for a scenario the item has no entry for.
pub static ZERO_SCENARIO_VALUE: ScenarioValue = ScenarioValue {
    suggested: Decimal::ZERO,
    override_amount: Decimal::ZERO,
    status: None,
    fields: BTreeMap::new(),
};

impl ScenarioValue {
    pub fn from_suggestion(suggested: Decimal) -> Self {
        Self { suggested, override_amount: suggested, status: None, fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: DecisionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_override(mut self, amount: Decimal) -> Self {
        self.override_amount = amount;
        self
    }

    /// Numeric domain field; absent or non-numeric reads as zero.
    pub fn number(&self, field: &str) -> Decimal {
        self.fields.get(field).and_then(FieldValue::as_decimal).unwrap_or(Decimal::ZERO)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }

    pub fn variance(&self) -> Decimal {
        self.override_amount.saturating_sub(self.suggested)
    }
}
