use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value::FieldValue;
use crate::errors::DomainError;
use crate::planning::outcome::FieldOutcome;

/// How numeric fields treat input that is not a number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    /// Malformed input becomes zero and is reported as coerced.
    #[default]
    Lenient,
    /// Malformed input is refused.
    Strict,
}

impl NumericPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }

    /// Resolves a cell destined for a numeric field.
    pub fn resolve(
        &self,
        field: &str,
        value: &FieldValue,
    ) -> Result<(Decimal, FieldOutcome), DomainError> {
        let raw = match value {
            FieldValue::Number(number) => return Ok((*number, FieldOutcome::Applied)),
            FieldValue::Text(text) => text.as_str(),
            FieldValue::Empty => "",
        };

        match coerce_numeric(raw) {
            Some(number) => Ok((number, FieldOutcome::Applied)),
            None => match self {
                Self::Lenient => {
                    Ok((Decimal::ZERO, FieldOutcome::Coerced { raw: raw.to_string() }))
                }
                Self::Strict => Err(DomainError::InvalidNumeric {
                    field: field.to_string(),
                    raw: raw.to_string(),
                }),
            },
        }
    }
}

impl FromStr for NumericPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unsupported numeric policy `{other}` (expected lenient|strict)")),
        }
    }
}

/// Parses spreadsheet-style numeric text: surrounding whitespace, a leading
/// currency symbol, thousands separators, a trailing percent sign and
/// accounting parentheses for negatives are accepted. Percentages keep their
/// face value (`"12%"` is `12`).
pub fn coerce_numeric(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim_start();
    }

    let text = text.trim_start_matches(['$', '€', '£']).trim_end_matches('%').trim();
    let cleaned: String = text.chars().filter(|ch| *ch != ',' && *ch != '_').collect();
    if cleaned.is_empty() {
        return None;
    }

    let parsed = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -parsed } else { parsed })
}
