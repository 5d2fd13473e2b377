use serde::{Deserialize, Serialize};

/// What happened to a single field write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    Applied,
    /// Non-numeric input was stored as zero.
    Coerced { raw: String },
    Skipped { reason: FieldSkipReason },
}

impl FieldOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_coerced(&self) -> bool {
        matches!(self, Self::Coerced { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSkipReason {
    ReadOnly,
    StaticAttribute,
    UnknownField,
    InvalidNumeric,
    InvalidStatus,
}

impl FieldSkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::StaticAttribute => "static_attribute",
            Self::UnknownField => "unknown_field",
            Self::InvalidNumeric => "invalid_numeric",
            Self::InvalidStatus => "invalid_status",
        }
    }
}
