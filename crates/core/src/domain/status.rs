use std::fmt;

use serde::{Deserialize, Serialize};

/// Categorical decision attached to an item under one scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approve,
    Defer,
    Review,
    Reject,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Defer => "defer",
            Self::Review => "review",
            Self::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Some(Self::Approve),
            "defer" | "deferred" => Some(Self::Defer),
            "review" | "needs review" | "under review" => Some(Self::Review),
            "reject" | "rejected" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::DecisionStatus;

    #[test]
    fn parses_common_spellings() {
        assert_eq!(DecisionStatus::parse("Approved"), Some(DecisionStatus::Approve));
        assert_eq!(DecisionStatus::parse(" defer "), Some(DecisionStatus::Defer));
        assert_eq!(DecisionStatus::parse("Needs Review"), Some(DecisionStatus::Review));
        assert_eq!(DecisionStatus::parse("REJECT"), Some(DecisionStatus::Reject));
        assert_eq!(DecisionStatus::parse("maybe"), None);
    }
}
