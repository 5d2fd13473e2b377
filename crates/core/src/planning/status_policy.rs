use serde::{Deserialize, Serialize};

use crate::domain::status::DecisionStatus;
use crate::domain::value::ScenarioValue;

/// Field cascade applied when an item's decision status changes.
pub trait StatusPolicy: Send + Sync {
    fn apply(&self, value: ScenarioValue, status: DecisionStatus) -> ScenarioValue;
}

/// Built-in cascades used by the screen profiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCascade {
    /// Records the status and leaves figures alone.
    #[default]
    RecordOnly,
    /// Reject zeroes the override; approve restores the suggestion.
    OverrideReset,
}

impl StatusPolicy for StatusCascade {
    fn apply(&self, mut value: ScenarioValue, status: DecisionStatus) -> ScenarioValue {
        value.status = Some(status);
        if matches!(self, Self::OverrideReset) {
            match status {
                DecisionStatus::Reject => value.override_amount = rust_decimal::Decimal::ZERO,
                DecisionStatus::Approve => value.override_amount = value.suggested,
                DecisionStatus::Defer | DecisionStatus::Review => {}
            }
        }
        value
    }
}
