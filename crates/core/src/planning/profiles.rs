use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::PlanningItem;
use crate::domain::scenario::ScenarioName;
use crate::domain::status::DecisionStatus;
use crate::errors::DomainError;
use crate::planning::aggregate::{
    AggregationRules, BandScheme, Dimension, MetricSource, RatioMetric, WeightedMetric,
};
use crate::planning::status_policy::StatusCascade;
use crate::planning::table::{FieldSpec, PlanningTable, TableLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    CapitalAllocation,
    TimingScenario,
    RevenueLinkedAllocation,
    SubscriptionBudget,
    RollingForecast,
    InvestmentTradeOff,
    ZeroBasedJustification,
}

impl ScreenKind {
    pub const ALL: [ScreenKind; 7] = [
        Self::CapitalAllocation,
        Self::TimingScenario,
        Self::RevenueLinkedAllocation,
        Self::SubscriptionBudget,
        Self::RollingForecast,
        Self::InvestmentTradeOff,
        Self::ZeroBasedJustification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapitalAllocation => "capital_allocation",
            Self::TimingScenario => "timing_scenario",
            Self::RevenueLinkedAllocation => "revenue_linked_allocation",
            Self::SubscriptionBudget => "subscription_budget",
            Self::RollingForecast => "rolling_forecast",
            Self::InvestmentTradeOff => "investment_trade_off",
            Self::ZeroBasedJustification => "zero_based_justification",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScreenKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            let expected: Vec<&str> = Self::ALL.iter().map(ScreenKind::as_str).collect();
            format!("unsupported screen profile `{value}` (expected {})", expected.join("|"))
        })
    }
}

/// Everything one planning screen needs: table shape, roll-up rules and the
/// status cascade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenProfile {
    pub kind: ScreenKind,
    pub title: String,
    pub layout: TableLayout,
    pub rules: AggregationRules,
    pub status_cascade: StatusCascade,
}

impl ScreenProfile {
    pub fn for_kind(kind: ScreenKind) -> Self {
        match kind {
            ScreenKind::CapitalAllocation => capital_allocation(),
            ScreenKind::TimingScenario => timing_scenario(),
            ScreenKind::RevenueLinkedAllocation => revenue_linked_allocation(),
            ScreenKind::SubscriptionBudget => subscription_budget(),
            ScreenKind::RollingForecast => rolling_forecast(),
            ScreenKind::InvestmentTradeOff => investment_trade_off(),
            ScreenKind::ZeroBasedJustification => zero_based_justification(),
        }
    }

    pub fn scenarios(&self) -> &[ScenarioName] {
        &self.layout.scenarios
    }

    pub fn empty_table(&self) -> PlanningTable {
        PlanningTable::new(self.layout.clone())
    }

    pub fn table_from_items(
        &self,
        items: impl IntoIterator<Item = PlanningItem>,
    ) -> Result<PlanningTable, DomainError> {
        PlanningTable::from_items(self.layout.clone(), items)
    }
}

fn scenarios(names: [&str; 3]) -> Vec<ScenarioName> {
    names.into_iter().map(ScenarioName::from).collect()
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn weighted_by_override(name: &str, rate_field: &str) -> WeightedMetric {
    WeightedMetric {
        name: name.to_string(),
        rate: MetricSource::Field(rate_field.to_string()),
        weight: MetricSource::Override,
    }
}

fn return_bands(field: &str, low: i64, high: i64) -> BandScheme {
    BandScheme {
        source: MetricSource::Field(field.to_string()),
        thresholds: vec![Decimal::new(low, 0), Decimal::new(high, 0)],
        labels: strings(&["low", "medium", "high"]),
    }
}

fn capital_allocation() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::CapitalAllocation,
        title: "Capital allocation".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Baseline", "Aggressive", "Conservative"]),
            key_fields: strings(&["project"]),
            attributes: strings(&["category", "base_cost"]),
            fields: vec![FieldSpec::number("expected_return")],
            tracks_status: true,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::attribute("category")],
            field_sums: Vec::new(),
            weighted: vec![weighted_by_override("weighted_return", "expected_return")],
            ratios: vec![RatioMetric {
                name: "allocation_to_base_cost".to_string(),
                numerator: MetricSource::Override,
                denominator: MetricSource::Attribute("base_cost".to_string()),
            }],
            bands: Some(return_bands("expected_return", 20, 30)),
            excluded_statuses: vec![DecisionStatus::Reject],
        },
        status_cascade: StatusCascade::OverrideReset,
    }
}

fn timing_scenario() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::TimingScenario,
        title: "Timing scenarios".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["On Schedule", "Accelerated", "Delayed"]),
            key_fields: strings(&["project"]),
            attributes: strings(&["category"]),
            fields: vec![FieldSpec::text("start_quarter"), FieldSpec::number("delay_months")],
            tracks_status: false,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::attribute("category"), Dimension::field("start_quarter")],
            field_sums: strings(&["delay_months"]),
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::RecordOnly,
    }
}

fn revenue_linked_allocation() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::RevenueLinkedAllocation,
        title: "Revenue-linked allocation".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Base", "Growth", "Downturn"]),
            key_fields: strings(&["department"]),
            attributes: strings(&["segment"]),
            fields: vec![FieldSpec::number("revenue"), FieldSpec::number("revenue_pct")],
            tracks_status: false,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::attribute("segment")],
            field_sums: strings(&["revenue"]),
            weighted: vec![weighted_by_override("weighted_revenue_pct", "revenue_pct")],
            ratios: vec![RatioMetric {
                name: "spend_to_revenue".to_string(),
                numerator: MetricSource::Override,
                denominator: MetricSource::Field("revenue".to_string()),
            }],
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::RecordOnly,
    }
}

fn subscription_budget() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::SubscriptionBudget,
        title: "Subscription budget".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Current", "Optimized", "Expanded"]),
            key_fields: strings(&["department", "tool"]),
            attributes: strings(&["vendor"]),
            fields: vec![FieldSpec::number("seats"), FieldSpec::number("cost_per_seat")],
            tracks_status: true,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::key_part("department", 0), Dimension::attribute("vendor")],
            field_sums: strings(&["seats"]),
            weighted: vec![weighted_by_override("weighted_cost_per_seat", "cost_per_seat")],
            excluded_statuses: vec![DecisionStatus::Reject],
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::OverrideReset,
    }
}

fn rolling_forecast() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::RollingForecast,
        title: "Rolling forecast".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Base", "Optimistic", "Pessimistic"]),
            key_fields: strings(&["department", "expense_type"]),
            attributes: Vec::new(),
            fields: vec![FieldSpec::number("growth_rate"), FieldSpec::text("period")],
            tracks_status: false,
        },
        rules: AggregationRules {
            breakdowns: vec![
                Dimension::key_part("department", 0),
                Dimension::key_part("expense_type", 1),
                Dimension::field("period"),
            ],
            weighted: vec![weighted_by_override("weighted_growth_rate", "growth_rate")],
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::RecordOnly,
    }
}

fn investment_trade_off() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::InvestmentTradeOff,
        title: "Investment trade-off".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Balanced", "Growth", "Defensive"]),
            key_fields: strings(&["initiative"]),
            attributes: strings(&["category"]),
            fields: vec![FieldSpec::number("expected_return"), FieldSpec::number("risk_score")],
            tracks_status: true,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::attribute("category")],
            weighted: vec![
                weighted_by_override("weighted_return", "expected_return"),
                weighted_by_override("weighted_risk", "risk_score"),
            ],
            bands: Some(return_bands("expected_return", 10, 20)),
            excluded_statuses: vec![DecisionStatus::Reject, DecisionStatus::Defer],
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::OverrideReset,
    }
}

fn zero_based_justification() -> ScreenProfile {
    ScreenProfile {
        kind: ScreenKind::ZeroBasedJustification,
        title: "Zero-based justification".to_string(),
        layout: TableLayout {
            scenarios: scenarios(["Baseline", "Lean", "Strategic"]),
            key_fields: strings(&["department", "expense_type"]),
            attributes: Vec::new(),
            fields: vec![FieldSpec::text("justification")],
            tracks_status: true,
        },
        rules: AggregationRules {
            breakdowns: vec![Dimension::key_part("department", 0)],
            excluded_statuses: vec![DecisionStatus::Reject],
            ..AggregationRules::default()
        },
        status_cascade: StatusCascade::OverrideReset,
    }
}

#[cfg(test)]
mod tests {
    use super::{ScreenKind, ScreenProfile};

    #[test]
    fn every_screen_has_three_scenarios_and_key_fields() {
        for kind in ScreenKind::ALL {
            let profile = ScreenProfile::for_kind(kind);
            assert_eq!(profile.kind, kind);
            assert_eq!(profile.scenarios().len(), 3, "{kind} should define three scenarios");
            assert!(!profile.layout.key_fields.is_empty(), "{kind} needs a natural key");
        }
    }

    #[test]
    fn band_labels_match_thresholds() {
        for kind in ScreenKind::ALL {
            if let Some(bands) = ScreenProfile::for_kind(kind).rules.bands {
                assert_eq!(bands.labels.len(), bands.thresholds.len() + 1);
            }
        }
    }

    #[test]
    fn parses_kebab_and_spaced_names() {
        assert_eq!(ScreenKind::parse("capital-allocation"), Some(ScreenKind::CapitalAllocation));
        assert_eq!(
            ScreenKind::parse("Zero Based Justification"),
            Some(ScreenKind::ZeroBasedJustification)
        );
        assert!("budget".parse::<ScreenKind>().is_err());
    }
}
