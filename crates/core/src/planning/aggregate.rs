use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::PlanningItem;
use crate::domain::scenario::ScenarioName;
use crate::domain::status::DecisionStatus;
use crate::domain::value::{FieldValue, ScenarioValue};
use crate::planning::table::PlanningTable;

const METRIC_SCALE: u32 = 4;
const UNASSIGNED_LABEL: &str = "Unassigned";
const UNBANDED_LABEL: &str = "unbanded";

/// Where a per-item figure is read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum MetricSource {
    Override,
    Suggested,
    Field(String),
    Attribute(String),
}

impl MetricSource {
    pub fn read(&self, item: &PlanningItem, value: &ScenarioValue) -> Decimal {
        match self {
            Self::Override => value.override_amount,
            Self::Suggested => value.suggested,
            Self::Field(name) => value.number(name),
            Self::Attribute(name) => {
                item.attribute(name).and_then(FieldValue::as_decimal).unwrap_or(Decimal::ZERO)
            }
        }
    }
}

/// Grouping dimension for a breakdown, e.g. category or start quarter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub source: DimensionSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum DimensionSource {
    Attribute(String),
    Field(String),
    KeyPart(usize),
}

impl Dimension {
    pub fn attribute(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { source: DimensionSource::Attribute(name.clone()), name }
    }

    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { source: DimensionSource::Field(name.clone()), name }
    }

    pub fn key_part(name: impl Into<String>, index: usize) -> Self {
        Self { name: name.into(), source: DimensionSource::KeyPart(index) }
    }

    fn label(&self, item: &PlanningItem, value: &ScenarioValue) -> String {
        let label = match &self.source {
            DimensionSource::Attribute(name) => {
                item.attribute(name).map(FieldValue::display_text).unwrap_or_default()
            }
            DimensionSource::Field(name) => {
                value.fields.get(name).map(FieldValue::display_text).unwrap_or_default()
            }
            DimensionSource::KeyPart(index) => {
                item.key.parts().get(*index).cloned().unwrap_or_default()
            }
        };
        if label.is_empty() {
            UNASSIGNED_LABEL.to_string()
        } else {
            label
        }
    }
}

/// `Σ(rate · weight) / Σweight` over included items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedMetric {
    pub name: String,
    pub rate: MetricSource,
    pub weight: MetricSource,
}

/// `Σnumerator / Σdenominator` over included items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioMetric {
    pub name: String,
    pub numerator: MetricSource,
    pub denominator: MetricSource,
}

/// Half-open bands: `labels[0]` below `thresholds[0]`, `labels[i]` on
/// `[thresholds[i-1], thresholds[i])`, the last label at or above the last
/// threshold. Thresholds are ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandScheme {
    pub source: MetricSource,
    pub thresholds: Vec<Decimal>,
    pub labels: Vec<String>,
}

impl BandScheme {
    pub fn classify(&self, metric: Decimal) -> &str {
        let index = self.thresholds.iter().filter(|threshold| metric >= **threshold).count();
        self.labels.get(index).map_or(UNBANDED_LABEL, String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRules {
    #[serde(default)]
    pub breakdowns: Vec<Dimension>,
    #[serde(default)]
    pub field_sums: Vec<String>,
    #[serde(default)]
    pub weighted: Vec<WeightedMetric>,
    #[serde(default)]
    pub ratios: Vec<RatioMetric>,
    #[serde(default)]
    pub bands: Option<BandScheme>,
    /// Statuses that keep an item out of the main totals.
    #[serde(default)]
    pub excluded_statuses: Vec<DecisionStatus>,
}

impl AggregationRules {
    pub fn excludes(&self, value: &ScenarioValue) -> bool {
        value.status.is_some_and(|status| self.excluded_statuses.contains(&status))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandTally {
    pub items: usize,
    pub amount: Decimal,
}

/// Roll-up for one scenario. Always derived, never edited.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub scenario: ScenarioName,
    pub item_count: usize,
    pub included_count: usize,
    pub excluded_count: usize,
    pub total_suggested: Decimal,
    pub total_override: Decimal,
    /// Override sum across every item, excluded ones included.
    pub considered_override: Decimal,
    pub variance: Decimal,
    pub breakdowns: BTreeMap<String, BTreeMap<String, Decimal>>,
    pub field_sums: BTreeMap<String, Decimal>,
    pub weighted: BTreeMap<String, Decimal>,
    pub ratios: BTreeMap<String, Decimal>,
    pub bands: BTreeMap<String, BandTally>,
    pub status_counts: BTreeMap<DecisionStatus, usize>,
    /// Set when a sum or product left the decimal range. Affected figures are
    /// clamped to the nearest bound.
    #[serde(default)]
    pub overflowed: bool,
}

impl Totals {
    /// All-zero totals carrying every metric name the rules declare.
    pub fn zeroed(scenario: ScenarioName, rules: &AggregationRules) -> Self {
        Self {
            scenario,
            breakdowns: rules
                .breakdowns
                .iter()
                .map(|dimension| (dimension.name.clone(), BTreeMap::new()))
                .collect(),
            field_sums: rules.field_sums.iter().map(|name| (name.clone(), Decimal::ZERO)).collect(),
            weighted: rules
                .weighted
                .iter()
                .map(|metric| (metric.name.clone(), Decimal::ZERO))
                .collect(),
            ratios: rules.ratios.iter().map(|metric| (metric.name.clone(), Decimal::ZERO)).collect(),
            bands: rules
                .bands
                .iter()
                .flat_map(|scheme| scheme.labels.iter())
                .map(|label| (label.clone(), BandTally::default()))
                .collect(),
            ..Self::default()
        }
    }
}

/// Adds `amount` into `target`, clamping at the decimal bounds instead of
/// panicking.
fn accumulate(target: &mut Decimal, amount: Decimal, overflowed: &mut bool) {
    match target.checked_add(amount) {
        Some(sum) => *target = sum,
        None => {
            *target = target.saturating_add(amount);
            *overflowed = true;
        }
    }
}

fn product(left: Decimal, right: Decimal, overflowed: &mut bool) -> Decimal {
    left.checked_mul(right).unwrap_or_else(|| {
        *overflowed = true;
        left.saturating_mul(right)
    })
}

#[derive(Default)]
struct RunningRatio {
    numerator: Decimal,
    denominator: Decimal,
    overflowed: bool,
}

impl RunningRatio {
    fn add(&mut self, numerator: Decimal, denominator: Decimal) {
        accumulate(&mut self.numerator, numerator, &mut self.overflowed);
        accumulate(&mut self.denominator, denominator, &mut self.overflowed);
    }

    fn resolve(&self) -> Decimal {
        if self.denominator.is_zero() {
            return Decimal::ZERO;
        }
        self.numerator
            .checked_div(self.denominator)
            .map(|ratio| ratio.round_dp(METRIC_SCALE))
            .unwrap_or(Decimal::ZERO)
    }
}

/// Reduces the table to totals for `scenario`. Pure full recompute.
///
/// Excluded items are left out of the main sums, field sums, weighted
/// metrics, ratios and bands, but still land in every breakdown so that
/// "considered" and "allocated" can be compared per category. An unknown
/// scenario yields zeroed totals. Arithmetic never panics: out-of-range
/// sums clamp and set `Totals::overflowed`.
pub fn aggregate(table: &PlanningTable, scenario: &ScenarioName, rules: &AggregationRules) -> Totals {
    let mut totals = Totals::zeroed(scenario.clone(), rules);
    if !table.layout().has_scenario(scenario) {
        return totals;
    }

    let mut weighted: Vec<RunningRatio> =
        rules.weighted.iter().map(|_| RunningRatio::default()).collect();
    let mut ratios: Vec<RunningRatio> =
        rules.ratios.iter().map(|_| RunningRatio::default()).collect();
    let mut overflowed = false;

    for item in table.items() {
        let value = item.value_or_zero(scenario);
        totals.item_count += 1;
        accumulate(&mut totals.considered_override, value.override_amount, &mut overflowed);

        for dimension in &rules.breakdowns {
            let label = dimension.label(item, value);
            if let Some(breakdown) = totals.breakdowns.get_mut(&dimension.name) {
                let slot = breakdown.entry(label).or_insert(Decimal::ZERO);
                accumulate(slot, value.override_amount, &mut overflowed);
            }
        }

        if let Some(status) = value.status {
            *totals.status_counts.entry(status).or_insert(0) += 1;
        }

        if rules.excludes(value) {
            totals.excluded_count += 1;
            continue;
        }

        totals.included_count += 1;
        accumulate(&mut totals.total_suggested, value.suggested, &mut overflowed);
        accumulate(&mut totals.total_override, value.override_amount, &mut overflowed);

        for name in &rules.field_sums {
            if let Some(sum) = totals.field_sums.get_mut(name) {
                accumulate(sum, value.number(name), &mut overflowed);
            }
        }

        for (metric, running) in rules.weighted.iter().zip(weighted.iter_mut()) {
            let weight = metric.weight.read(item, value);
            let contribution = product(metric.rate.read(item, value), weight, &mut overflowed);
            running.add(contribution, weight);
        }

        for (metric, running) in rules.ratios.iter().zip(ratios.iter_mut()) {
            running.add(metric.numerator.read(item, value), metric.denominator.read(item, value));
        }

        if let Some(scheme) = &rules.bands {
            let label = scheme.classify(scheme.source.read(item, value)).to_string();
            let tally = totals.bands.entry(label).or_default();
            tally.items += 1;
            accumulate(&mut tally.amount, value.override_amount, &mut overflowed);
        }
    }

    totals.variance = match totals.total_override.checked_sub(totals.total_suggested) {
        Some(variance) => variance,
        None => {
            overflowed = true;
            totals.total_override.saturating_sub(totals.total_suggested)
        }
    };
    for (metric, running) in rules.weighted.iter().zip(&weighted) {
        overflowed |= running.overflowed;
        totals.weighted.insert(metric.name.clone(), running.resolve());
    }
    for (metric, running) in rules.ratios.iter().zip(&ratios) {
        overflowed |= running.overflowed;
        totals.ratios.insert(metric.name.clone(), running.resolve());
    }
    totals.overflowed = overflowed;

    totals
}

/// Totals for every scenario the table defines.
pub fn aggregate_all(
    table: &PlanningTable,
    rules: &AggregationRules,
) -> BTreeMap<ScenarioName, Totals> {
    table
        .scenarios()
        .iter()
        .map(|scenario| (scenario.clone(), aggregate(table, scenario, rules)))
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        aggregate, aggregate_all, AggregationRules, BandScheme, Dimension, MetricSource,
        RatioMetric, WeightedMetric,
    };
    use crate::domain::item::PlanningItem;
    use crate::domain::scenario::ScenarioName;
    use crate::domain::status::DecisionStatus;
    use crate::domain::value::ScenarioValue;
    use crate::planning::table::tests::layout;
    use crate::planning::table::PlanningTable;

    fn rules() -> AggregationRules {
        AggregationRules {
            breakdowns: vec![Dimension::attribute("category")],
            field_sums: vec!["expected_return".to_string()],
            weighted: vec![WeightedMetric {
                name: "weighted_return".to_string(),
                rate: MetricSource::Field("expected_return".to_string()),
                weight: MetricSource::Override,
            }],
            ratios: vec![RatioMetric {
                name: "override_to_suggested".to_string(),
                numerator: MetricSource::Override,
                denominator: MetricSource::Suggested,
            }],
            bands: Some(BandScheme {
                source: MetricSource::Field("expected_return".to_string()),
                thresholds: vec![Decimal::new(20, 0), Decimal::new(30, 0)],
                labels: vec!["low".to_string(), "medium".to_string(), "high".to_string()],
            }),
            excluded_statuses: vec![DecisionStatus::Reject],
        }
    }

    fn project(name: &str, category: &str, amount: i64, rate: i64) -> PlanningItem {
        PlanningItem::new(name).with_attribute("category", category).with_scenario(
            "Baseline",
            ScenarioValue::from_suggestion(Decimal::new(amount, 0))
                .with_field("expected_return", Decimal::new(rate, 0)),
        )
    }

    fn baseline() -> ScenarioName {
        ScenarioName::from("Baseline")
    }

    #[test]
    fn weighted_return_uses_override_as_weight() {
        let table = PlanningTable::from_items(
            layout(),
            [project("A", "Infra", 100, 10), project("B", "Infra", 300, 20)],
        )
        .expect("table");

        let totals = aggregate(&table, &baseline(), &rules());
        assert_eq!(totals.total_override, Decimal::new(400, 0));
        assert_eq!(totals.weighted["weighted_return"], Decimal::new(175, 1));
        assert_eq!(totals.ratios["override_to_suggested"], Decimal::ONE);
        assert_eq!(totals.field_sums["expected_return"], Decimal::new(30, 0));
        assert!(!totals.overflowed);
    }

    #[test]
    fn out_of_range_sums_clamp_instead_of_panicking() {
        let huge = PlanningItem::new("Huge").with_attribute("category", "Infra").with_scenario(
            "Baseline",
            ScenarioValue::from_suggestion(Decimal::MAX)
                .with_field("expected_return", Decimal::new(25, 0)),
        );
        let table = PlanningTable::from_items(layout(), [huge, project("B", "Infra", 100, 10)])
            .expect("table");

        let totals = aggregate(&table, &baseline(), &rules());
        assert!(totals.overflowed);
        assert_eq!(totals.total_override, Decimal::MAX);
        assert_eq!(totals.breakdowns["category"]["Infra"], Decimal::MAX);
        assert_eq!(totals.item_count, 2);
    }

    #[test]
    fn band_threshold_belongs_to_higher_band() {
        let scheme = rules().bands.expect("bands");
        assert_eq!(scheme.classify(Decimal::new(1999, 2)), "low");
        assert_eq!(scheme.classify(Decimal::new(20, 0)), "medium");
        assert_eq!(scheme.classify(Decimal::new(30, 0)), "high");
    }

    #[test]
    fn band_tallies_count_included_items() {
        let table = PlanningTable::from_items(
            layout(),
            [project("A", "Infra", 100, 20), project("B", "Infra", 300, 35)],
        )
        .expect("table");

        let totals = aggregate(&table, &baseline(), &rules());
        assert_eq!(totals.bands["medium"].items, 1);
        assert_eq!(totals.bands["high"].amount, Decimal::new(300, 0));
        assert_eq!(totals.bands["low"].items, 0);
    }

    #[test]
    fn unknown_scenario_yields_zeroed_totals() {
        let table =
            PlanningTable::from_items(layout(), [project("A", "Infra", 100, 10)]).expect("table");

        let totals = aggregate(&table, &ScenarioName::from("Moonshot"), &rules());
        assert_eq!(totals.item_count, 0);
        assert_eq!(totals.total_override, Decimal::ZERO);
        assert_eq!(totals.weighted["weighted_return"], Decimal::ZERO);
        assert!(totals.breakdowns["category"].is_empty());
    }

    #[test]
    fn missing_scenario_entries_contribute_zero() {
        let table =
            PlanningTable::from_items(layout(), [project("A", "Infra", 100, 10)]).expect("table");

        let totals = aggregate(&table, &ScenarioName::from("Aggressive"), &rules());
        assert_eq!(totals.item_count, 1);
        assert_eq!(totals.total_override, Decimal::ZERO);
        assert_eq!(totals.breakdowns["category"]["Infra"], Decimal::ZERO);
    }

    #[test]
    fn status_counts_include_excluded_items() {
        let mut rejected = project("B", "Infra", 300, 20);
        if let Some(value) = rejected.scenarios.get_mut(&baseline()) {
            value.status = Some(DecisionStatus::Reject);
        }
        let table =
            PlanningTable::from_items(layout(), [project("A", "Infra", 100, 10), rejected])
                .expect("table");

        let totals = aggregate(&table, &baseline(), &rules());
        assert_eq!(totals.status_counts[&DecisionStatus::Reject], 1);
        assert_eq!(totals.excluded_count, 1);
        assert_eq!(totals.included_count, 1);
        assert_eq!(totals.considered_override, Decimal::new(400, 0));
    }

    #[test]
    fn aggregate_all_covers_every_scenario() {
        let table =
            PlanningTable::from_items(layout(), [project("A", "Infra", 100, 10)]).expect("table");

        let all = aggregate_all(&table, &rules());
        assert_eq!(all.len(), 2);
        assert_eq!(all[&baseline()].total_override, Decimal::new(100, 0));
        assert_eq!(all[&ScenarioName::from("Aggressive")].total_override, Decimal::ZERO);
    }
}
