use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::item::ItemKey;
use crate::domain::scenario::ScenarioName;
use crate::domain::status::DecisionStatus;
use crate::domain::value::FieldValue;
use crate::errors::DomainError;
use crate::planning::coerce::NumericPolicy;
use crate::planning::outcome::{FieldOutcome, FieldSkipReason};
use crate::planning::table::{FieldKind, PlanningTable, OVERRIDE_FIELD, STATUS_FIELD, SUGGESTED_FIELD};

/// One externally parsed row: column name to cell.
pub type ImportRow = BTreeMap<String, FieldValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSkipReason {
    MissingKey,
    UnknownKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRow {
    pub row_index: usize,
    pub key: ItemKey,
    pub fields: BTreeMap<String, FieldOutcome>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_index: usize,
    pub key: Option<ItemKey>,
    pub reason: RowSkipReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub scenario: ScenarioName,
    pub rows_received: usize,
    pub applied: Vec<AppliedRow>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn coerced_count(&self) -> usize {
        self.applied
            .iter()
            .flat_map(|row| row.fields.values())
            .filter(|outcome| outcome.is_coerced())
            .count()
    }

    pub fn skipped_field_count(&self) -> usize {
        self.applied
            .iter()
            .flat_map(|row| row.fields.values())
            .filter(|outcome| outcome.is_skipped())
            .count()
    }
}

/// Merges `rows` into the `scenario` values of existing items.
///
/// Rows are matched by natural key and never create items. Only columns
/// present in a row are written; everything else on the scenario value is
/// left as it was. Rows are applied in order, so a key repeated later in the
/// batch overwrites what the earlier row wrote. Status columns are recorded
/// as-is without running a status cascade.
pub fn reconcile(
    table: &mut PlanningTable,
    scenario: &ScenarioName,
    rows: &[ImportRow],
    policy: NumericPolicy,
) -> Result<ImportReport, DomainError> {
    if !table.layout().has_scenario(scenario) {
        return Err(DomainError::UnknownScenario { scenario: scenario.to_string() });
    }

    let mut report = ImportReport {
        scenario: scenario.clone(),
        rows_received: rows.len(),
        applied: Vec::new(),
        skipped: Vec::new(),
    };

    // Resolve every row before writing so an ambiguous key leaves the table
    // untouched.
    let mut targets = Vec::with_capacity(rows.len());
    for row in rows {
        let key = table.layout().key_from_row(|field| row.get(field));
        let index = match &key {
            Some(key) => table.locate(key)?,
            None => None,
        };
        targets.push((key, index));
    }

    for ((row_index, row), (key, index)) in rows.iter().enumerate().zip(targets) {
        let Some(key) = key else {
            warn!(
                event_name = "planning.import.row_skipped",
                row_index,
                reason = "missing_key",
                "import row has no natural key"
            );
            report.skipped.push(SkippedRow { row_index, key: None, reason: RowSkipReason::MissingKey });
            continue;
        };

        let Some(index) = index else {
            warn!(
                event_name = "planning.import.row_skipped",
                row_index,
                key = %key,
                reason = "unknown_key",
                "import row does not match any planning item"
            );
            report.skipped.push(SkippedRow {
                row_index,
                key: Some(key),
                reason: RowSkipReason::UnknownKey,
            });
            continue;
        };

        let mut value = table.items()[index].value_or_zero(scenario).clone();
        let mut fields = BTreeMap::new();

        for (column, cell) in row {
            let layout = table.layout();
            if layout.is_key_field(column) {
                continue;
            }

            let outcome = match column.as_str() {
                SUGGESTED_FIELD => FieldOutcome::Skipped { reason: FieldSkipReason::ReadOnly },
                OVERRIDE_FIELD => match policy.resolve(column, cell) {
                    Ok((amount, outcome)) => {
                        value.override_amount = amount;
                        outcome
                    }
                    Err(_) => FieldOutcome::Skipped { reason: FieldSkipReason::InvalidNumeric },
                },
                STATUS_FIELD if layout.tracks_status => {
                    match DecisionStatus::parse(&cell.display_text()) {
                        Some(status) => {
                            value.status = Some(status);
                            FieldOutcome::Applied
                        }
                        None => FieldOutcome::Skipped { reason: FieldSkipReason::InvalidStatus },
                    }
                }
                name if layout.is_attribute(name) => {
                    FieldOutcome::Skipped { reason: FieldSkipReason::StaticAttribute }
                }
                name => match layout.field(name).map(|spec| spec.kind) {
                    Some(FieldKind::Number) => match policy.resolve(name, cell) {
                        Ok((amount, outcome)) => {
                            value.fields.insert(name.to_string(), FieldValue::Number(amount));
                            outcome
                        }
                        Err(_) => {
                            FieldOutcome::Skipped { reason: FieldSkipReason::InvalidNumeric }
                        }
                    },
                    Some(FieldKind::Text) => {
                        let text = match cell {
                            FieldValue::Empty => FieldValue::Empty,
                            other => FieldValue::Text(other.display_text()),
                        };
                        value.fields.insert(name.to_string(), text);
                        FieldOutcome::Applied
                    }
                    None => FieldOutcome::Skipped { reason: FieldSkipReason::UnknownField },
                },
            };

            if let FieldOutcome::Coerced { raw } = &outcome {
                debug!(
                    event_name = "planning.import.field_coerced",
                    row_index,
                    key = %key,
                    field = column.as_str(),
                    raw = raw.as_str(),
                    "non-numeric import value stored as zero"
                );
            }
            fields.insert(column.clone(), outcome);
        }

        table.replace_value(index, scenario, value);
        report.applied.push(AppliedRow { row_index, key, fields });
    }

    if !report.skipped.is_empty() {
        warn!(
            event_name = "planning.import.completed_with_skips",
            scenario = %scenario,
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            "import finished with skipped rows"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{reconcile, ImportRow, RowSkipReason};
    use crate::domain::item::ItemKey;
    use crate::domain::scenario::ScenarioName;
    use crate::domain::status::DecisionStatus;
    use crate::domain::value::FieldValue;
    use crate::errors::DomainError;
    use crate::planning::coerce::NumericPolicy;
    use crate::planning::outcome::{FieldOutcome, FieldSkipReason};
    use crate::planning::table::tests::{item, layout};
    use crate::planning::table::PlanningTable;

    fn row(cells: &[(&str, FieldValue)]) -> ImportRow {
        cells.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
    }

    fn table() -> PlanningTable {
        PlanningTable::from_items(layout(), [item("Data Center", "Infrastructure", 1000)])
            .expect("table")
    }

    fn baseline() -> ScenarioName {
        ScenarioName::from("Baseline")
    }

    #[test]
    fn status_column_is_recorded_without_cascade() {
        let mut table = table();
        let rows = [row(&[("project", "Data Center".into()), ("status", "Rejected".into())])];

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect("import should run");

        assert_eq!(report.applied_count(), 1);
        let value = table.value(&ItemKey::from("Data Center"), &baseline());
        assert_eq!(value.status, Some(DecisionStatus::Reject));
        assert_eq!(value.override_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn read_only_and_attribute_columns_are_reported_as_skipped() {
        let mut table = table();
        let rows = [row(&[
            ("project", "Data Center".into()),
            ("suggested", FieldValue::Number(Decimal::ONE)),
            ("category", "Software".into()),
            ("color", "red".into()),
        ])];

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect("import should run");

        let fields = &report.applied[0].fields;
        assert_eq!(fields["suggested"], FieldOutcome::Skipped { reason: FieldSkipReason::ReadOnly });
        assert_eq!(
            fields["category"],
            FieldOutcome::Skipped { reason: FieldSkipReason::StaticAttribute }
        );
        assert_eq!(
            fields["color"],
            FieldOutcome::Skipped { reason: FieldSkipReason::UnknownField }
        );
        assert_eq!(report.skipped_field_count(), 3);
        assert_eq!(
            table.get(&ItemKey::from("Data Center")).and_then(|item| item.attribute("category")),
            Some(&FieldValue::Text("Infrastructure".to_string()))
        );
    }

    #[test]
    fn rows_without_key_are_skipped() {
        let mut table = table();
        let rows = [row(&[("override", FieldValue::Number(Decimal::TEN))])];

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect("import should run");

        assert_eq!(report.skipped[0].reason, RowSkipReason::MissingKey);
        assert_eq!(report.applied_count(), 0);
    }

    #[test]
    fn strict_policy_skips_malformed_numbers_and_keeps_old_value() {
        let mut table = table();
        let rows = [row(&[("project", "Data Center".into()), ("override", "lots".into())])];

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Strict)
            .expect("import should run");

        assert_eq!(
            report.applied[0].fields["override"],
            FieldOutcome::Skipped { reason: FieldSkipReason::InvalidNumeric }
        );
        assert_eq!(
            table.value(&ItemKey::from("Data Center"), &baseline()).override_amount,
            Decimal::new(1000, 0)
        );
    }

    #[test]
    fn lenient_policy_counts_coerced_fields() {
        let mut table = table();
        let rows = [row(&[("project", "Data Center".into()), ("override", "lots".into())])];

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect("import should run");

        assert_eq!(report.coerced_count(), 1);
        assert_eq!(
            table.value(&ItemKey::from("Data Center"), &baseline()).override_amount,
            Decimal::ZERO
        );
    }

    #[test]
    fn unknown_scenario_is_refused() {
        let mut table = table();
        let error = reconcile(&mut table, &ScenarioName::from("Moonshot"), &[], NumericPolicy::Lenient)
            .expect_err("scenario must exist");
        assert!(matches!(error, DomainError::UnknownScenario { .. }));
    }

    #[test]
    fn ambiguous_key_aborts_before_any_row_is_written() {
        let raw = serde_json::json!({
            "layout": layout(),
            "items": [
                item("Data Center", "Infrastructure", 1000),
                item("CRM Upgrade", "Software", 400),
                item("CRM Upgrade", "Software", 400),
            ],
        });
        let mut table: PlanningTable =
            serde_json::from_value(raw).expect("table should deserialize");
        let rows = [
            row(&[("project", "Data Center".into()), ("override", Decimal::new(999, 0).into())]),
            row(&[("project", "CRM Upgrade".into()), ("override", Decimal::new(5, 0).into())]),
        ];

        let error = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect_err("duplicate key is a data-integrity error");
        assert_eq!(error, DomainError::AmbiguousKey { key: "CRM Upgrade".to_string(), matches: 2 });
        assert_eq!(
            table.value(&ItemKey::from("Data Center"), &baseline()).override_amount,
            Decimal::new(1000, 0)
        );
    }

    #[test]
    fn zero_padded_keys_from_json_rows_still_match() {
        let mut table =
            PlanningTable::from_items(layout(), [item("007", "Infrastructure", 100)]).expect("table");
        let rows: Vec<ImportRow> =
            serde_json::from_str(r#"[{"project": "007", "override": 5}]"#).expect("rows should parse");

        let report = reconcile(&mut table, &baseline(), &rows, NumericPolicy::Lenient)
            .expect("import should run");

        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(
            table.value(&ItemKey::from("007"), &baseline()).override_amount,
            Decimal::new(5, 0)
        );
    }
}
