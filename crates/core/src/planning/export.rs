use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::scenario::ScenarioName;
use crate::domain::value::FieldValue;
use crate::planning::table::{PlanningTable, OVERRIDE_FIELD, STATUS_FIELD, SUGGESTED_FIELD};

/// Flat rows for an external tabular writer. Column order is the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    pub scenario: ScenarioName,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl ExportTable {
    /// Rows keyed by column name, for writers that do not care about order.
    pub fn records(&self) -> Vec<BTreeMap<String, FieldValue>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Columns: key fields, static attributes, `suggested`, `override`,
/// `status` when tracked, then domain fields in layout order.
pub fn export_rows(table: &PlanningTable, scenario: &ScenarioName) -> ExportTable {
    let layout = table.layout();

    let mut columns: Vec<String> = layout.key_fields.clone();
    columns.extend(layout.attributes.iter().cloned());
    columns.push(SUGGESTED_FIELD.to_string());
    columns.push(OVERRIDE_FIELD.to_string());
    if layout.tracks_status {
        columns.push(STATUS_FIELD.to_string());
    }
    columns.extend(layout.fields.iter().map(|spec| spec.name.clone()));

    let rows = table
        .items()
        .iter()
        .map(|item| {
            let value = item.value_or_zero(scenario);
            let mut row: Vec<FieldValue> = Vec::with_capacity(columns.len());

            row.extend(item.key.parts().iter().map(|part| FieldValue::Text(part.clone())));
            row.extend(
                layout
                    .attributes
                    .iter()
                    .map(|name| item.attribute(name).cloned().unwrap_or(FieldValue::Empty)),
            );
            row.push(FieldValue::Number(value.suggested));
            row.push(FieldValue::Number(value.override_amount));
            if layout.tracks_status {
                row.push(
                    value
                        .status
                        .map(|status| FieldValue::Text(status.as_str().to_string()))
                        .unwrap_or(FieldValue::Empty),
                );
            }
            row.extend(
                layout
                    .fields
                    .iter()
                    .map(|spec| value.fields.get(&spec.name).cloned().unwrap_or(FieldValue::Empty)),
            );
            row
        })
        .collect();

    ExportTable { scenario: scenario.clone(), columns, rows }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::export_rows;
    use crate::domain::scenario::ScenarioName;
    use crate::domain::value::FieldValue;
    use crate::planning::table::tests::{item, layout};
    use crate::planning::table::PlanningTable;

    #[test]
    fn columns_follow_layout_order() {
        let table = PlanningTable::from_items(layout(), [item("Data Center", "Infrastructure", 1000)])
            .expect("table");

        let export = export_rows(&table, &ScenarioName::from("Baseline"));
        assert_eq!(
            export.columns,
            ["project", "category", "suggested", "override", "status", "expected_return", "notes"]
        );
        assert_eq!(
            export.rows[0],
            vec![
                FieldValue::Text("Data Center".to_string()),
                FieldValue::Text("Infrastructure".to_string()),
                FieldValue::Number(Decimal::new(1000, 0)),
                FieldValue::Number(Decimal::new(1000, 0)),
                FieldValue::Empty,
                FieldValue::Empty,
                FieldValue::Empty,
            ]
        );
    }

    #[test]
    fn records_pair_columns_with_cells() {
        let table = PlanningTable::from_items(layout(), [item("Data Center", "Infrastructure", 1000)])
            .expect("table");

        let records = export_rows(&table, &ScenarioName::from("Aggressive")).records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["override"], FieldValue::Number(Decimal::ZERO));
        assert_eq!(records[0]["project"], FieldValue::Text("Data Center".to_string()));
    }
}
