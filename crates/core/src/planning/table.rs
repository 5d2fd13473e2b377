use serde::{Deserialize, Serialize};

use crate::domain::item::{ItemKey, PlanningItem};
use crate::domain::scenario::ScenarioName;
use crate::domain::status::DecisionStatus;
use crate::domain::value::{FieldValue, ScenarioValue};
use crate::errors::DomainError;
use crate::planning::coerce::NumericPolicy;
use crate::planning::outcome::FieldOutcome;
use crate::planning::status_policy::StatusPolicy;

pub const SUGGESTED_FIELD: &str = "suggested";
pub const OVERRIDE_FIELD: &str = "override";
pub const STATUS_FIELD: &str = "status";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn number(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Number }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Text }
    }
}

/// Shape shared by every item in a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub scenarios: Vec<ScenarioName>,
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub tracks_status: bool,
}

impl TableLayout {
    pub fn has_scenario(&self, scenario: &ScenarioName) -> bool {
        self.scenarios.contains(scenario)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn is_key_field(&self, name: &str) -> bool {
        self.key_fields.iter().any(|field| field == name)
    }

    pub fn is_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute == name)
    }

    /// Builds the natural key from a flat row using the key fields in order.
    /// Returns `None` when any key component is missing or blank.
    pub fn key_from_row<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a FieldValue>,
    ) -> Option<ItemKey> {
        let mut parts = Vec::with_capacity(self.key_fields.len());
        for field in &self.key_fields {
            let value = lookup(field)?;
            if value.is_empty() {
                return None;
            }
            parts.push(value.display_text());
        }
        (!parts.is_empty()).then(|| ItemKey::composite(parts))
    }
}

/// Ordered collection of planning items with unique natural keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningTable {
    layout: TableLayout,
    items: Vec<PlanningItem>,
}

impl PlanningTable {
    pub fn new(layout: TableLayout) -> Self {
        Self { layout, items: Vec::new() }
    }

    pub fn from_items(
        layout: TableLayout,
        items: impl IntoIterator<Item = PlanningItem>,
    ) -> Result<Self, DomainError> {
        let mut table = Self::new(layout);
        for item in items {
            table.insert(item)?;
        }
        Ok(table)
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn scenarios(&self) -> &[ScenarioName] {
        &self.layout.scenarios
    }

    pub fn items(&self) -> &[PlanningItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: PlanningItem) -> Result<(), DomainError> {
        if item.key.parts().len() != self.layout.key_fields.len() {
            return Err(DomainError::InvariantViolation(format!(
                "key `{}` has {} parts but the table expects {}",
                item.key,
                item.key.parts().len(),
                self.layout.key_fields.len()
            )));
        }
        if self.items.iter().any(|existing| existing.key == item.key) {
            return Err(DomainError::DuplicateKey { key: item.key.to_string() });
        }
        self.items.push(item);
        Ok(())
    }

    /// Re-checks key shape and uniqueness, for tables that bypassed `insert`
    /// (deserialized ones, for instance).
    pub fn check_keys(&self) -> Result<(), DomainError> {
        let mut seen = std::collections::BTreeSet::new();
        for item in &self.items {
            if item.key.parts().len() != self.layout.key_fields.len() {
                return Err(DomainError::InvariantViolation(format!(
                    "key `{}` has {} parts but the table expects {}",
                    item.key,
                    item.key.parts().len(),
                    self.layout.key_fields.len()
                )));
            }
            if !seen.insert(&item.key) {
                return Err(DomainError::DuplicateKey { key: item.key.to_string() });
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &ItemKey) -> Option<&PlanningItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    /// Read accessor for the render boundary: the item's value for `scenario`,
    /// or the zero value when either the item or the scenario entry is absent.
    pub fn value(&self, key: &ItemKey, scenario: &ScenarioName) -> &ScenarioValue {
        match self.get(key) {
            Some(item) => item.value_or_zero(scenario),
            None => &crate::domain::value::ZERO_SCENARIO_VALUE,
        }
    }

    /// Position of the single item carrying `key`. More than one match means
    /// the uniqueness invariant was broken upstream.
    pub fn locate(&self, key: &ItemKey) -> Result<Option<usize>, DomainError> {
        let mut matches = self.items.iter().enumerate().filter(|(_, item)| &item.key == key);
        let first = matches.next().map(|(index, _)| index);
        let extra = matches.count();
        if extra > 0 {
            return Err(DomainError::AmbiguousKey { key: key.to_string(), matches: extra + 1 });
        }
        Ok(first)
    }

    /// Replaces one field of one scenario value.
    pub fn set_field(
        &mut self,
        key: &ItemKey,
        scenario: &ScenarioName,
        field: &str,
        value: FieldValue,
        policy: NumericPolicy,
    ) -> Result<FieldOutcome, DomainError> {
        let index = self.require_item(key, scenario)?;
        let current = self.items[index].value_or_zero(scenario).clone();

        let (updated, outcome) = match field {
            SUGGESTED_FIELD => {
                return Err(DomainError::ReadOnlyField { field: field.to_string() });
            }
            STATUS_FIELD => {
                return Err(DomainError::InvariantViolation(
                    "status changes go through set_status".to_string(),
                ));
            }
            OVERRIDE_FIELD => {
                let (amount, outcome) = policy.resolve(field, &value)?;
                (current.with_override(amount), outcome)
            }
            _ => {
                let spec = self
                    .layout
                    .field(field)
                    .ok_or_else(|| DomainError::UnknownField { field: field.to_string() })?;
                match spec.kind {
                    FieldKind::Number => {
                        let (amount, outcome) = policy.resolve(field, &value)?;
                        (current.with_field(field, amount), outcome)
                    }
                    FieldKind::Text => {
                        let text = match value {
                            FieldValue::Empty => FieldValue::Empty,
                            other => FieldValue::Text(other.display_text()),
                        };
                        (current.with_field(field, text), FieldOutcome::Applied)
                    }
                }
            }
        };

        self.items[index].scenarios.insert(scenario.clone(), updated);
        Ok(outcome)
    }

    /// Sets the decision status and runs the screen's cascade.
    pub fn set_status<P>(
        &mut self,
        key: &ItemKey,
        scenario: &ScenarioName,
        status: DecisionStatus,
        policy: &P,
    ) -> Result<&ScenarioValue, DomainError>
    where
        P: StatusPolicy + ?Sized,
    {
        if !self.layout.tracks_status {
            return Err(DomainError::StatusNotTracked);
        }
        let index = self.require_item(key, scenario)?;
        let current = self.items[index].value_or_zero(scenario).clone();
        let updated = policy.apply(current, status);

        let item = &mut self.items[index];
        item.scenarios.insert(scenario.clone(), updated);
        Ok(item.value_or_zero(scenario))
    }

    pub(crate) fn replace_value(
        &mut self,
        index: usize,
        scenario: &ScenarioName,
        value: ScenarioValue,
    ) {
        if let Some(item) = self.items.get_mut(index) {
            item.scenarios.insert(scenario.clone(), value);
        }
    }

    fn require_item(&self, key: &ItemKey, scenario: &ScenarioName) -> Result<usize, DomainError> {
        if !self.layout.has_scenario(scenario) {
            return Err(DomainError::UnknownScenario { scenario: scenario.to_string() });
        }
        self.locate(key)?.ok_or_else(|| DomainError::UnknownItem { key: key.to_string() })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal::Decimal;

    use super::{FieldSpec, PlanningTable, TableLayout};
    use crate::domain::item::{ItemKey, PlanningItem};
    use crate::domain::scenario::ScenarioName;
    use crate::domain::status::DecisionStatus;
    use crate::domain::value::{FieldValue, ScenarioValue};
    use crate::errors::DomainError;
    use crate::planning::coerce::NumericPolicy;
    use crate::planning::outcome::FieldOutcome;
    use crate::planning::status_policy::StatusCascade;

    pub(crate) fn layout() -> TableLayout {
        TableLayout {
            scenarios: vec!["Baseline".into(), "Aggressive".into()],
            key_fields: vec!["project".to_string()],
            attributes: vec!["category".to_string()],
            fields: vec![FieldSpec::number("expected_return"), FieldSpec::text("notes")],
            tracks_status: true,
        }
    }

    pub(crate) fn item(name: &str, category: &str, amount: i64) -> PlanningItem {
        PlanningItem::new(name)
            .with_attribute("category", category)
            .with_scenario("Baseline", ScenarioValue::from_suggestion(Decimal::new(amount, 0)))
    }

    fn table() -> PlanningTable {
        PlanningTable::from_items(
            layout(),
            [item("Data Center", "Infrastructure", 1000), item("CRM Upgrade", "Software", 400)],
        )
        .expect("unique keys")
    }

    fn baseline() -> ScenarioName {
        ScenarioName::from("Baseline")
    }

    #[test]
    fn rejects_duplicate_keys() {
        let error = PlanningTable::from_items(
            layout(),
            [item("Data Center", "Infrastructure", 1), item("Data Center", "Software", 2)],
        )
        .expect_err("duplicate keys should be refused");

        assert_eq!(error, DomainError::DuplicateKey { key: "Data Center".to_string() });
    }

    #[test]
    fn set_field_updates_override_only_for_one_scenario() {
        let mut table = table();
        let key = ItemKey::from("Data Center");

        let outcome = table
            .set_field(
                &key,
                &baseline(),
                "override",
                FieldValue::Number(Decimal::new(1200, 0)),
                NumericPolicy::Lenient,
            )
            .expect("override should be editable");

        assert_eq!(outcome, FieldOutcome::Applied);
        let value = table.value(&key, &baseline());
        assert_eq!(value.override_amount, Decimal::new(1200, 0));
        assert_eq!(value.suggested, Decimal::new(1000, 0));
        assert_eq!(
            table.value(&key, &ScenarioName::from("Aggressive")).override_amount,
            Decimal::ZERO
        );
    }

    #[test]
    fn set_field_coerces_bad_numbers_under_lenient_policy() {
        let mut table = table();
        let key = ItemKey::from("CRM Upgrade");

        let outcome = table
            .set_field(&key, &baseline(), "expected_return", "tbd".into(), NumericPolicy::Lenient)
            .expect("lenient policy coerces");

        assert_eq!(outcome, FieldOutcome::Coerced { raw: "tbd".to_string() });
        assert_eq!(table.value(&key, &baseline()).number("expected_return"), Decimal::ZERO);
    }

    #[test]
    fn set_field_refuses_suggested_and_unknown_fields() {
        let mut table = table();
        let key = ItemKey::from("CRM Upgrade");

        let read_only = table
            .set_field(&key, &baseline(), "suggested", "5".into(), NumericPolicy::Lenient)
            .expect_err("suggested is read-only");
        assert!(matches!(read_only, DomainError::ReadOnlyField { .. }));

        let unknown = table
            .set_field(&key, &baseline(), "color", "blue".into(), NumericPolicy::Lenient)
            .expect_err("unknown field");
        assert!(matches!(unknown, DomainError::UnknownField { .. }));

        let scenario = table
            .set_field(
                &key,
                &ScenarioName::from("Moonshot"),
                "override",
                "5".into(),
                NumericPolicy::Lenient,
            )
            .expect_err("unknown scenario");
        assert!(matches!(scenario, DomainError::UnknownScenario { .. }));
    }

    #[test]
    fn text_fields_store_display_text() {
        let mut table = table();
        let key = ItemKey::from("CRM Upgrade");

        table
            .set_field(
                &key,
                &baseline(),
                "notes",
                FieldValue::Number(Decimal::new(42, 0)),
                NumericPolicy::Strict,
            )
            .expect("text field accepts any cell");

        assert_eq!(table.value(&key, &baseline()).text("notes"), Some("42"));
    }

    #[test]
    fn set_status_applies_cascade() {
        let mut table = table();
        let key = ItemKey::from("Data Center");

        let value = table
            .set_status(&key, &baseline(), DecisionStatus::Reject, &StatusCascade::OverrideReset)
            .expect("status tracked");
        assert_eq!(value.override_amount, Decimal::ZERO);

        let value = table
            .set_status(&key, &baseline(), DecisionStatus::Approve, &StatusCascade::OverrideReset)
            .expect("status tracked");
        assert_eq!(value.override_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn locate_reports_ambiguous_keys() {
        let raw = serde_json::json!({
            "layout": layout(),
            "items": [item("Data Center", "A", 1), item("Data Center", "B", 2)],
        });
        let table: PlanningTable = serde_json::from_value(raw).expect("table should deserialize");

        let error = table.locate(&ItemKey::from("Data Center")).expect_err("two matches");
        assert_eq!(error, DomainError::AmbiguousKey { key: "Data Center".to_string(), matches: 2 });
        assert_eq!(
            table.check_keys(),
            Err(DomainError::DuplicateKey { key: "Data Center".to_string() })
        );
    }
}
