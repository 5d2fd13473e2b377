use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::item::{ItemKey, PlanningItem};
use crate::domain::scenario::{Assumptions, ScenarioName};
use crate::domain::status::DecisionStatus;
use crate::domain::value::{FieldValue, ScenarioValue};
use crate::errors::DomainError;
use crate::planning::aggregate::{aggregate, aggregate_all, Totals};
use crate::planning::coerce::NumericPolicy;
use crate::planning::export::{export_rows, ExportTable};
use crate::planning::outcome::FieldOutcome;
use crate::planning::profiles::ScreenProfile;
use crate::planning::reconcile::{reconcile, ImportReport, ImportRow};
use crate::planning::table::PlanningTable;
use crate::planning::versions::{Snapshot, VersionComparison, VersionStore};

/// One item as the render layer sees it under the active scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item: PlanningItem,
    pub value: ScenarioValue,
    pub excluded: bool,
    pub band: Option<String>,
}

/// Read-only projection handed to the render layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub scenario: ScenarioName,
    pub revision: u64,
    pub dirty: bool,
    pub items: Vec<ResolvedItem>,
    pub totals: Totals,
}

/// Single-writer editing session over one planning screen.
///
/// Every mutation runs to completion and bumps `revision`; totals are always
/// recomputed from the current table on read.
#[derive(Clone, Debug)]
pub struct PlanningSession {
    profile: ScreenProfile,
    table: PlanningTable,
    active: ScenarioName,
    assumptions: Assumptions,
    numeric_policy: NumericPolicy,
    dirty: bool,
    revision: u64,
    versions: VersionStore,
}

impl PlanningSession {
    pub fn new(
        profile: ScreenProfile,
        table: PlanningTable,
        numeric_policy: NumericPolicy,
    ) -> Result<Self, DomainError> {
        if table.layout() != &profile.layout {
            return Err(DomainError::InvariantViolation(format!(
                "table layout does not match the {} profile",
                profile.kind
            )));
        }
        table.check_keys()?;
        let active = profile.scenarios().first().cloned().ok_or_else(|| {
            DomainError::InvariantViolation(format!("{} profile defines no scenarios", profile.kind))
        })?;

        Ok(Self {
            profile,
            table,
            active,
            assumptions: Assumptions::new(),
            numeric_policy,
            dirty: false,
            revision: 0,
            versions: VersionStore::new(),
        })
    }

    pub fn with_assumptions(mut self, assumptions: Assumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn profile(&self) -> &ScreenProfile {
        &self.profile
    }

    pub fn table(&self) -> &PlanningTable {
        &self.table
    }

    pub fn active_scenario(&self) -> &ScenarioName {
        &self.active
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn numeric_policy(&self) -> NumericPolicy {
        self.numeric_policy
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every applied mutation; the hook for optimistic concurrency.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn switch_scenario(&mut self, scenario: ScenarioName) -> Result<(), DomainError> {
        if !self.table.layout().has_scenario(&scenario) {
            return Err(DomainError::UnknownScenario { scenario: scenario.to_string() });
        }
        self.active = scenario;
        Ok(())
    }

    pub fn set_field(
        &mut self,
        key: &ItemKey,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<FieldOutcome, DomainError> {
        let scenario = self.active.clone();
        self.set_field_in(key, &scenario, field, value)
    }

    pub fn set_field_in(
        &mut self,
        key: &ItemKey,
        scenario: &ScenarioName,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<FieldOutcome, DomainError> {
        let outcome =
            self.table.set_field(key, scenario, field, value.into(), self.numeric_policy)?;
        self.touch();
        Ok(outcome)
    }

    pub fn set_status(
        &mut self,
        key: &ItemKey,
        status: DecisionStatus,
    ) -> Result<ScenarioValue, DomainError> {
        let scenario = self.active.clone();
        let cascade = self.profile.status_cascade;
        let updated = self.table.set_status(key, &scenario, status, &cascade)?.clone();
        self.touch();
        Ok(updated)
    }

    pub fn set_assumption(
        &mut self,
        scenario: &ScenarioName,
        notes: impl Into<String>,
    ) -> Result<(), DomainError> {
        if !self.table.layout().has_scenario(scenario) {
            return Err(DomainError::UnknownScenario { scenario: scenario.to_string() });
        }
        self.assumptions.insert(scenario.clone(), notes.into());
        self.touch();
        Ok(())
    }

    /// Reconciles `rows` into the active scenario. On error nothing was
    /// written and the session is unchanged.
    pub fn import_rows(&mut self, rows: &[ImportRow]) -> Result<ImportReport, DomainError> {
        let report = reconcile(&mut self.table, &self.active, rows, self.numeric_policy)?;
        if report.applied_count() > 0 {
            self.touch();
        }
        Ok(report)
    }

    pub fn export_rows(&self) -> ExportTable {
        export_rows(&self.table, &self.active)
    }

    pub fn totals(&self) -> Totals {
        aggregate(&self.table, &self.active, &self.profile.rules)
    }

    pub fn totals_for(&self, scenario: &ScenarioName) -> Totals {
        aggregate(&self.table, scenario, &self.profile.rules)
    }

    pub fn all_totals(&self) -> std::collections::BTreeMap<ScenarioName, Totals> {
        aggregate_all(&self.table, &self.profile.rules)
    }

    pub fn view(&self) -> SessionView {
        let rules = &self.profile.rules;
        let items = self
            .table
            .items()
            .iter()
            .map(|item| {
                let value = item.value_or_zero(&self.active).clone();
                let band = rules.bands.as_ref().map(|scheme| {
                    scheme.classify(scheme.source.read(item, &value)).to_string()
                });
                ResolvedItem { excluded: rules.excludes(&value), item: item.clone(), value, band }
            })
            .collect();

        SessionView {
            scenario: self.active.clone(),
            revision: self.revision,
            dirty: self.dirty,
            items,
            totals: self.totals(),
        }
    }

    pub fn save(&mut self, label: Option<String>) -> &Snapshot {
        self.save_at(label, Utc::now())
    }

    pub fn save_at(&mut self, label: Option<String>, saved_at: DateTime<Utc>) -> &Snapshot {
        self.dirty = false;
        self.versions.save(&self.table, &self.assumptions, &self.profile.rules, label, saved_at)
    }

    /// Replaces the live table and assumptions with copies from `version`,
    /// discarding unsaved edits.
    pub fn restore(&mut self, version: u32) -> Result<(), DomainError> {
        let (table, assumptions) = self.versions.restore(version)?;
        if !table.layout().has_scenario(&self.active) {
            self.active = table.scenarios().first().cloned().unwrap_or_default();
        }
        self.table = table;
        self.assumptions = assumptions;
        self.dirty = false;
        self.revision = self.revision.saturating_add(1);
        info!(
            event_name = "planning.version.restored",
            version,
            revision = self.revision,
            "planning snapshot restored"
        );
        Ok(())
    }

    pub fn compare_versions(&self, from: u32, to: u32) -> Result<VersionComparison, DomainError> {
        self.versions.compare(from, to)
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision = self.revision.saturating_add(1);
    }
}
