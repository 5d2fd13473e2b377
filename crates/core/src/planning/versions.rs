use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::domain::scenario::{Assumptions, ScenarioName};
use crate::errors::DomainError;
use crate::planning::aggregate::{aggregate_all, AggregationRules, Totals};
use crate::planning::table::PlanningTable;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Saved planning state across every scenario. Fields are private so a
/// snapshot cannot be edited once stored; reads hand out shared references
/// and `restore` hands out owned copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    version: u32,
    id: SnapshotId,
    label: Option<String>,
    saved_at: DateTime<Utc>,
    table: PlanningTable,
    totals: BTreeMap<ScenarioName, Totals>,
    assumptions: Assumptions,
    content_hash: String,
}

impl Snapshot {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    pub fn table(&self) -> &PlanningTable {
        &self.table
    }

    pub fn totals(&self) -> &BTreeMap<ScenarioName, Totals> {
        &self.totals
    }

    pub fn totals_for(&self, scenario: &ScenarioName) -> Option<&Totals> {
        self.totals.get(scenario)
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Owned copies of the table and assumptions.
    pub fn restore(&self) -> (PlanningTable, Assumptions) {
        (self.table.clone(), self.assumptions.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub verified_snapshots: usize,
    pub failure_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDelta {
    pub scenario: ScenarioName,
    pub from_total: Decimal,
    pub to_total: Decimal,
    pub delta: Decimal,
    pub included_items_delta: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from_version: u32,
    pub to_version: u32,
    pub scenarios: Vec<ScenarioDelta>,
    pub assumptions_changed: Vec<ScenarioName>,
}

/// Append-only history of saved snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStore {
    snapshots: Vec<Snapshot>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes totals for every scenario, copies the table and assumptions,
    /// and appends the snapshot.
    pub fn save(
        &mut self,
        table: &PlanningTable,
        assumptions: &Assumptions,
        rules: &AggregationRules,
        label: Option<String>,
        saved_at: DateTime<Utc>,
    ) -> &Snapshot {
        let version = u32::try_from(self.snapshots.len()).unwrap_or(u32::MAX).saturating_add(1);
        let totals = aggregate_all(table, rules);
        let content_hash = content_hash(table, &totals, assumptions);

        let snapshot = Snapshot {
            version,
            id: SnapshotId(Uuid::new_v4().to_string()),
            label,
            saved_at,
            table: table.clone(),
            totals,
            assumptions: assumptions.clone(),
            content_hash,
        };
        info!(
            event_name = "planning.version.saved",
            version = snapshot.version,
            snapshot_id = %snapshot.id,
            items = snapshot.table.len(),
            "planning snapshot saved"
        );

        self.snapshots.push(snapshot);
        let index = self.snapshots.len() - 1;
        &self.snapshots[index]
    }

    pub fn get(&self, version: u32) -> Result<&Snapshot, DomainError> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.version == version)
            .ok_or(DomainError::UnknownVersion { version })
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn restore(&self, version: u32) -> Result<(PlanningTable, Assumptions), DomainError> {
        Ok(self.get(version)?.restore())
    }

    /// Recomputes every content hash and checks version numbering.
    pub fn verify(&self) -> VerificationResult {
        for (index, snapshot) in self.snapshots.iter().enumerate() {
            let expected_version = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
            if snapshot.version != expected_version {
                return VerificationResult {
                    valid: false,
                    verified_snapshots: index,
                    failure_reason: Some(format!(
                        "version mismatch at snapshot {}: expected {}, found {}",
                        snapshot.id, expected_version, snapshot.version
                    )),
                };
            }

            let computed = content_hash(&snapshot.table, &snapshot.totals, &snapshot.assumptions);
            if computed != snapshot.content_hash {
                return VerificationResult {
                    valid: false,
                    verified_snapshots: index,
                    failure_reason: Some(format!(
                        "content hash mismatch at snapshot {}",
                        snapshot.id
                    )),
                };
            }
        }

        VerificationResult {
            valid: true,
            verified_snapshots: self.snapshots.len(),
            failure_reason: None,
        }
    }

    /// Per-scenario change in the main total between two saved versions.
    pub fn compare(&self, from: u32, to: u32) -> Result<VersionComparison, DomainError> {
        let from_snapshot = self.get(from)?;
        let to_snapshot = self.get(to)?;

        let mut names: Vec<&ScenarioName> =
            from_snapshot.totals.keys().chain(to_snapshot.totals.keys()).collect();
        names.sort();
        names.dedup();

        let scenarios = names
            .into_iter()
            .map(|scenario| {
                let before = from_snapshot.totals.get(scenario);
                let after = to_snapshot.totals.get(scenario);
                let from_total = before.map(|totals| totals.total_override).unwrap_or_default();
                let to_total = after.map(|totals| totals.total_override).unwrap_or_default();
                let included_before = before.map(|totals| totals.included_count).unwrap_or(0);
                let included_after = after.map(|totals| totals.included_count).unwrap_or(0);
                ScenarioDelta {
                    scenario: scenario.clone(),
                    from_total,
                    to_total,
                    delta: to_total.saturating_sub(from_total),
                    included_items_delta: i64::try_from(included_after).unwrap_or(i64::MAX)
                        - i64::try_from(included_before).unwrap_or(i64::MAX),
                }
            })
            .collect();

        let mut assumptions_changed: Vec<ScenarioName> = from_snapshot
            .assumptions
            .keys()
            .chain(to_snapshot.assumptions.keys())
            .filter(|scenario| {
                from_snapshot.assumptions.get(*scenario) != to_snapshot.assumptions.get(*scenario)
            })
            .cloned()
            .collect();
        assumptions_changed.sort();
        assumptions_changed.dedup();

        Ok(VersionComparison { from_version: from, to_version: to, scenarios, assumptions_changed })
    }
}

#[derive(Serialize)]
struct HashMaterial<'a> {
    table: &'a PlanningTable,
    totals: &'a BTreeMap<ScenarioName, Totals>,
    assumptions: &'a Assumptions,
}

fn content_hash(
    table: &PlanningTable,
    totals: &BTreeMap<ScenarioName, Totals>,
    assumptions: &Assumptions,
) -> String {
    let material = HashMaterial { table, totals, assumptions };
    let canonical_payload = match serde_json::to_vec(&material) {
        Ok(payload) => payload,
        Err(_) => format!("{}|{}", table.len(), assumptions.len()).into_bytes(),
    };
    sha256_hex(&canonical_payload)
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::VersionStore;
    use crate::domain::item::ItemKey;
    use crate::domain::scenario::{Assumptions, ScenarioName};
    use crate::planning::aggregate::AggregationRules;
    use crate::planning::coerce::NumericPolicy;
    use crate::planning::table::tests::{item, layout};
    use crate::planning::table::PlanningTable;

    fn table() -> PlanningTable {
        PlanningTable::from_items(layout(), [item("Data Center", "Infrastructure", 1000)])
            .expect("table")
    }

    fn notes(text: &str) -> Assumptions {
        [(ScenarioName::from("Baseline"), text.to_string())].into_iter().collect()
    }

    #[test]
    fn save_numbers_versions_and_totals_every_scenario() {
        let mut store = VersionStore::new();
        let table = table();

        let first = store
            .save(&table, &notes("flat"), &AggregationRules::default(), None, Utc::now())
            .clone();
        let second = store
            .save(&table, &notes("flat"), &AggregationRules::default(), None, Utc::now())
            .clone();

        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(first.totals().len(), 2);
        assert_eq!(first.content_hash(), second.content_hash());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn restored_copies_do_not_alias_history() {
        let mut store = VersionStore::new();
        store.save(&table(), &notes("flat"), &AggregationRules::default(), None, Utc::now());

        let (mut restored, _) = store.restore(1).expect("version 1");
        restored
            .set_field(
                &ItemKey::from("Data Center"),
                &ScenarioName::from("Baseline"),
                "override",
                "1".into(),
                NumericPolicy::Lenient,
            )
            .expect("edit");

        let stored = store.get(1).expect("version 1").table();
        assert_eq!(
            stored.value(&ItemKey::from("Data Center"), &ScenarioName::from("Baseline")).override_amount,
            Decimal::new(1000, 0)
        );
    }

    #[test]
    fn verify_detects_tampered_snapshot() {
        let mut store = VersionStore::new();
        store.save(&table(), &notes("flat"), &AggregationRules::default(), None, Utc::now());
        assert!(store.verify().valid);

        store.snapshots[0].assumptions = notes("rewritten");
        let result = store.verify();
        assert!(!result.valid);
        assert!(result.failure_reason.unwrap_or_default().contains("content hash mismatch"));
    }

    #[test]
    fn compare_reports_total_and_assumption_changes() {
        let mut store = VersionStore::new();
        let mut table = table();
        store.save(&table, &notes("flat"), &AggregationRules::default(), None, Utc::now());

        table
            .set_field(
                &ItemKey::from("Data Center"),
                &ScenarioName::from("Baseline"),
                "override",
                "1250".into(),
                NumericPolicy::Lenient,
            )
            .expect("edit");
        store.save(&table, &notes("expansion"), &AggregationRules::default(), None, Utc::now());

        let comparison = store.compare(1, 2).expect("both versions exist");
        let baseline = comparison
            .scenarios
            .iter()
            .find(|delta| delta.scenario.as_str() == "Baseline")
            .expect("baseline delta");
        assert_eq!(baseline.delta, Decimal::new(250, 0));
        assert_eq!(comparison.assumptions_changed, vec![ScenarioName::from("Baseline")]);
    }

    #[test]
    fn unknown_version_is_an_error() {
        let store = VersionStore::new();
        assert!(store.restore(3).is_err());
    }
}
