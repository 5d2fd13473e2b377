use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use planbook_core::planning::{ImportRow, NumericPolicy, PlanningSession, ScreenKind, ScreenProfile};
use planbook_core::{Assumptions, DomainError, PlanningItem, ScenarioName};
use serde::{Deserialize, Serialize};

/// On-disk JSON form of one planning screen's items. Parsing lives here so
/// the engine only ever sees materialized values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ScreenKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_scenario: Option<ScenarioName>,
    #[serde(default)]
    pub assumptions: Assumptions,
    pub items: Vec<PlanningItem>,
}

impl Workbook {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read workbook `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("could not parse workbook `{}`", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("could not serialize workbook")?;
        fs::write(path, payload)
            .with_context(|| format!("could not write workbook `{}`", path.display()))
    }

    /// Builds a session for the workbook's screen, falling back to
    /// `default_profile` when the file does not name one.
    pub fn into_session(
        self,
        default_profile: ScreenKind,
        numeric_policy: NumericPolicy,
    ) -> Result<PlanningSession, DomainError> {
        let profile = ScreenProfile::for_kind(self.profile.unwrap_or(default_profile));
        let table = profile.table_from_items(self.items)?;
        let mut session =
            PlanningSession::new(profile, table, numeric_policy)?.with_assumptions(self.assumptions);
        if let Some(scenario) = self.active_scenario {
            session.switch_scenario(scenario)?;
        }
        Ok(session)
    }

    pub fn from_session(session: &PlanningSession) -> Self {
        Self {
            profile: Some(session.profile().kind),
            active_scenario: Some(session.active_scenario().clone()),
            assumptions: session.assumptions().clone(),
            items: session.table().items().to_vec(),
        }
    }
}

pub fn load_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read import rows `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse import rows `{}`", path.display()))
}
