use std::path::Path;

use planbook_core::planning::Totals;
use planbook_core::{ImportReport, ScenarioName};
use serde::Serialize;

use crate::commands::{load_config, CommandResult, EXIT_ROWS, EXIT_WORKBOOK};
use crate::workbook::{load_rows, Workbook};

const COMMAND: &str = "reconcile";

#[derive(Debug, Serialize)]
struct ReconcileSummary {
    written: bool,
    report: ImportReport,
    totals: Totals,
}

/// Applies imported rows to one scenario of a workbook. The workbook file is
/// only rewritten when `write` is set and at least one row applied.
pub fn run(
    workbook_path: &Path,
    rows_path: &Path,
    scenario: Option<&str>,
    write: bool,
) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let workbook = match Workbook::load(workbook_path) {
        Ok(workbook) => workbook,
        Err(error) => {
            return CommandResult::persistence_failure(COMMAND, "workbook", &error, EXIT_WORKBOOK)
        }
    };

    let rows = match load_rows(rows_path) {
        Ok(rows) => rows,
        Err(error) => {
            return CommandResult::persistence_failure(COMMAND, "rows", &error, EXIT_ROWS)
        }
    };

    let mut session = match workbook
        .into_session(config.engine.default_profile, config.engine.numeric_policy)
    {
        Ok(session) => session,
        Err(error) => return CommandResult::domain_failure(COMMAND, error),
    };

    if let Some(scenario) = scenario {
        if let Err(error) = session.switch_scenario(ScenarioName::from(scenario)) {
            return CommandResult::domain_failure(COMMAND, error);
        }
    }

    let report = match session.import_rows(&rows) {
        Ok(report) => report,
        Err(error) => return CommandResult::domain_failure(COMMAND, error),
    };

    let written = write && session.is_dirty();
    if written {
        if let Err(error) = Workbook::from_session(&session).save(workbook_path) {
            return CommandResult::persistence_failure(COMMAND, "workbook", &error, EXIT_WORKBOOK);
        }
        tracing::info!(
            event_name = "planning.cli.workbook_written",
            path = %workbook_path.display(),
            applied = report.applied_count(),
            "workbook updated from import"
        );
    }

    let message = format!(
        "applied {} of {} rows to `{}` ({} skipped)",
        report.applied_count(),
        report.rows_received,
        report.scenario,
        report.skipped_count()
    );
    let summary = ReconcileSummary { written, totals: session.totals(), report };
    CommandResult::success_with_data(COMMAND, message, &summary)
}
