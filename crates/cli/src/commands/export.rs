use std::path::Path;

use planbook_core::ScenarioName;

use crate::commands::{load_config, CommandResult, EXIT_WORKBOOK};
use crate::workbook::Workbook;

const COMMAND: &str = "export";

pub fn run(workbook_path: &Path, scenario: Option<&str>, records: bool) -> CommandResult {
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

    let export = session.export_rows();
    let message = format!("exported {} rows for `{}`", export.rows.len(), export.scenario);
    if records {
        CommandResult::success_with_data(COMMAND, message, &export.records())
    } else {
        CommandResult::success_with_data(COMMAND, message, &export)
    }
}
