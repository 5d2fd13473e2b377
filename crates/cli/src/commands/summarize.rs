use std::path::Path;

use planbook_core::ScenarioName;

use crate::commands::{load_config, CommandResult, EXIT_WORKBOOK};
use crate::workbook::Workbook;

const COMMAND: &str = "summarize";

/// Recomputes totals for a workbook. With `all_scenarios` the payload maps
/// every scenario to its totals; otherwise it is the resolved view of one.
pub fn run(workbook_path: &Path, scenario: Option<&str>, all_scenarios: bool) -> CommandResult {
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

    tracing::debug!(
        event_name = "planning.cli.summarize",
        profile = %session.profile().kind,
        scenario = %session.active_scenario(),
        items = session.table().len(),
        "summarizing workbook"
    );

    if all_scenarios {
        let totals = session.all_totals();
        CommandResult::success_with_data(
            COMMAND,
            format!("summarized {} scenarios", totals.len()),
            &totals,
        )
    } else {
        let view = session.view();
        CommandResult::success_with_data(
            COMMAND,
            format!("summarized scenario `{}`", view.scenario),
            &view,
        )
    }
}
