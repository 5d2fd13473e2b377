use planbook_core::planning::{ScreenKind, ScreenProfile};
use planbook_core::ScenarioName;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "profiles";

#[derive(Debug, Serialize)]
struct ProfileSummary {
    kind: ScreenKind,
    title: String,
    is_default: bool,
    scenarios: Vec<ScenarioName>,
    key_fields: Vec<String>,
    attributes: Vec<String>,
    fields: Vec<String>,
    tracks_status: bool,
}

/// Lists every built-in screen, or the full layout and rules of one.
pub fn run(kind: Option<&str>) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    if let Some(raw) = kind {
        return match raw.parse::<ScreenKind>() {
            Ok(kind) => {
                let profile = ScreenProfile::for_kind(kind);
                CommandResult::success_with_data(
                    COMMAND,
                    format!("profile `{kind}`"),
                    &profile,
                )
            }
            Err(message) => CommandResult::failure(COMMAND, "usage", message, 64),
        };
    }

    let summaries: Vec<ProfileSummary> = ScreenKind::ALL
        .into_iter()
        .map(|kind| {
            let profile = ScreenProfile::for_kind(kind);
            ProfileSummary {
                kind,
                is_default: kind == config.engine.default_profile,
                scenarios: profile.scenarios().to_vec(),
                key_fields: profile.layout.key_fields.clone(),
                attributes: profile.layout.attributes.clone(),
                fields: profile.layout.fields.iter().map(|spec| spec.name.clone()).collect(),
                tracks_status: profile.layout.tracks_status,
                title: profile.title,
            }
        })
        .collect();

    CommandResult::success_with_data(
        COMMAND,
        format!("{} screen profiles available", summaries.len()),
        &summaries,
    )
}
