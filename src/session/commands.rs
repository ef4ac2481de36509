use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

use crate::{
    display::DisplayModel,
    inventory::Symbology,
    scanner::BackendKind,
    session::{SessionController, SessionSnapshot, SessionState},
    AppState,
};

pub const HELP: &str = "commands: scan <code> [symbology] | hide | show | list | clear | dismiss | state | backend <kind> | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Scan {
        payload: String,
        format: Symbology,
    },
    Hide,
    Show,
    List,
    Clear,
    Dismiss,
    State,
    /// Saves the backend used from the next launch on.
    Backend(BackendKind),
    Help,
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "scan" => {
                let payload = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: scan <code> [symbology]"))?
                    .to_string();
                let format = match words.next() {
                    Some(name) => name.parse()?,
                    None => Symbology::Code128,
                };
                OperatorCommand::Scan { payload, format }
            }
            "hide" => OperatorCommand::Hide,
            "show" => OperatorCommand::Show,
            "list" | "ls" => OperatorCommand::List,
            "clear" => OperatorCommand::Clear,
            "dismiss" => OperatorCommand::Dismiss,
            "state" | "status" => OperatorCommand::State,
            "backend" => {
                let kind = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: backend <fullFrame|rapidScan|inlineDecoder>"))?;
                OperatorCommand::Backend(kind.parse()?)
            }
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" | "q" => OperatorCommand::Quit,
            other => bail!("unknown command '{other}' ({HELP})"),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(command)
    }
}

/// Confirmation text for clearing `count` codes; `None` when there is
/// nothing to clear and no question should be asked.
pub fn clear_prompt(count: usize) -> Option<String> {
    (count > 0).then(|| format!("Clear all {count} scanned codes?"))
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    )
}

fn controller_from_state(state: &AppState) -> SessionController {
    state.session.clone()
}

/// Points the virtual camera at a code. `false` means the scanner saw
/// nothing (camera off, session over, or symbology not enabled).
pub(crate) fn scan(state: &AppState, payload: String, format: Symbology) -> Result<bool, String> {
    Ok(state.camera.present(payload, format))
}

pub(crate) async fn set_visibility(state: &AppState, visible: bool) -> Result<SessionState, String> {
    let controller = controller_from_state(state);
    Ok(controller.set_visibility(visible).await)
}

pub(crate) async fn get_inventory(state: &AppState) -> Result<DisplayModel, String> {
    let controller = controller_from_state(state);
    Ok(controller.display().await)
}

pub(crate) async fn clear_inventory(state: &AppState, confirmed: bool) -> Result<usize, String> {
    if !confirmed {
        return Ok(0);
    }
    let controller = controller_from_state(state);
    Ok(controller.clear_inventory().await)
}

pub(crate) async fn dismiss_error(state: &AppState) -> Result<bool, String> {
    let controller = controller_from_state(state);
    Ok(controller.dismiss_notice())
}

pub(crate) async fn get_session(state: &AppState) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.snapshot().await)
}

/// Persists the backend choice. The running session keeps its adapter.
pub(crate) fn set_backend(state: &AppState, kind: BackendKind) -> Result<BackendKind, String> {
    let mut config = state.settings.scanner();
    config.backend = kind;
    state
        .settings
        .update_scanner(config)
        .map_err(|e| format!("Failed to save backend: {e:#}"))?;
    Ok(kind)
}

pub(crate) async fn end_session(state: &AppState) -> Result<SessionState, String> {
    let controller = controller_from_state(state);
    Ok(controller.teardown().await)
}
