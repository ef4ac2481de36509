pub mod display;
pub mod feedback;
pub mod inventory;
pub mod notices;
pub mod scanner;
pub mod session;
pub mod settings;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use display::ConsoleRenderer;
use feedback::{HapticFeedback, LogHaptics, NoHaptics};
use log::{error, warn};
use scanner::{adapter_for, simulated::{SimulatedEngine, VirtualCamera}};
use session::{
    commands::{self, clear_prompt, is_affirmative, OperatorCommand, HELP},
    SessionController,
};
use settings::SettingsStore;
use tokio::io::{AsyncBufReadExt, BufReader};

pub(crate) struct AppState {
    pub(crate) session: SessionController,
    pub(crate) camera: VirtualCamera,
    pub(crate) settings: SettingsStore,
}

fn settings_path() -> PathBuf {
    std::env::var("SCAN_INVENTORY_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("scan-inventory.json"))
}

pub fn run() {
    let debug_mode = std::env::var("SCAN_INVENTORY_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("Scan inventory starting up...");

    // One cooperative execution context: scans, visibility changes and
    // operator input interleave but never run in parallel.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to build runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run_console()) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run_console() -> Result<()> {
    let settings = SettingsStore::new(settings_path())?;
    let config = settings.effective_scanner()?;

    // A zero pulse length turns vibration off.
    let haptics: Arc<dyn HapticFeedback> = if config.haptic_pulse().is_zero() {
        Arc::new(NoHaptics)
    } else {
        Arc::new(LogHaptics)
    };

    let (engine, camera) = SimulatedEngine::new();
    let adapter = adapter_for(config.backend, Box::new(engine));
    let session = SessionController::new(config, adapter, Arc::new(ConsoleRenderer), haptics);
    let state = AppState {
        session,
        camera,
        settings,
    };

    if let Err(err) = state.session.start().await {
        warn!("scanner unavailable, reload to retry: {err}");
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<OperatorCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        let outcome = match command {
            OperatorCommand::Quit => break,
            OperatorCommand::Help => Ok(HELP.to_string()),
            OperatorCommand::Scan { payload, format } => commands::scan(&state, payload, format)
                .map(|seen| (if seen { "scanned" } else { "nothing recognized" }).to_string()),
            OperatorCommand::Hide => commands::set_visibility(&state, false)
                .await
                .map(|state| state.to_string()),
            OperatorCommand::Show => commands::set_visibility(&state, true)
                .await
                .map(|state| state.to_string()),
            OperatorCommand::List => commands::get_inventory(&state)
                .await
                .and_then(|model| serde_json::to_string_pretty(&model).map_err(|e| e.to_string())),
            OperatorCommand::Clear => {
                let count = state.session.inventory_size().await;
                match clear_prompt(count) {
                    Some(prompt) => {
                        println!("{prompt} [y/N]");
                        let answer = lines.next_line().await?.unwrap_or_default();
                        commands::clear_inventory(&state, is_affirmative(&answer))
                            .await
                            .map(|cleared| format!("{cleared} cleared"))
                    }
                    None => Ok("inventory already empty".to_string()),
                }
            }
            OperatorCommand::Dismiss => commands::dismiss_error(&state)
                .await
                .map(|dismissed| (if dismissed { "dismissed" } else { "no notice" }).to_string()),
            OperatorCommand::Backend(kind) => commands::set_backend(&state, kind)
                .map(|kind| format!("backend set to {kind}, restart to apply")),
            OperatorCommand::State => commands::get_session(&state)
                .await
                .and_then(|snapshot| {
                    serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())
                }),
        };

        match outcome {
            Ok(message) => println!("{message}"),
            Err(err) => println!("error: {err}"),
        }
    }

    // End of input is the console's page unload.
    if let Err(err) = commands::end_session(&state).await {
        warn!("teardown failed: {err}");
    }
    Ok(())
}
