use std::io::Write;

use log::warn;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{notices::ErrorNotice, session::SessionState};

use super::DisplayModel;

/// State changes handed to whatever draws the screen.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum RenderEvent {
    InventoryChanged(DisplayModel),
    ErrorNoticeChanged(Option<ErrorNotice>),
    SessionStateChanged(SessionState),
}

impl RenderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RenderEvent::InventoryChanged(_) => "inventory-changed",
            RenderEvent::ErrorNoticeChanged(_) => "error-notice-changed",
            RenderEvent::SessionStateChanged(_) => "session-state-changed",
        }
    }
}

/// Rendering collaborator. Emission is fire-and-forget: a sink that cannot
/// deliver logs and moves on.
pub trait RenderSink: Send + Sync {
    fn emit(&self, event: RenderEvent);
}

/// Writes every event to stdout as one JSON line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRenderer;

impl RenderSink for ConsoleRenderer {
    fn emit(&self, event: RenderEvent) {
        let name = event.name();
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(err) = writeln!(stdout, "{line}") {
                    warn!("failed to write {name}: {err}");
                }
            }
            Err(err) => warn!("failed to serialize {name}: {err}"),
        }
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<RenderEvent>,
}

impl ChannelRenderer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RenderSink for ChannelRenderer {
    fn emit(&self, event: RenderEvent) {
        // Receiver gone means nobody is drawing anymore.
        let _ = self.tx.send(event);
    }
}
