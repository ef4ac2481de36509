use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    display::{project, DisplayModel, DisplayProjector, RenderEvent, RenderSink},
    feedback::HapticFeedback,
    inventory::{InventoryItem, InventoryLedger},
    notices::{ErrorChannel, ErrorNotice},
    scanner::{RecognitionEvent, ScannerAdapter, ScannerHandle},
    settings::ScannerConfig,
};

use super::{Lifecycle, SessionState, SessionTrigger};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub display: DisplayModel,
    pub notice: Option<ErrorNotice>,
}

struct EventPump {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns one scanning session: the adapter, the ledger and the error slot.
///
/// Lifecycle calls (`start`, `set_visibility`, `teardown`) hold the adapter
/// lock for their whole duration, so the adapter never sees overlapping
/// `initialize`/`set_active`/`dispose` calls. Lock order is adapter, then
/// lifecycle, then ledger, then projector; the event pump never takes the
/// adapter lock. The lifecycle state always moves before an adapter call
/// that stops the camera, so no scan is accepted while it powers down.
#[derive(Clone)]
pub struct SessionController {
    config: Arc<ScannerConfig>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    adapter: Arc<Mutex<Box<dyn ScannerAdapter>>>,
    ledger: Arc<Mutex<InventoryLedger>>,
    projector: Arc<Mutex<DisplayProjector>>,
    notices: ErrorChannel,
    renderer: Arc<dyn RenderSink>,
    haptics: Arc<dyn HapticFeedback>,
    haptic_pulse: Duration,
    builtin_feedback: Arc<AtomicBool>,
    pump: Arc<Mutex<Option<EventPump>>>,
}

impl SessionController {
    pub fn new(
        config: ScannerConfig,
        adapter: Box<dyn ScannerAdapter>,
        renderer: Arc<dyn RenderSink>,
        haptics: Arc<dyn HapticFeedback>,
    ) -> Self {
        let notices = ErrorChannel::new(config.notice_ttl(), renderer.clone());
        let ledger = InventoryLedger::new(config.clock_format.clone());
        let projector = DisplayProjector::new(&ledger);

        Self {
            haptic_pulse: config.haptic_pulse(),
            config: Arc::new(config),
            lifecycle: Arc::new(Mutex::new(Lifecycle::new())),
            adapter: Arc::new(Mutex::new(adapter)),
            ledger: Arc::new(Mutex::new(ledger)),
            projector: Arc::new(Mutex::new(projector)),
            notices,
            renderer,
            haptics,
            builtin_feedback: Arc::new(AtomicBool::new(false)),
            pump: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.lifecycle.lock().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (state, session_id, started_at) = {
            let lifecycle = self.lifecycle.lock().await;
            (lifecycle.state, lifecycle.session_id.clone(), lifecycle.started_at)
        };

        SessionSnapshot {
            state,
            session_id,
            started_at,
            display: self.display().await,
            notice: self.notices.current(),
        }
    }

    /// Acquires the scanner and powers the camera on.
    ///
    /// An initialization failure is surfaced on the error channel, leaves the
    /// session disposed, and is also returned to the caller. There is no
    /// automatic retry.
    pub async fn start(&self) -> Result<SessionState> {
        let mut adapter = self.adapter.lock().await;

        let session_id = Uuid::new_v4().to_string();
        self.lifecycle
            .lock()
            .await
            .begin(session_id.clone(), Utc::now())?;
        self.emit_state(SessionState::Initializing);
        log_info!(
            "session {} starting {} scanner",
            session_id,
            adapter.backend()
        );

        let handle = match adapter.initialize(&self.config).await {
            Ok(handle) => handle,
            Err(err) => {
                log_error!("scanner initialization failed for session {session_id}: {err}");
                self.lifecycle.lock().await.apply(SessionTrigger::InitFailed)?;
                self.emit_state(SessionState::Disposed);
                self.notices.report(err.to_string());
                return Err(err.into());
            }
        };

        let ScannerHandle {
            events,
            builtin_feedback,
            backend,
        } = handle;
        self.builtin_feedback.store(builtin_feedback, Ordering::Relaxed);

        let state = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.apply(SessionTrigger::InitSucceeded)?;
            if lifecycle.teardown_requested {
                lifecycle.apply(SessionTrigger::Teardown)?;
            }
            lifecycle.state
        };

        if state == SessionState::Disposed {
            log_info!("teardown arrived while {backend} scanner was starting; disposing");
            self.emit_state(SessionState::Disposed);
            release(&mut **adapter).await;
            self.drop_inventory().await;
            return Ok(state);
        }

        self.spawn_pump(events).await;
        self.emit_state(SessionState::Active);
        self.render_inventory().await;

        // The host may have hidden the view while we were starting.
        Ok(self.reconcile_visibility(&mut **adapter).await)
    }

    /// Host visibility change (tab switch, app backgrounding).
    pub async fn set_visibility(&self, visible: bool) -> SessionState {
        self.lifecycle.lock().await.visible = visible;

        let mut adapter = self.adapter.lock().await;
        self.reconcile_visibility(&mut **adapter).await
    }

    /// Page unload. Best effort: failures are logged, never surfaced.
    pub async fn teardown(&self) -> SessionState {
        self.lifecycle.lock().await.teardown_requested = true;

        let mut adapter = self.adapter.lock().await;
        let previous = {
            let mut lifecycle = self.lifecycle.lock().await;
            let previous = lifecycle.state;
            if previous.is_terminal() {
                return previous;
            }

            if let Err(err) = lifecycle.apply(SessionTrigger::Teardown) {
                log_warn!("{err}; forcing disposal");
                lifecycle.state = SessionState::Disposed;
            }
            match lifecycle.started_at {
                Some(started_at) => {
                    log_info!(
                        "session {} disposed after {}s",
                        lifecycle.session_label(),
                        (Utc::now() - started_at).num_seconds()
                    );
                }
                None => {
                    log_info!("session {} disposed", lifecycle.session_label());
                }
            }
            previous
        };
        self.emit_state(SessionState::Disposed);

        if matches!(previous, SessionState::Active | SessionState::Suspended) {
            release(&mut **adapter).await;
        }

        self.stop_pump().await;
        self.drop_inventory().await;
        SessionState::Disposed
    }

    /// Feeds one recognition event through the acceptance gate. Returns the
    /// ledger entry when the session was active.
    pub async fn deliver(&self, event: RecognitionEvent) -> Option<InventoryItem> {
        let (item, model) = {
            let lifecycle = self.lifecycle.lock().await;
            if !lifecycle.state.accepts_events() {
                log_debug!(
                    "dropping scan {} while session is {}",
                    event.payload,
                    lifecycle.state
                );
                return None;
            }

            let mut ledger = self.ledger.lock().await;
            let item = ledger.append(event.payload, event.format, event.captured_at);
            (item, self.projector.lock().await.refresh(&ledger))
        };

        if !self.builtin_feedback.load(Ordering::Relaxed) {
            self.haptics.pulse(self.haptic_pulse);
        }
        self.emit_inventory(model);
        Some(item)
    }

    /// Empties the inventory. Confirmation is the caller's job.
    pub async fn clear_inventory(&self) -> usize {
        let (cleared, model) = {
            let mut ledger = self.ledger.lock().await;
            let cleared = ledger.clear();
            (cleared, self.projector.lock().await.refresh(&ledger))
        };

        if cleared > 0 {
            log_info!("cleared {cleared} scanned codes");
        }
        self.emit_inventory(model);
        cleared
    }

    pub async fn inventory_size(&self) -> usize {
        self.ledger.lock().await.size()
    }

    pub async fn inventory(&self) -> Vec<InventoryItem> {
        self.ledger.lock().await.items()
    }

    pub async fn display(&self) -> DisplayModel {
        project(self.ledger.lock().await.iter())
    }

    pub async fn subscribe_inventory(&self) -> watch::Receiver<u64> {
        self.ledger.lock().await.subscribe()
    }

    pub fn notice(&self) -> Option<ErrorNotice> {
        self.notices.current()
    }

    pub fn dismiss_notice(&self) -> bool {
        self.notices.dismiss()
    }

    /// Moves between active and suspended to match the latest visibility.
    /// Caller holds the adapter lock.
    async fn reconcile_visibility(&self, adapter: &mut dyn ScannerAdapter) -> SessionState {
        let (state, visible) = {
            let lifecycle = self.lifecycle.lock().await;
            (lifecycle.state, lifecycle.visible)
        };

        match (state, visible) {
            (SessionState::Active, false) => {
                // Hidden views never accept scans, whatever the camera does.
                let next = self.transition(SessionTrigger::Hidden).await;
                if let Err(err) = adapter.set_active(false).await {
                    log_warn!("failed to power camera off while hidden: {err}");
                    self.notices.report(err.to_string());
                }
                next
            }
            (SessionState::Suspended, true) => match adapter.set_active(true).await {
                Ok(()) => self.transition(SessionTrigger::Visible).await,
                Err(err) => {
                    log_warn!("failed to resume camera: {err}");
                    self.notices.report(err.to_string());
                    state
                }
            },
            _ => state,
        }
    }

    async fn transition(&self, trigger: SessionTrigger) -> SessionState {
        let next = {
            let mut lifecycle = self.lifecycle.lock().await;
            match lifecycle.apply(trigger) {
                Ok(next) => next,
                Err(err) => {
                    log_warn!("{err}");
                    return lifecycle.state;
                }
            }
        };
        self.emit_state(next);
        next
    }

    async fn spawn_pump(&self, events: mpsc::Receiver<RecognitionEvent>) {
        let cancel = CancellationToken::new();
        let controller = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { controller.drain_events(events, token).await });

        let mut pump = self.pump.lock().await;
        if let Some(previous) = pump.replace(EventPump { handle, cancel }) {
            previous.cancel.cancel();
        }
    }

    async fn stop_pump(&self) {
        let Some(pump) = self.pump.lock().await.take() else {
            return;
        };

        pump.cancel.cancel();
        if let Err(err) = pump.handle.await {
            if !err.is_cancelled() {
                log_error!("event pump failed to join: {err}");
            }
        }
    }

    async fn drain_events(
        self,
        mut events: mpsc::Receiver<RecognitionEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(event) => {
                        self.deliver(event).await;
                    }
                    None => {
                        log_debug!("recognition stream closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    log_debug!("event pump shutting down");
                    break;
                }
            }
        }
    }

    /// Session-end reset of the ledger, re-projected like any other clear.
    async fn drop_inventory(&self) {
        let (cleared, model) = {
            let mut ledger = self.ledger.lock().await;
            let cleared = ledger.clear();
            (cleared, self.projector.lock().await.refresh(&ledger))
        };
        log_debug!("dropped {cleared} inventory items at session end");
        self.emit_inventory(model);
    }

    fn emit_inventory(&self, model: Option<DisplayModel>) {
        if let Some(model) = model {
            self.renderer.emit(RenderEvent::InventoryChanged(model));
        }
    }

    async fn render_inventory(&self) {
        let model = self.display().await;
        self.renderer.emit(RenderEvent::InventoryChanged(model));
    }

    fn emit_state(&self, state: SessionState) {
        self.renderer.emit(RenderEvent::SessionStateChanged(state));
    }
}

/// Powers the camera off and disposes the adapter, logging any failure.
async fn release(adapter: &mut dyn ScannerAdapter) {
    if let Err(err) = adapter.set_active(false).await {
        log_warn!("failed to power camera off during teardown: {err}");
    }
    if let Err(err) = adapter.dispose().await {
        log_warn!("failed to dispose scanner during teardown: {err}");
    }
}
