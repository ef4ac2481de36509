use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::settings::ScannerConfig;

use super::{
    engine::{CameraPower, DecodeBatch, EngineSetup, RecognitionEngine},
    error::{DisposeError, InitError, StateError},
    BackendKind, RecognitionEvent,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const DECODE_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Subscription point returned by a successful `initialize`.
pub struct ScannerHandle {
    pub events: mpsc::Receiver<RecognitionEvent>,
    /// The backend already beeps/vibrates on its own.
    pub builtin_feedback: bool,
    pub backend: BackendKind,
}

/// Uniform contract over every recognition backend.
#[async_trait]
pub trait ScannerAdapter: Send {
    fn backend(&self) -> BackendKind;

    /// Fails with [`InitError::AlreadyInitialized`] unless the adapter is
    /// fresh or disposed. On success the camera is powered on.
    async fn initialize(&mut self, config: &ScannerConfig) -> Result<ScannerHandle, InitError>;

    /// Powers the camera on or off, keeping decoder configuration intact.
    async fn set_active(&mut self, active: bool) -> Result<(), StateError>;

    /// Releases everything. Calling it again is a no-op.
    async fn dispose(&mut self) -> Result<(), DisposeError>;
}

/// Backend-specific part of an adapter: how to turn config into an engine setup.
pub trait BackendProfile: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    fn setup(&self, config: &ScannerConfig) -> Result<EngineSetup, InitError>;

    fn builtin_feedback(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Ready { camera: CameraPower },
    Disposed,
}

/// Adapter driving a [`RecognitionEngine`] according to a [`BackendProfile`].
pub struct EngineAdapter<P> {
    profile: P,
    engine: Box<dyn RecognitionEngine>,
    phase: Phase,
    forwarder: Option<JoinHandle<()>>,
}

impl<P: BackendProfile> EngineAdapter<P> {
    pub fn new(profile: P, engine: Box<dyn RecognitionEngine>) -> Self {
        Self {
            profile,
            engine,
            phase: Phase::Idle,
            forwarder: None,
        }
    }
}

#[async_trait]
impl<P: BackendProfile> ScannerAdapter for EngineAdapter<P> {
    fn backend(&self) -> BackendKind {
        self.profile.kind()
    }

    async fn initialize(&mut self, config: &ScannerConfig) -> Result<ScannerHandle, InitError> {
        if let Phase::Ready { .. } = self.phase {
            return Err(InitError::AlreadyInitialized);
        }

        let setup = self.profile.setup(config)?;
        let (decode_tx, decode_rx) = mpsc::channel(DECODE_BUFFER);

        self.engine
            .open(&setup, decode_tx)
            .await
            .map_err(|err| InitError::BackendUnavailable(err.to_string()))?;

        if let Err(err) = self.engine.set_camera(CameraPower::On).await {
            if let Err(close_err) = self.engine.close().await {
                log_warn!("failed to release engine after camera error: {close_err}");
            }
            return Err(InitError::BackendUnavailable(err.to_string()));
        }

        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        self.forwarder = Some(tokio::spawn(forward_decodes(decode_rx, event_tx)));
        self.phase = Phase::Ready {
            camera: CameraPower::On,
        };

        log_info!(
            "{} scanner initialized ({} symbologies)",
            self.profile.kind(),
            setup.symbologies.len()
        );

        Ok(ScannerHandle {
            events,
            builtin_feedback: self.profile.builtin_feedback(),
            backend: self.profile.kind(),
        })
    }

    async fn set_active(&mut self, active: bool) -> Result<(), StateError> {
        let Phase::Ready { camera } = self.phase else {
            return Err(StateError::NotInitialized);
        };

        let wanted = CameraPower::from(active);
        if camera == wanted {
            return Ok(());
        }

        self.engine
            .set_camera(wanted)
            .await
            .map_err(|err| StateError::Power(err.to_string()))?;
        self.phase = Phase::Ready { camera: wanted };
        log_debug!("{} camera now {:?}", self.profile.kind(), wanted);
        Ok(())
    }

    async fn dispose(&mut self) -> Result<(), DisposeError> {
        if !matches!(self.phase, Phase::Ready { .. }) {
            return Ok(());
        }
        self.phase = Phase::Disposed;

        let result = self
            .engine
            .close()
            .await
            .map_err(|err| DisposeError(err.to_string()));

        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        log_info!("{} scanner disposed", self.profile.kind());
        result
    }
}

/// One event per recognized code, in batch order, stamped with the frame time.
async fn forward_decodes(
    mut batches: mpsc::Receiver<DecodeBatch>,
    events: mpsc::Sender<RecognitionEvent>,
) {
    while let Some(batch) = batches.recv().await {
        for decoded in batch.decodes {
            let event = RecognitionEvent {
                payload: decoded.data,
                format: decoded.symbology,
                captured_at: batch.captured_at,
            };
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}
