//! Boundary to the third-party recognition engine.
//!
//! The engine owns the camera, image decoding and symbology detection. The
//! adapters in this crate only describe how to set it up and consume the
//! decode batches it pushes back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::inventory::Symbology;

use super::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPower {
    On,
    Off,
}

impl From<bool> for CameraPower {
    fn from(active: bool) -> Self {
        if active {
            CameraPower::On
        } else {
            CameraPower::Off
        }
    }
}

/// Where and how the engine presents its capture view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSpec {
    /// Camera preview bound to a host element, with the engine's highlight
    /// overlay and optionally a front/back camera switch.
    FullFrame {
        element_id: String,
        overlay: bool,
        camera_switch_control: bool,
    },
    /// Engine-managed floating preview with its own trigger button.
    Floating { builtin_feedback: bool },
    /// Decoder-driven widget mounted inline in the page.
    Inline {
        element_id: String,
        fps: u32,
        scan_box: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSetup {
    pub license_key: Option<String>,
    pub library_location: String,
    pub modules: Vec<String>,
    pub symbologies: Vec<Symbology>,
    /// Window during which the engine suppresses repeats of the same code.
    /// Zero means every sighting is reported.
    pub duplicate_filter: Duration,
    pub recommended_camera_settings: bool,
    pub view: ViewSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub data: String,
    pub symbology: Symbology,
}

/// Codes newly recognized in one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeBatch {
    pub captured_at: DateTime<Utc>,
    pub decodes: Vec<Decoded>,
}

#[async_trait]
pub trait RecognitionEngine: Send {
    /// Loads the engine runtime and starts delivering batches to `decodes`.
    /// The camera stays off until [`RecognitionEngine::set_camera`].
    async fn open(
        &mut self,
        setup: &EngineSetup,
        decodes: mpsc::Sender<DecodeBatch>,
    ) -> Result<(), EngineError>;

    async fn set_camera(&mut self, power: CameraPower) -> Result<(), EngineError>;

    /// Releases camera, decoder context and view bindings, and drops the
    /// batch sender handed to `open`.
    async fn close(&mut self) -> Result<(), EngineError>;
}
