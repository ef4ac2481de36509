pub mod adapter;
pub mod backends;
pub mod engine;
pub mod error;
pub mod simulated;

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::Symbology;

pub use adapter::{BackendProfile, EngineAdapter, ScannerAdapter, ScannerHandle};
pub use engine::RecognitionEngine;
pub use error::{DisposeError, EngineError, InitError, StateError};

/// One decode result. Consumed by the session, never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub payload: String,
    pub format: Symbology,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    FullFrame,
    RapidScan,
    InlineDecoder,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FullFrame => "fullFrame",
            BackendKind::RapidScan => "rapidScan",
            BackendKind::InlineDecoder => "inlineDecoder",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "fullframe" => Ok(BackendKind::FullFrame),
            "rapidscan" => Ok(BackendKind::RapidScan),
            "inlinedecoder" | "inline" => Ok(BackendKind::InlineDecoder),
            _ => Err(anyhow!("unknown scanner backend '{value}'")),
        }
    }
}

/// Picks the adapter for `kind`. The only place that knows backends apart.
pub fn adapter_for(kind: BackendKind, engine: Box<dyn RecognitionEngine>) -> Box<dyn ScannerAdapter> {
    match kind {
        BackendKind::FullFrame => Box::new(EngineAdapter::new(backends::FullFrame, engine)),
        BackendKind::RapidScan => Box::new(EngineAdapter::new(backends::RapidScan, engine)),
        BackendKind::InlineDecoder => {
            Box::new(EngineAdapter::new(backends::InlineDecoder, engine))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulated::SimulatedEngine;

    #[test]
    fn parses_backend_names() {
        assert_eq!("fullFrame".parse::<BackendKind>().unwrap(), BackendKind::FullFrame);
        assert_eq!("rapid_scan".parse::<BackendKind>().unwrap(), BackendKind::RapidScan);
        assert_eq!("inline".parse::<BackendKind>().unwrap(), BackendKind::InlineDecoder);
        assert!("webcam".parse::<BackendKind>().is_err());
    }

    #[test]
    fn factory_honours_kind() {
        for kind in [BackendKind::FullFrame, BackendKind::RapidScan, BackendKind::InlineDecoder] {
            let (engine, _camera) = SimulatedEngine::new();
            assert_eq!(adapter_for(kind, Box::new(engine)).backend(), kind);
        }
    }
}
