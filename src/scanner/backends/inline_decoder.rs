use std::time::Duration;

use crate::{
    scanner::{
        adapter::BackendProfile,
        engine::{EngineSetup, ViewSpec},
        error::InitError,
        BackendKind,
    },
    settings::ScannerConfig,
};

/// License-free in-page decoder driving an inline capture widget.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDecoder;

impl BackendProfile for InlineDecoder {
    fn kind(&self) -> BackendKind {
        BackendKind::InlineDecoder
    }

    fn setup(&self, config: &ScannerConfig) -> Result<EngineSetup, InitError> {
        let element_id = config.inline.element_id.trim();
        if element_id.is_empty() {
            return Err(InitError::MissingCredential {
                key: "inline.elementId",
            });
        }

        Ok(EngineSetup {
            license_key: None,
            library_location: config.library_location.clone(),
            modules: Vec::new(),
            symbologies: config.symbologies.clone(),
            duplicate_filter: Duration::ZERO,
            recommended_camera_settings: false,
            view: ViewSpec::Inline {
                element_id: element_id.to_string(),
                fps: config.inline.fps.max(1),
                scan_box: config.inline.scan_box,
            },
        })
    }
}
