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

use super::require_license;

const MODULES: &[&str] = &["core", "barcode", "barcodecapture"];

/// Licensed computer-vision engine rendering a live camera view with a
/// highlight overlay and a camera switch control.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullFrame;

impl BackendProfile for FullFrame {
    fn kind(&self) -> BackendKind {
        BackendKind::FullFrame
    }

    fn setup(&self, config: &ScannerConfig) -> Result<EngineSetup, InitError> {
        let license_key = require_license(config)?;

        Ok(EngineSetup {
            license_key: Some(license_key),
            library_location: config.library_location.clone(),
            modules: MODULES.iter().map(|module| module.to_string()).collect(),
            symbologies: config.symbologies.clone(),
            // Continuous counting: the same code seen twice is two units.
            duplicate_filter: Duration::ZERO,
            recommended_camera_settings: true,
            view: ViewSpec::FullFrame {
                element_id: config.view_element_id.clone(),
                overlay: true,
                camera_switch_control: true,
            },
        })
    }
}
