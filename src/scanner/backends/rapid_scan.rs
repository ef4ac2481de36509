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

const MODULES: &[&str] = &["core", "barcode"];

/// Streamlined licensed mode: the engine draws its own floating preview and
/// gives its own scan feedback.
#[derive(Debug, Default, Clone, Copy)]
pub struct RapidScan;

impl BackendProfile for RapidScan {
    fn kind(&self) -> BackendKind {
        BackendKind::RapidScan
    }

    fn setup(&self, config: &ScannerConfig) -> Result<EngineSetup, InitError> {
        let license_key = require_license(config)?;

        Ok(EngineSetup {
            license_key: Some(license_key),
            library_location: config.library_location.clone(),
            modules: MODULES.iter().map(|module| module.to_string()).collect(),
            symbologies: config.symbologies.clone(),
            duplicate_filter: Duration::ZERO,
            recommended_camera_settings: true,
            view: ViewSpec::Floating {
                builtin_feedback: true,
            },
        })
    }

    fn builtin_feedback(&self) -> bool {
        true
    }
}
