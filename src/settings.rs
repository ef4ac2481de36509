use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    str::FromStr,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{
    inventory::{ledger::DEFAULT_CLOCK_FORMAT, Symbology},
    scanner::BackendKind,
};

pub const LICENSE_KEY_ENV: &str = "SCAN_INVENTORY_LICENSE_KEY";
pub const BACKEND_ENV: &str = "SCAN_INVENTORY_BACKEND";

/// Values shipped in templates that mean "not configured yet".
const PLACEHOLDER_CREDENTIALS: &[&str] = &[
    "votre_cle_scandit_ici",
    "your_license_key_here",
    "<license-key>",
    "changeme",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct InlineDecoderSettings {
    pub element_id: String,
    pub fps: u32,
    pub scan_box: u32,
}

impl Default for InlineDecoderSettings {
    fn default() -> Self {
        Self {
            element_id: "reader".into(),
            fps: 10,
            scan_box: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerConfig {
    pub backend: BackendKind,
    pub license_key: Option<String>,
    /// Folder holding the engine's binary assets.
    pub library_location: String,
    pub symbologies: Vec<Symbology>,
    pub view_element_id: String,
    pub inline: InlineDecoderSettings,
    pub notice_ttl_ms: u64,
    pub haptic_pulse_ms: u64,
    pub clock_format: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::FullFrame,
            license_key: None,
            library_location: "sdc-lib/".into(),
            symbologies: vec![Symbology::Code128],
            view_element_id: "data-capture-view".into(),
            inline: InlineDecoderSettings::default(),
            notice_ttl_ms: 5000,
            haptic_pulse_ms: 100,
            clock_format: DEFAULT_CLOCK_FORMAT.into(),
        }
    }
}

impl ScannerConfig {
    /// The license key, unless it is missing or still a template placeholder.
    pub fn usable_license_key(&self) -> Option<&str> {
        self.license_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !is_placeholder_credential(key))
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    pub fn haptic_pulse(&self) -> Duration {
        Duration::from_millis(self.haptic_pulse_ms)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(LICENSE_KEY_ENV) {
            self.license_key = Some(key);
        }
        if let Some(backend) = lookup(BACKEND_ENV) {
            self.backend = BackendKind::from_str(&backend)
                .with_context(|| format!("invalid {BACKEND_ENV}"))?;
        }
        Ok(())
    }
}

pub fn is_placeholder_credential(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || PLACEHOLDER_CREDENTIALS
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                ScannerConfig::default()
            })
        } else {
            info!("No settings at {}, using defaults", path.display());
            ScannerConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scanner(&self) -> ScannerConfig {
        self.read().clone()
    }

    /// File settings with environment overrides on top. Overrides are never
    /// written back, so a license key from the environment stays off disk.
    pub fn effective_scanner(&self) -> Result<ScannerConfig> {
        let mut config = self.scanner();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn update_scanner(&self, config: ScannerConfig) -> Result<()> {
        let mut guard = self.write();
        *guard = config;
        self.persist(&guard)
    }

    fn persist(&self, data: &ScannerConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ScannerConfig> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScannerConfig> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
