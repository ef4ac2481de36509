mod full_frame;
mod inline_decoder;
mod rapid_scan;

pub use full_frame::FullFrame;
pub use inline_decoder::InlineDecoder;
pub use rapid_scan::RapidScan;

use crate::settings::ScannerConfig;

use super::error::InitError;

pub(crate) fn require_license(config: &ScannerConfig) -> Result<String, InitError> {
    config
        .usable_license_key()
        .map(str::to_owned)
        .ok_or(InitError::MissingCredential { key: "licenseKey" })
}
