use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Barcode encoding standard reported by the recognition engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Symbology {
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Itf,
    Qr,
    DataMatrix,
    Pdf417,
    Aztec,
}

impl Symbology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Code128 => "code128",
            Symbology::Code39 => "code39",
            Symbology::Ean13 => "ean13",
            Symbology::Ean8 => "ean8",
            Symbology::UpcA => "upcA",
            Symbology::UpcE => "upcE",
            Symbology::Itf => "itf",
            Symbology::Qr => "qr",
            Symbology::DataMatrix => "dataMatrix",
            Symbology::Pdf417 => "pdf417",
            Symbology::Aztec => "aztec",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "code128" => Ok(Symbology::Code128),
            "code39" => Ok(Symbology::Code39),
            "ean13" => Ok(Symbology::Ean13),
            "ean8" => Ok(Symbology::Ean8),
            "upca" => Ok(Symbology::UpcA),
            "upce" => Ok(Symbology::UpcE),
            "itf" => Ok(Symbology::Itf),
            "qr" | "qrcode" => Ok(Symbology::Qr),
            "datamatrix" => Ok(Symbology::DataMatrix),
            "pdf417" => Ok(Symbology::Pdf417),
            "aztec" => Ok(Symbology::Aztec),
            _ => Err(anyhow!("unknown symbology '{value}'")),
        }
    }
}

/// Session-unique identifier, derived from the capture time in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: ItemId,
    pub payload: String,
    pub format: Symbology,
    pub captured_at: DateTime<Utc>,
    pub display_timestamp: String,
}
