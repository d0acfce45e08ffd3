//! Machine identification from a key/value text file
//!
//! Reads the hardware and firmware identifiers from a BIOS info dump such as
//! `/var/log/bios_info.txt`:
//!
//! ```text
//! hwid          = EVE E2A-B3C-D4E        # [RO] HWID
//! fwid          = Google_Eve.9584.174.0  # [RW/A] Active firmware id
//! ```
//!
//! The first line starting with the key wins. The value is the text after the
//! first `=`, with any `#` comment removed and surrounding whitespace trimmed.
//! Missing keys, lines without `=`, and empty values are errors.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::ProbeError;

/// Where the BIOS info dump lives on the test devices
pub const DEFAULT_PROBE_PATH: &str = "/var/log/bios_info.txt";

/// Hardware and firmware identifiers of the machine under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareIds {
    pub hwid: String,
    pub fwid: String,
}

impl FirmwareIds {
    /// Extract both identifiers from probe text
    ///
    /// ```
    /// use tab_bench::probe::FirmwareIds;
    ///
    /// let ids = FirmwareIds::parse("hwid = ABC 123 # hw\nfwid = fw.1\n").unwrap();
    /// assert_eq!(ids.hwid, "ABC 123");
    /// assert_eq!(ids.fwid, "fw.1");
    /// ```
    pub fn parse(text: &str) -> Result<Self, ProbeError> {
        Ok(Self {
            hwid: extract_value(text, "hwid")?,
            fwid: extract_value(text, "fwid")?,
        })
    }

    /// Read and parse a probe file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        debug!("Reading environment probe {}", path.display());
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(&text)
    }
}

/// Value of the first line starting with `key`
pub fn extract_value(text: &str, key: &str) -> Result<String, ProbeError> {
    let line = text
        .lines()
        .find(|line| line.starts_with(key))
        .ok_or_else(|| ProbeError::MissingKey(key.to_string()))?;

    let (_, rest) = line.split_once('=').ok_or_else(|| ProbeError::Malformed {
        key: key.to_string(),
        line: line.to_string(),
    })?;

    let value = rest.split('#').next().unwrap_or_default().trim();
    if value.is_empty() {
        return Err(ProbeError::EmptyValue(key.to_string()));
    }
    Ok(value.to_string())
}
