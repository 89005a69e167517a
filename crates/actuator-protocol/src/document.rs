//! Saved-configuration document schema.
//!
//! The file itself belongs to the application; this module fixes the
//! schema so a configuration read from a device can be stored and
//! restored without loss.

use crate::codec::DeviceConfiguration;
use actuator_common::address::SlaveAddress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema version written by this crate.
pub const DOCUMENT_VERSION: u32 = 1;

/// One saved device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Bus address.
    pub slave_address: SlaveAddress,
    /// Product identifier register value.
    pub product_id: u16,
    /// Operator-assigned name.
    pub name: String,
    /// Full configuration.
    pub configuration: DeviceConfiguration,
}

/// Saved set of device configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// Schema version.
    pub version: u32,
    /// Saved devices in address order.
    pub devices: Vec<DeviceRecord>,
}

impl Default for ConfigurationDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            devices: Vec::new(),
        }
    }
}

impl ConfigurationDocument {
    /// Build a document from records, sorting them by address.
    #[must_use]
    pub fn new(mut devices: Vec<DeviceRecord>) -> Self {
        devices.sort_by_key(|d| d.slave_address);
        Self {
            version: DOCUMENT_VERSION,
            devices,
        }
    }

    /// Find the record for a slave.
    #[must_use]
    pub fn device(&self, address: SlaveAddress) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.slave_address == address)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(DocumentError::Json)
    }

    /// Parse JSON, rejecting newer schema versions.
    pub fn from_json(content: &str) -> Result<Self, DocumentError> {
        let document: Self = serde_json::from_str(content).map_err(DocumentError::Json)?;
        if document.version > DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    /// Write to a file.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read from a file.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }
}

/// Document errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File I/O error.
    #[error("failed to access document {path}: {source}")]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON error.
    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Document written by a newer schema.
    #[error("unsupported document version {0} (supported: {})", DOCUMENT_VERSION)]
    UnsupportedVersion(u32),
}
