//! Transform parameters: the active color-correction state.
//!
//! Parameters wrap the raw bytes of a profile file. When the bytes look like
//! an ICC profile, the fixed 128-byte header is parsed so malformed profiles
//! are rejected at load time instead of mid-batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PipelineError;

const ICC_HEADER_LEN: usize = 128;
const ICC_SIGNATURE: &[u8; 4] = b"acsp";

/// Fields from an ICC profile header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHeader {
    /// Declared profile size in bytes
    pub size: u32,
    /// Device class, e.g. "scnr", "mntr", "prtr"
    pub device_class: String,
    /// Data color space, e.g. "RGB ", "GRAY"
    pub color_space: String,
    /// Major and minor version
    pub version: (u8, u8),
}

impl ProfileHeader {
    /// Parse the header if `bytes` carries the ICC signature.
    ///
    /// Returns `Ok(None)` for non-ICC data and `Err` for an ICC profile whose
    /// declared size doesn't fit the data.
    fn parse(bytes: &[u8]) -> Result<Option<Self>, String> {
        if bytes.len() < ICC_HEADER_LEN || &bytes[36..40] != ICC_SIGNATURE {
            return Ok(None);
        }

        let size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if (size as usize) < ICC_HEADER_LEN || size as usize > bytes.len() {
            return Err(format!(
                "ICC header declares {} bytes but file has {}",
                size,
                bytes.len()
            ));
        }

        Ok(Some(Self {
            size,
            device_class: signature(&bytes[12..16]),
            color_space: signature(&bytes[16..20]),
            version: (bytes[8], bytes[9] >> 4),
        }))
    }
}

fn signature(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Immutable snapshot of transform state.
///
/// Cloning is cheap; the profile bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformParameters {
    source: Option<PathBuf>,
    bytes: Arc<[u8]>,
    header: Option<ProfileHeader>,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TransformParameters {
    /// Parameters used when no profile has been configured.
    pub fn builtin() -> Self {
        Self {
            source: None,
            bytes: Arc::from(Vec::new()),
            header: None,
        }
    }

    /// Read and validate parameters from a profile file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::ParameterLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut params = Self::from_bytes(bytes).map_err(|message| PipelineError::ParameterLoad {
            path: path.to_path_buf(),
            message,
        })?;
        params.source = Some(path.to_path_buf());
        Ok(params)
    }

    /// Validate parameters held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        if bytes.is_empty() {
            return Err("profile is empty".to_string());
        }
        let header = ProfileHeader::parse(&bytes)?;
        Ok(Self {
            source: None,
            bytes: Arc::from(bytes),
            header,
        })
    }

    /// File the parameters were loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parsed ICC header, when the data is an ICC profile.
    pub fn header(&self) -> Option<&ProfileHeader> {
        self.header.as_ref()
    }

    pub fn is_builtin(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match (&self.source, &self.header) {
            (None, _) => "built-in defaults".to_string(),
            (Some(path), Some(h)) => format!(
                "{} (ICC v{}.{}, {} {})",
                path.display(),
                h.version.0,
                h.version.1,
                h.device_class.trim(),
                h.color_space.trim()
            ),
            (Some(path), None) => format!("{} ({} bytes)", path.display(), self.bytes.len()),
        }
    }
}

#[cfg(test)]
pub(crate) fn icc_fixture(declared_size: u32, actual_len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; actual_len.max(ICC_HEADER_LEN)];
    bytes[0..4].copy_from_slice(&declared_size.to_be_bytes());
    bytes[8] = 4;
    bytes[9] = 0x30;
    bytes[12..16].copy_from_slice(b"scnr");
    bytes[16..20].copy_from_slice(b"RGB ");
    bytes[36..40].copy_from_slice(ICC_SIGNATURE);
    bytes
}
