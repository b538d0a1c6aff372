use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chunked::checksum_bytes;
use crate::validation::validate_target_key;
use crate::UploadError;

/// The source object of one upload.
///
/// Holds the whole file in memory. `key` is the server-side name the
/// object is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    key: String,
    declared_size: u64,
    data: Vec<u8>,
}

impl FileHandle {
    /// Creates a handle whose declared size is the buffer length.
    pub fn new(key: impl Into<String>, data: Vec<u8>) -> Self {
        let declared_size = data.len() as u64;
        Self {
            key: key.into(),
            declared_size,
            data,
        }
    }

    /// Creates a handle with an explicitly declared size.
    ///
    /// A size that disagrees with the buffer makes the handle malformed;
    /// [`validate`](Self::validate) reports it.
    pub fn with_declared_size(key: impl Into<String>, data: Vec<u8>, declared_size: u64) -> Self {
        Self {
            key: key.into(),
            declared_size,
            data,
        }
    }

    /// Reads `path` fully into memory.
    ///
    /// When `key` is `None` the key is [`timestamped_key`] of the file name.
    pub fn read(path: &Path, key: Option<String>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let key = match key {
            Some(k) => k,
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".into());
                timestamped_key(&name)
            }
        };
        Ok(Self::new(key, data))
    }

    /// Server-side key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared logical size in bytes.
    pub fn size(&self) -> u64 {
        self.declared_size
    }

    /// File contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// SHA-256 hex digest of the contents.
    pub fn content_hash(&self) -> String {
        checksum_bytes(&self.data)
    }

    /// Checks the handle is well formed: valid key, declared size matches.
    pub fn validate(&self) -> Result<(), UploadError> {
        validate_target_key(&self.key)?;
        if self.declared_size != self.data.len() as u64 {
            return Err(UploadError::InvalidConfiguration(format!(
                "declared size {} does not match buffer length {}",
                self.declared_size,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// Prefixes `name` with the current Unix time in milliseconds.
///
/// Keeps repeated uploads of the same file name from colliding server-side.
pub fn timestamped_key(name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{millis}_{name}")
}
