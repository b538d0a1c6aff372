use sha2::{Digest, Sha256};

use crate::UploadError;

/// A contiguous slice of an upload, tagged with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based sequence index.
    pub index: usize,
    /// Raw chunk bytes.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty (never produced by [`split`]).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Splits `buffer` into `chunk_size`-byte chunks, last one possibly shorter.
///
/// An empty buffer yields no chunks. A `chunk_size` of zero is rejected.
pub fn split(buffer: &[u8], chunk_size: usize) -> Result<Vec<Chunk>, UploadError> {
    if chunk_size == 0 {
        return Err(UploadError::InvalidConfiguration(
            "chunk size must be positive".into(),
        ));
    }

    Ok(buffer
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, data)| Chunk {
            index,
            data: data.to_vec(),
        })
        .collect())
}

/// Number of chunks `split` produces for `len` bytes, without materializing them.
///
/// Returns 0 for a zero `chunk_size`.
pub fn chunk_count(len: u64, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size as u64) as usize
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
