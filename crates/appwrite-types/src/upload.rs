//! Resumable upload constants and progress reports.

use serde::{Deserialize, Serialize};

/// Fixed chunk size for resumable uploads (5 MiB). Payloads smaller than
/// this are sent in a single request.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Progress of a chunked upload, reported after every acknowledged chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub id: String,
    /// Percentage in `0.0..=100.0`.
    pub progress: f64,
    pub size_uploaded: u64,
    pub chunks_total: u64,
    pub chunks_uploaded: u64,
}

/// Inclusive byte range of the chunk starting at `offset` in a payload of
/// `size` bytes.
pub fn chunk_range(offset: u64, size: u64) -> (u64, u64) {
    let end = (offset + CHUNK_SIZE).min(size) - 1;
    (offset, end)
}

/// `Content-Range` header value for the chunk starting at `offset`.
pub fn content_range(offset: u64, size: u64) -> String {
    let (start, end) = chunk_range(offset, size);
    format!("bytes {}-{}/{}", start, end, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_five_mebibytes() {
        assert_eq!(CHUNK_SIZE, 5_242_880);
    }

    #[test]
    fn content_ranges_for_twelve_mebibytes() {
        let size = 12 * 1024 * 1024;
        assert_eq!(content_range(0, size), "bytes 0-5242879/12582912");
        assert_eq!(content_range(CHUNK_SIZE, size), "bytes 5242880-10485759/12582912");
        assert_eq!(
            content_range(2 * CHUNK_SIZE, size),
            "bytes 10485760-12582911/12582912"
        );
    }
}
