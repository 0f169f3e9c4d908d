//! The bundled read/write option set spec §6 calls out as "Compression
//! policy": the compression level, empty-block opt-in, CRC-error recovery
//! behaviour, and the Mac-capture byte-swap flag travel together so a
//! caller sets them once at `open`/`create` rather than threading six
//! separate parameters through the engine.

use crate::ewf::compression::CompressionLevel;
use crate::ewf::table::ErrorTolerance;

/// Options governing compression and error recovery, set once at open/create
#[derive(Debug, Clone, Copy)]
pub struct CompressionPolicy {
    /// zlib level applied to chunks that end up stored compressed
    pub level: CompressionLevel,
    /// Compress a chunk that is a single repeated byte even if the format's
    /// normal "smaller wins" rule wouldn't otherwise choose to
    pub compress_empty_block: bool,
    /// On a tolerated chunk CRC/decompression failure, zero the payload
    /// rather than returning whatever bytes were recovered
    pub wipe_block_on_read_error: bool,
    /// Number of times to retry a segment I/O operation that failed with an
    /// [`ewf_core::Error::Io`] before giving up. Carried through from the
    /// option set for API parity with acquisition tooling that reads from
    /// removable media; a local-disk segment file has no transient I/O
    /// errors to retry, so this build's read path doesn't consult it.
    pub read_error_retry: u8,
    /// How strictly section/table/chunk integrity failures are enforced
    pub error_tolerance: ErrorTolerance,
    /// Swap every 16-bit pair in each chunk's payload before returning it to
    /// the caller (Mac-captured big-endian media)
    pub swap_byte_pairs: bool,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            level: CompressionLevel::Default,
            compress_empty_block: false,
            wipe_block_on_read_error: true,
            read_error_retry: 0,
            error_tolerance: ErrorTolerance::None,
            swap_byte_pairs: false,
        }
    }
}

/// Swap every pair of bytes in `payload` in place, truncating any odd
/// trailing byte out of the swap (it has no partner)
pub fn swap_byte_pairs(payload: &mut [u8]) {
    let pairs = payload.len() / 2;
    for i in 0..pairs {
        payload.swap(i * 2, i * 2 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_is_involutive() {
        let mut data = b"abcdefgh".to_vec();
        let original = data.clone();
        swap_byte_pairs(&mut data);
        assert_ne!(data, original);
        swap_byte_pairs(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn odd_trailing_byte_untouched() {
        let mut data = b"abc".to_vec();
        swap_byte_pairs(&mut data);
        assert_eq!(&data, b"bac");
    }
}
