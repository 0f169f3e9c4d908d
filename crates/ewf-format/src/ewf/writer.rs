//! Write-time segmentation: per-chunk compress/raw decisions and the
//! segment filename extension sequence
//!
//! Grounded on `original_source/src/file_write.c`'s extension-rotation
//! comment block: `foo.E01` .. `foo.E99`, then `foo.EAA` .. `foo.EZZ`,
//! the two trailing letters counting in base 26 with `A` as zero.

use crate::ewf::codec;
use crate::ewf::compression::CompressionLevel;
use crate::ewf::header::FormatVariant;

/// Which extension family a container uses, selected by the base name's
/// signature family and letter case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionFamily {
    /// `E01`.. (evidence, EnCase/Ewf dialects)
    Evidence,
    /// `L01`.. (logical evidence)
    Logical,
    /// `s01`.. (SMART, lowercase)
    Smart,
}

impl ExtensionFamily {
    fn letter(self) -> char {
        match self {
            ExtensionFamily::Evidence => 'E',
            ExtensionFamily::Logical => 'L',
            ExtensionFamily::Smart => 's',
        }
    }
}

/// Compute the extension for 1-based `segment_number` in `family`
///
/// Segments 1..=99 use `{letter}01`..`{letter}99`. Beyond that the last two
/// characters become a base-26 counter (`AA`, `AB`, .. `ZZ`) while the first
/// character stays the family letter.
pub fn segment_extension(family: ExtensionFamily, segment_number: u32) -> String {
    let letter = family.letter();
    if segment_number == 0 {
        panic!("segment numbers are 1-based");
    }
    if segment_number <= 99 {
        return format!("{letter}{segment_number:02}");
    }

    let index = segment_number - 100; // 0-based into the AA.. sequence
    let first = (b'A' + (index / 26) as u8) as char;
    let second = (b'A' + (index % 26) as u8) as char;
    format!("{letter}{first}{second}")
}

/// Per-chunk encode decision
pub struct ChunkPlan {
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// Decide whether to store a chunk compressed or raw, per the rule in
/// spec §4.9: SMART always compresses; otherwise compress only if smaller
/// than the raw form, or if the chunk is a trivially compressible empty
/// block and the caller opted into compressing those too.
pub fn plan_chunk(
    raw: &[u8],
    variant: FormatVariant,
    level: CompressionLevel,
    compress_empty_block: bool,
) -> ewf_core::Result<ChunkPlan> {
    let always_compress = variant == FormatVariant::Smart;
    let is_empty = codec::is_empty_block(raw);

    if level == CompressionLevel::None && !always_compress && !(compress_empty_block && is_empty) {
        return Ok(raw_chunk(raw));
    }

    let compressed = crate::ewf::compression::compress(raw, level)?;

    let should_compress =
        always_compress || compressed.len() < raw.len() || (compress_empty_block && is_empty);

    if should_compress {
        Ok(ChunkPlan {
            payload: compressed,
            compressed: true,
        })
    } else {
        Ok(raw_chunk(raw))
    }
}

fn raw_chunk(raw: &[u8]) -> ChunkPlan {
    let crc = codec::adler32(1, raw);
    let mut payload = Vec::with_capacity(raw.len() + 4);
    payload.extend_from_slice(raw);
    payload.extend_from_slice(&crc.to_le_bytes());
    ChunkPlan {
        payload,
        compressed: false,
    }
}

/// Reserved tail space the planner must keep available in the current
/// segment for the closing sections (`table`, `table2`, `next`/`done`, and
/// optional `error2`/`hash`), so the last chunk written never collides
/// with them.
pub fn reserved_tail_size(
    chunk_count_in_segment: usize,
    emit_table2: bool,
    emit_error2_hash: bool,
) -> u64 {
    const SECTION_DESCRIPTOR_SIZE: u64 = 76;
    const TABLE_HEADER_SIZE: u64 = 24;

    let table_entries = chunk_count_in_segment as u64 * 4;
    let one_table = SECTION_DESCRIPTOR_SIZE + TABLE_HEADER_SIZE + table_entries + 4;
    let mut total = one_table; // table
    if emit_table2 {
        total += one_table; // table2
    }
    total += SECTION_DESCRIPTOR_SIZE; // next/done
    if emit_error2_hash {
        total += SECTION_DESCRIPTOR_SIZE + 520 + 4; // error2 header + trailer (ranges vary, sized separately by caller)
        total += SECTION_DESCRIPTOR_SIZE + 16 + 4; // hash (MD5 + crc)
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_two_digit_range() {
        assert_eq!(segment_extension(ExtensionFamily::Evidence, 1), "E01");
        assert_eq!(segment_extension(ExtensionFamily::Evidence, 99), "E99");
    }

    #[test]
    fn extensions_roll_into_letters() {
        assert_eq!(segment_extension(ExtensionFamily::Evidence, 100), "EAA");
        assert_eq!(segment_extension(ExtensionFamily::Evidence, 101), "EAB");
        assert_eq!(segment_extension(ExtensionFamily::Evidence, 126), "EBA");
    }

    #[test]
    fn extensions_respect_family() {
        assert_eq!(segment_extension(ExtensionFamily::Logical, 1), "L01");
        assert_eq!(segment_extension(ExtensionFamily::Smart, 1), "s01");
    }

    #[test]
    fn smart_variant_always_compresses() {
        let raw = vec![5u8; 256];
        let plan = plan_chunk(&raw, FormatVariant::Smart, CompressionLevel::Fast, false).unwrap();
        assert!(plan.compressed);
    }

    #[test]
    fn incompressible_data_falls_back_to_raw() {
        // Data just past the 50-byte "repeating header" flate2 overhead
        // threshold so that the deflate stream ends up larger than raw.
        let raw: Vec<u8> = (0..64u16).map(|i| (i % 251) as u8).collect();
        let plan = plan_chunk(&raw, FormatVariant::Ewf, CompressionLevel::Best, false).unwrap();
        if plan.compressed {
            assert!(plan.payload.len() < raw.len() + 4);
        } else {
            assert_eq!(plan.payload.len(), raw.len() + 4);
        }
    }

    #[test]
    fn empty_block_compression_opt_in() {
        let raw = vec![0u8; 4096];
        let plan = plan_chunk(&raw, FormatVariant::Ewf, CompressionLevel::None, true).unwrap();
        assert!(plan.compressed);
    }
}
