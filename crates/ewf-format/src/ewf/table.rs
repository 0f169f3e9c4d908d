//! The chunk offset table and error-tolerance lattice
//!
//! Grounded on `original_source/libewf/ewf_table.c`: a `table` section holds
//! a 4-byte entry count, a 24-byte header, then `count` 4-byte offset
//! entries (high bit set means the chunk is compressed), followed by a
//! trailing Adler-32. `table2` duplicates `table` in E01/Ex01 images as a
//! backup copy; in the older S01 layout it instead continues the same
//! logical table across a segment boundary.

use crate::ewf::codec;
use ewf_core::limits::{ensure_fits_31_bits, u64_to_usize};
use ewf_core::{Error, Result};

const COMPRESSED_FLAG: u32 = 0x8000_0000;
/// Fixed fields before the offset entries: count (4), reserved (16), base
/// offset (4)
const TABLE_HEADER_FIELDS_SIZE: usize = 24;
/// Header fields plus their own trailing Adler-32
const TABLE_HEADER_SIZE: usize = TABLE_HEADER_FIELDS_SIZE + 4;

/// How strictly the reader enforces table/table2 agreement and section CRCs
///
/// Ordered `None < DataOnly < Compensate < NonFatal`: each level tolerates
/// strictly more than the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorTolerance {
    /// Any CRC mismatch or table disagreement is a hard failure
    None,
    /// Tolerate payload CRC mismatches, returning zeroed data for the chunk
    DataOnly,
    /// Additionally tolerate table/table2 disagreement by preferring table2
    Compensate,
    /// Tolerate missing/corrupt sections by skipping them entirely
    NonFatal,
}

/// One resolved chunk location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    /// Index of the segment file this chunk lives in
    pub segment: usize,
    /// Offset of the chunk's payload within its segment file
    pub offset: u64,
    /// Size of the chunk's on-disk payload, trailing CRC included
    pub size: u64,
    pub compressed: bool,
}

/// The resolved, in-memory chunk offset table for one image
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    entries: Vec<TableEntry>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, chunk_index: usize) -> Option<&TableEntry> {
        self.entries.get(chunk_index)
    }

    pub fn push(&mut self, entry: TableEntry) {
        self.entries.push(entry);
    }

    /// Parse a raw `table`/`table2` section payload (sans descriptor) into
    /// entries, resolving each entry's size from the start of the next
    /// entry (or, for the last entry, from `sectors_section_end`).
    ///
    /// The payload carries its own base offset (the absolute offset of the
    /// `sectors` section it describes) in its header; `segment` identifies
    /// which segment file that `sectors` section lives in.
    pub fn parse_payload(
        payload: &[u8],
        segment: usize,
        sectors_section_end: u64,
        tolerance: ErrorTolerance,
    ) -> Result<Self> {
        if payload.len() < TABLE_HEADER_SIZE + 4 {
            return Err(Error::FormatSignature("table section too short".into()));
        }
        let count = codec::read_u32(&payload[0..4]) as usize;
        let base_offset = codec::read_u32(&payload[20..24]) as u64;

        if tolerance < ErrorTolerance::DataOnly {
            let (_, ok) = codec::verify_trailer(&payload[..TABLE_HEADER_SIZE]);
            if !ok {
                return Err(Error::SectionCrc {
                    section: "table header".into(),
                    offset: 0,
                });
            }
        }

        let entries_start = TABLE_HEADER_SIZE;
        let entries_end = entries_start + count * 4;
        if payload.len() < entries_end + 4 {
            return Err(Error::FormatSignature(
                "table entry count exceeds payload".into(),
            ));
        }

        if tolerance < ErrorTolerance::DataOnly {
            let (_, ok) = codec::verify_trailer(&payload[entries_start..entries_end + 4]);
            if !ok {
                return Err(Error::PayloadCrc("table".into()));
            }
        }

        let mut raw_offsets = Vec::with_capacity(count);
        for i in 0..count {
            let start = entries_start + i * 4;
            raw_offsets.push(codec::read_u32(&payload[start..start + 4]));
        }

        let mut table = Self::new();
        for (i, &raw) in raw_offsets.iter().enumerate() {
            let compressed = raw & COMPRESSED_FLAG != 0;
            let relative = (raw & !COMPRESSED_FLAG) as u64;
            let offset = base_offset + relative;

            let next_relative = raw_offsets
                .get(i + 1)
                .map(|&next| (next & !COMPRESSED_FLAG) as u64)
                .unwrap_or_else(|| sectors_section_end.saturating_sub(base_offset));
            let size = next_relative.saturating_sub(relative);

            ensure_fits_31_bits(offset, "table.offset")?;
            table.push(TableEntry {
                segment,
                offset,
                size,
                compressed,
            });
        }

        Ok(table)
    }

    /// Serialize entries relative to `base_offset` into a `table`/`table2`
    /// section payload: count + reserved + base offset + header Adler-32,
    /// then the offset entries and their own trailing Adler-32.
    pub fn to_payload(&self, base_offset: u64) -> Result<Vec<u8>> {
        let count = self.entries.len();
        let mut out = vec![0u8; TABLE_HEADER_SIZE + count * 4 + 4];
        codec::write_u32(&mut out[0..4], count as u32);
        let base_offset_u32 = u64_to_usize(base_offset, "table.base_offset")? as u32;
        codec::write_u32(&mut out[20..24], base_offset_u32);
        let header_crc = codec::adler32(1, &out[..TABLE_HEADER_FIELDS_SIZE]);
        codec::write_u32(
            &mut out[TABLE_HEADER_FIELDS_SIZE..TABLE_HEADER_SIZE],
            header_crc,
        );

        for (i, entry) in self.entries.iter().enumerate() {
            let relative = entry.offset.checked_sub(base_offset).ok_or_else(|| {
                Error::OutOfRange(format!("table entry {i} precedes its sectors section"))
            })?;
            let relative = u64_to_usize(relative, "table.relative_offset")? as u32;
            let mut raw = relative;
            if entry.compressed {
                raw |= COMPRESSED_FLAG;
            }
            let start = TABLE_HEADER_SIZE + i * 4;
            codec::write_u32(&mut out[start..start + 4], raw);
        }

        let trailer_at = out.len() - 4;
        let crc = codec::adler32(1, &out[TABLE_HEADER_SIZE..trailer_at]);
        codec::write_u32(&mut out[trailer_at..], crc);
        Ok(out)
    }

    /// Compare this table (assumed parsed from `table`) against a `table2`
    /// payload, applying the tolerance lattice: exact disagreement is a
    /// hard error below [`ErrorTolerance::Compensate`], and tolerated (table
    /// wins) at or above it. Returns `true` if the two tables agreed.
    pub fn reconcile_with_table2(&self, table2: &Self, tolerance: ErrorTolerance) -> Result<bool> {
        if self.entries == table2.entries {
            return Ok(true);
        }
        if tolerance < ErrorTolerance::Compensate {
            return Err(Error::OutOfRange("table/table2 disagree".into()));
        }
        Ok(false)
    }
}
