//! The `error2` section: a list of sector ranges the acquisition tool
//! could not read cleanly
//!
//! Grounded on `original_source/libewf/ewf_error2.h`: a 520-byte header
//! (count, 512 reserved bytes, Adler-32 over the header) followed by
//! `count` 8-byte `(first_sector, sector_count)` entries and a trailing
//! Adler-32 over the entry array.

use crate::ewf::codec;
use ewf_core::{Error, Result};

const HEADER_SIZE: usize = 520;
const ENTRY_SIZE: usize = 8;

/// One contiguous run of unreadable sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRange {
    pub first_sector: u32,
    pub sector_count: u32,
}

/// The decoded `error2` section: every bad-sector range recorded during
/// acquisition
#[derive(Debug, Clone, Default)]
pub struct ErrorTable {
    pub ranges: Vec<ErrorRange>,
}

impl ErrorTable {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < HEADER_SIZE {
            return Err(Error::FormatSignature("error2 header truncated".into()));
        }
        let (_, header_ok) = codec::verify_trailer(&payload[..HEADER_SIZE]);
        if !header_ok {
            return Err(Error::SectionCrc {
                section: "error2".into(),
                offset: 0,
            });
        }
        let count = codec::read_u32(&payload[0..4]) as usize;

        let entries_end = HEADER_SIZE + count * ENTRY_SIZE;
        if payload.len() < entries_end + 4 {
            return Err(Error::FormatSignature(
                "error2 entry count exceeds payload".into(),
            ));
        }
        let (_, entries_ok) = codec::verify_trailer(&payload[HEADER_SIZE..entries_end + 4]);
        if !entries_ok {
            return Err(Error::PayloadCrc("error2 entries".into()));
        }

        let mut ranges = Vec::with_capacity(count);
        for i in 0..count {
            let start = HEADER_SIZE + i * ENTRY_SIZE;
            ranges.push(ErrorRange {
                first_sector: codec::read_u32(&payload[start..start + 4]),
                sector_count: codec::read_u32(&payload[start + 4..start + 8]),
            });
        }

        Ok(Self { ranges })
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_SIZE];
        codec::write_u32(&mut header[0..4], self.ranges.len() as u32);
        let header_crc = codec::adler32(1, &header[..HEADER_SIZE - 4]);
        codec::write_u32(&mut header[HEADER_SIZE - 4..], header_crc);

        let mut entries = Vec::with_capacity(self.ranges.len() * ENTRY_SIZE + 4);
        for range in &self.ranges {
            let mut buf = [0u8; ENTRY_SIZE];
            codec::write_u32(&mut buf[0..4], range.first_sector);
            codec::write_u32(&mut buf[4..8], range.sector_count);
            entries.extend_from_slice(&buf);
        }
        let entries_crc = codec::adler32(1, &entries);
        entries.extend_from_slice(&entries_crc.to_le_bytes());

        header.extend_from_slice(&entries);
        header
    }
}
