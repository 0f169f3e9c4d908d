//! The 76-byte section descriptor and the typed section chain
//!
//! Grounded on `original_source/libewf/ewf_section.h`: every section in a
//! segment file is prefixed by a fixed descriptor naming its type, the
//! absolute offset of the next descriptor, and its own size, followed by
//! 40 bytes of padding and a trailing Adler-32 over the preceding 72 bytes.

use crate::ewf::codec;
use ewf_core::{Error, Result};

/// Size of the fixed section descriptor
pub const SECTION_DESCRIPTOR_SIZE: usize = 76;

/// The type tag carried in a section descriptor's first 16 bytes
///
/// `Unknown` preserves the raw tag bytes so a reader tolerant of unfamiliar
/// sections (error tolerance above [`crate::ewf::table::ErrorTolerance::None`])
/// can skip them without losing the ability to report what it skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionType {
    Header,
    Header2,
    XHeader,
    Volume,
    Disk,
    Data,
    Sectors,
    Table,
    Table2,
    Ltree,
    Session,
    Error2,
    Digest,
    Hash,
    Next,
    Done,
    Unknown([u8; 16]),
}

impl SectionType {
    fn tag(&self) -> [u8; 16] {
        fn pad(s: &[u8]) -> [u8; 16] {
            let mut out = [0u8; 16];
            out[..s.len()].copy_from_slice(s);
            out
        }
        match self {
            SectionType::Header => pad(b"header"),
            SectionType::Header2 => pad(b"header2"),
            SectionType::XHeader => pad(b"xheader"),
            SectionType::Volume => pad(b"volume"),
            SectionType::Disk => pad(b"disk"),
            SectionType::Data => pad(b"data"),
            SectionType::Sectors => pad(b"sectors"),
            SectionType::Table => pad(b"table"),
            SectionType::Table2 => pad(b"table2"),
            SectionType::Ltree => pad(b"ltree"),
            SectionType::Session => pad(b"session"),
            SectionType::Error2 => pad(b"error2"),
            SectionType::Digest => pad(b"digest"),
            SectionType::Hash => pad(b"hash"),
            SectionType::Next => pad(b"next"),
            SectionType::Done => pad(b"done"),
            SectionType::Unknown(tag) => *tag,
        }
    }

    fn from_tag(tag: [u8; 16]) -> Self {
        let len = tag.iter().position(|&b| b == 0).unwrap_or(tag.len());
        match &tag[..len] {
            b"header" => SectionType::Header,
            b"header2" => SectionType::Header2,
            b"xheader" => SectionType::XHeader,
            b"volume" | b"disk" => {
                if &tag[..len] == b"disk" {
                    SectionType::Disk
                } else {
                    SectionType::Volume
                }
            }
            b"data" => SectionType::Data,
            b"sectors" => SectionType::Sectors,
            b"table" => SectionType::Table,
            b"table2" => SectionType::Table2,
            b"ltree" => SectionType::Ltree,
            b"session" => SectionType::Session,
            b"error2" => SectionType::Error2,
            b"digest" => SectionType::Digest,
            b"hash" => SectionType::Hash,
            b"next" => SectionType::Next,
            b"done" => SectionType::Done,
            _ => SectionType::Unknown(tag),
        }
    }

    /// Does this section end the segment file (no more sections follow it
    /// in this physical file, though `next`'s descriptor points at the next
    /// segment)?
    pub fn is_terminal(&self) -> bool {
        matches!(self, SectionType::Next | SectionType::Done)
    }
}

/// A parsed section descriptor plus its resolved payload offset
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    pub section_type: SectionType,
    /// Absolute offset of the next section descriptor in the chain
    pub next_offset: u64,
    /// Total size of this section, descriptor included
    pub size: u64,
    /// Absolute offset of this descriptor (payload starts immediately after)
    pub self_offset: u64,
}

impl SectionDescriptor {
    /// Absolute offset of this section's payload
    pub fn payload_offset(&self) -> u64 {
        self.self_offset + SECTION_DESCRIPTOR_SIZE as u64
    }

    /// Size of this section's payload, descriptor and trailer excluded
    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(SECTION_DESCRIPTOR_SIZE as u64)
    }

    /// Parse a 76-byte descriptor, verifying its trailing Adler-32
    pub fn parse(data: &[u8], self_offset: u64) -> Result<Self> {
        if data.len() < SECTION_DESCRIPTOR_SIZE {
            return Err(Error::FormatSignature(
                "section descriptor truncated".into(),
            ));
        }

        let (computed, ok) = codec::verify_trailer(&data[..SECTION_DESCRIPTOR_SIZE]);
        if !ok {
            return Err(Error::SectionCrc {
                section: "descriptor".into(),
                offset: self_offset,
            });
        }
        let _ = computed;

        let mut tag = [0u8; 16];
        tag.copy_from_slice(&data[0..16]);
        let next_offset = codec::read_u64(&data[16..24]);
        let size = codec::read_u64(&data[24..32]);

        Ok(Self {
            section_type: SectionType::from_tag(tag),
            next_offset,
            size,
            self_offset,
        })
    }

    /// Serialize the descriptor, computing its trailing Adler-32
    pub fn to_bytes(&self) -> [u8; SECTION_DESCRIPTOR_SIZE] {
        let mut out = [0u8; SECTION_DESCRIPTOR_SIZE];
        out[0..16].copy_from_slice(&self.section_type.tag());
        codec::write_u64(&mut out[16..24], self.next_offset);
        codec::write_u64(&mut out[24..32], self.size);
        // out[32..72] left zeroed: 40 bytes of reserved padding
        let crc = codec::adler32(1, &out[..72]);
        codec::write_u32(&mut out[72..76], crc);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_table_descriptor() {
        let desc = SectionDescriptor {
            section_type: SectionType::Table,
            next_offset: 4096,
            size: 512,
            self_offset: 13,
        };
        let bytes = desc.to_bytes();
        let parsed = SectionDescriptor::parse(&bytes, 13).unwrap();
        assert_eq!(parsed.section_type, SectionType::Table);
        assert_eq!(parsed.next_offset, 4096);
        assert_eq!(parsed.size, 512);
        assert_eq!(parsed.payload_offset(), 13 + SECTION_DESCRIPTOR_SIZE as u64);
        assert_eq!(parsed.payload_size(), 512 - SECTION_DESCRIPTOR_SIZE as u64);
    }

    #[test]
    fn corrupted_descriptor_fails_crc() {
        let desc = SectionDescriptor {
            section_type: SectionType::Done,
            next_offset: 0,
            size: SECTION_DESCRIPTOR_SIZE as u64,
            self_offset: 0,
        };
        let mut bytes = desc.to_bytes();
        bytes[0] ^= 0xff;
        assert!(matches!(
            SectionDescriptor::parse(&bytes, 0),
            Err(Error::SectionCrc { .. })
        ));
    }

    #[test]
    fn unknown_tag_preserved() {
        let mut tag = [0u8; 16];
        tag[..4].copy_from_slice(b"zzzz");
        let section_type = SectionType::from_tag(tag);
        assert_eq!(section_type, SectionType::Unknown(tag));
    }

    #[test]
    fn terminal_sections() {
        assert!(SectionType::Done.is_terminal());
        assert!(SectionType::Next.is_terminal());
        assert!(!SectionType::Table.is_terminal());
    }
}
