//! Volume descriptor: the `volume`/`disk` section payload
//!
//! Grounded on `original_source/libewf/ewf_volume.h` for the 1052-byte E01
//! layout and on the same header's chunk/sector fields for the 94-byte S01
//! layout (SMART images drop the GUID, compression level, and error
//! granularity fields EnCase 5 added).

use crate::ewf::codec;
use crate::ewf::table::ErrorTolerance;
use ewf_core::limits::{checked_multiply_u32_to_u64, ensure_fits_31_bits};
use ewf_core::{Error, Result};
use uuid::Uuid;

/// Size of the E01/Ex01/L01-style volume descriptor
pub const VOLUME_DESCRIPTOR_SIZE: usize = 1052;
/// Size of the older SMART (S01) disk descriptor
pub const DISK_DESCRIPTOR_SIZE: usize = 94;

/// Media type byte, per `ewf_volume.h`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Removable,
    Fixed,
    LogicalEvidence,
    Unknown(u8),
}

impl MediaType {
    fn from_byte(b: u8) -> Self {
        match b {
            0x00 => MediaType::Removable,
            0x01 => MediaType::Fixed,
            0x0e => MediaType::LogicalEvidence,
            other => MediaType::Unknown(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            MediaType::Removable => 0x00,
            MediaType::Fixed => 0x01,
            MediaType::LogicalEvidence => 0x0e,
            MediaType::Unknown(b) => b,
        }
    }
}

/// Compression level carried in the EnCase 5+ volume descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevelTag {
    None,
    Fast,
    Best,
}

impl CompressionLevelTag {
    fn from_byte(b: u8) -> Self {
        match b {
            0x01 => CompressionLevelTag::Fast,
            0x02 => CompressionLevelTag::Best,
            _ => CompressionLevelTag::None,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            CompressionLevelTag::None => 0x00,
            CompressionLevelTag::Fast => 0x01,
            CompressionLevelTag::Best => 0x02,
        }
    }
}

/// The decoded volume/disk descriptor, format differences normalized away
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
    pub media_type: MediaType,
    pub chunk_count: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub sector_count: u32,
    pub media_flags: u8,
    pub compression_level: CompressionLevelTag,
    pub error_granularity: u32,
    /// `None` for S01 descriptors, which predate the GUID field
    pub guid: Option<Uuid>,
}

impl VolumeDescriptor {
    /// Derived chunk size in bytes, bounds-checked against the format's
    /// 31-bit compressed-flag/size fields
    pub fn chunk_size(&self) -> Result<u64> {
        let size = checked_multiply_u32_to_u64(
            self.sectors_per_chunk,
            self.bytes_per_sector,
            "volume.chunk_size",
        )?;
        ensure_fits_31_bits(size, "volume.chunk_size")?;
        Ok(size)
    }

    /// Effective chunk count: a stored `0` means "count not precomputed",
    /// corrected to 1 so callers don't divide the read path by zero. Real
    /// images always have at least one chunk; a legitimate zero-chunk image
    /// would have no `sectors` section to begin with.
    pub fn effective_chunk_count(&self) -> u32 {
        if self.chunk_count == 0 {
            1
        } else {
            self.chunk_count
        }
    }

    /// Parse the full 1052-byte E01/Ex01/L01 volume descriptor
    pub fn parse_full(data: &[u8], tolerance: ErrorTolerance) -> Result<Self> {
        if tolerance < ErrorTolerance::DataOnly {
            let (_, ok) = codec::verify_trailer(&data[..VOLUME_DESCRIPTOR_SIZE]);
            if !ok {
                return Err(Error::PayloadCrc("volume".into()));
            }
        }
        Ok(Self {
            media_type: MediaType::from_byte(data[0]),
            chunk_count: codec::read_u32(&data[4..8]),
            sectors_per_chunk: codec::read_u32(&data[8..12]),
            bytes_per_sector: codec::read_u32(&data[12..16]),
            sector_count: codec::read_u32(&data[16..20]),
            media_flags: data[36],
            compression_level: CompressionLevelTag::from_byte(data[56]),
            error_granularity: codec::read_u32(&data[60..64]),
            guid: Some(Uuid::from_slice(&data[68..84]).unwrap_or(Uuid::nil())),
        })
    }

    /// Serialize as the full 1052-byte descriptor (trailing Adler-32 included)
    pub fn to_bytes_full(&self) -> Vec<u8> {
        let mut out = vec![0u8; VOLUME_DESCRIPTOR_SIZE];
        out[0] = self.media_type.to_byte();
        codec::write_u32(&mut out[4..8], self.chunk_count);
        codec::write_u32(&mut out[8..12], self.sectors_per_chunk);
        codec::write_u32(&mut out[12..16], self.bytes_per_sector);
        codec::write_u32(&mut out[16..20], self.sector_count);
        out[36] = self.media_flags;
        out[56] = self.compression_level.to_byte();
        codec::write_u32(&mut out[60..64], self.error_granularity);
        if let Some(guid) = self.guid {
            out[68..84].copy_from_slice(guid.as_bytes());
        }
        let crc = codec::adler32(1, &out[..VOLUME_DESCRIPTOR_SIZE - 4]);
        codec::write_u32(&mut out[VOLUME_DESCRIPTOR_SIZE - 4..], crc);
        out
    }

    /// Parse the older 94-byte SMART (S01) disk descriptor
    pub fn parse_smart(data: &[u8], tolerance: ErrorTolerance) -> Result<Self> {
        if tolerance < ErrorTolerance::DataOnly {
            let (_, ok) = codec::verify_trailer(&data[..DISK_DESCRIPTOR_SIZE]);
            if !ok {
                return Err(Error::PayloadCrc("disk".into()));
            }
        }
        Ok(Self {
            media_type: MediaType::from_byte(data[0]),
            chunk_count: codec::read_u32(&data[4..8]),
            sectors_per_chunk: codec::read_u32(&data[8..12]),
            bytes_per_sector: codec::read_u32(&data[12..16]),
            sector_count: codec::read_u32(&data[16..20]),
            media_flags: 0,
            compression_level: CompressionLevelTag::None,
            error_granularity: 0,
            guid: None,
        })
    }

    /// Serialize as the 94-byte SMART descriptor
    pub fn to_bytes_smart(&self) -> Vec<u8> {
        let mut out = vec![0u8; DISK_DESCRIPTOR_SIZE];
        out[0] = self.media_type.to_byte();
        codec::write_u32(&mut out[4..8], self.chunk_count);
        codec::write_u32(&mut out[8..12], self.sectors_per_chunk);
        codec::write_u32(&mut out[12..16], self.bytes_per_sector);
        codec::write_u32(&mut out[16..20], self.sector_count);
        let crc = codec::adler32(1, &out[..DISK_DESCRIPTOR_SIZE - 4]);
        codec::write_u32(&mut out[DISK_DESCRIPTOR_SIZE - 4..], crc);
        out
    }
}
