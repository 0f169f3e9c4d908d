//! The `hash` section: the MD5 digest of the logical media
//!
//! Grounded on the teacher's `e01::types::E01HashSection`: 16 bytes of MD5
//! followed by a 4-byte checksum, 20 bytes total.

use crate::ewf::codec;
use ewf_core::{Error, Result};

pub const HASH_SECTION_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSection {
    pub md5: [u8; 16],
}

impl HashSection {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HASH_SECTION_SIZE {
            return Err(Error::FormatSignature("hash section too short".into()));
        }
        let (_, ok) = codec::verify_trailer(&data[..HASH_SECTION_SIZE]);
        if !ok {
            return Err(Error::PayloadCrc("hash".into()));
        }
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&data[0..16]);
        Ok(Self { md5 })
    }

    pub fn to_payload(self) -> Vec<u8> {
        let mut out = vec![0u8; HASH_SECTION_SIZE];
        out[0..16].copy_from_slice(&self.md5);
        let crc = codec::adler32(1, &out[0..16]);
        codec::write_u32(&mut out[16..20], crc);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hash = HashSection { md5: [0xab; 16] };
        let payload = hash.to_payload();
        let parsed = HashSection::parse(&payload).unwrap();
        assert_eq!(parsed.md5, hash.md5);
    }

    #[test]
    fn corrupted_rejected() {
        let hash = HashSection { md5: [1; 16] };
        let mut payload = hash.to_payload();
        let last = payload.len() - 1;
        payload[last] ^= 0xff;
        assert!(HashSection::parse(&payload).is_err());
    }
}
