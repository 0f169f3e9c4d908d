//! Concrete [`MessageDigest`] implementations
//!
//! The engine only depends on the `MessageDigest` trait; these adapters over
//! the `md-5`/`sha1` crates are the default providers selected at open time.

use crate::traits::MessageDigest;
use md5::{Digest, Md5};
use sha1::Sha1;

/// MD5 digest, as stored in the `hash`/`digest` section
#[derive(Default)]
pub struct Md5Digest(Md5);

impl MessageDigest for Md5Digest {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn algorithm(&self) -> &'static str {
        "MD5"
    }
}

/// SHA-1 digest, as optionally stored alongside the MD5 digest
#[derive(Default)]
pub struct Sha1Digest(Sha1);

impl MessageDigest for Sha1Digest {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }

    fn algorithm(&self) -> &'static str {
        "SHA1"
    }
}
