//! Core traits for the EWF engine

use std::io::{Read, Seek, Write};

/// Trait for a logical disk image container, read/written as a flat device
pub trait Container: Send {
    /// Human-readable identifier for this container's format/variant
    fn identify(&self) -> &str;

    /// Total size of the logical media in bytes
    fn length(&self) -> u64;

    /// A readable and seekable stream over the logical media
    fn content(&mut self) -> &mut dyn ReadSeek;
}

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Combined trait for Read + Write + Seek
pub trait ReadWriteSeek: Read + Write + Seek + Send {}

/// Blanket implementation for any type that implements Read + Write + Seek
impl<T: Read + Write + Seek + Send> ReadWriteSeek for T {}

/// Abstract message digest, selectable at open/write time
///
/// Satisfies the "Hash callbacks" contract: an MD5 context with `init`,
/// `update`, `finalize`, and optionally a SHA-1 context of the same shape.
pub trait MessageDigest: Send {
    /// Feed more bytes into the running digest
    fn update(&mut self, data: &[u8]);

    /// Consume the digest and return the final hash bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Human-readable algorithm name, for diagnostics
    fn algorithm(&self) -> &'static str;
}
