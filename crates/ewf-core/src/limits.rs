//! Bounds-checking helpers shared by the chunk, offset, and section arithmetic
//!
//! EWF packs chunk offsets and sizes into 31-bit fields (the top bit of a
//! table entry is the compression flag) and section sizes into 63-bit
//! fields; every arithmetic step that could overflow those bounds goes
//! through one of these helpers so the failure surfaces as
//! [`crate::Error::OutOfRange`] instead of a silent wraparound.

use crate::Error;

/// Largest value representable in EWF's 31-bit chunk offset/size fields
pub const MAX_31_BIT: u64 = (1u64 << 31) - 1;

/// Multiply two `u64`s, failing with [`Error::OutOfRange`] on overflow
pub fn checked_multiply_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| Error::out_of_range(format!("{context}: multiplication overflow")))
}

/// Multiply two `u32`s widened to `u64`, failing with [`Error::OutOfRange`] on overflow
pub fn checked_multiply_u32_to_u64(a: u32, b: u32, context: &str) -> crate::Result<u64> {
    (a as u64)
        .checked_mul(b as u64)
        .ok_or_else(|| Error::out_of_range(format!("{context}: multiplication overflow")))
}

/// Convert a `u64` to `usize`, failing with [`Error::OutOfRange`] if it would truncate
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value.try_into().map_err(|_| {
        Error::out_of_range(format!(
            "{context}: value {value} exceeds platform usize limit"
        ))
    })
}

/// Ensure a derived chunk size fits EWF's 31-bit field
pub fn ensure_fits_31_bits(value: u64, context: &str) -> crate::Result<()> {
    if value > MAX_31_BIT {
        return Err(Error::out_of_range(format!(
            "{context}: {value} exceeds the 31-bit field limit"
        )));
    }
    Ok(())
}
