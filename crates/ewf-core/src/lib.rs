//! # EWF Core
//!
//! Shared traits, error taxonomy, and bounds-checking helpers for the EWF
//! (Expert Witness Compression Format) engine.
//!
//! The engine crate (`ewf-format`) builds on these: a [`Container`] trait
//! exposing a logical disk image as a flat, seekable byte stream, an
//! [`Error`] enum naming every failure mode the format's section chain,
//! chunk table, and compressed-chunk path can produce, and a
//! [`MessageDigest`] trait so the concrete MD5/SHA-1 providers are not
//! baked into the read/write path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ewf_core::{Container, Result};
//!
//! fn describe(mut container: Box<dyn Container>) -> Result<()> {
//!     println!("format: {}", container.identify());
//!     println!("size: {} bytes", container.length());
//!     Ok(())
//! }
//! ```

pub mod digest;
pub mod error;
pub mod limits;
pub mod traits;

pub use digest::{Md5Digest, Sha1Digest};
pub use error::{Error, Result};
pub use traits::{Container, MessageDigest, ReadSeek, ReadWriteSeek};
