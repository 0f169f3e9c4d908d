//! # EWF Format
//!
//! A read/write engine for the Expert Witness Compression Format family
//! (E01, S01, L01, Ex01): the segment-file section chain, the chunk offset
//! table, the compressed-chunk read/write path, the header text grammar,
//! and the write-time segmentation planner.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ewf_format::ewf::{CompressionPolicy, EwfContainer};
//!
//! let mut container = EwfContainer::open(&["image.E01"], &CompressionPolicy::default()).unwrap();
//! let sector = container.read(512, 0).unwrap();
//! println!("first sector: {} bytes", sector.len());
//! ```

pub mod ewf;

pub use ewf::{CompressionPolicy, ErrorTolerance, EwfContainer};
