//! Segment file I/O: signatures, the 13-byte file header, and per-segment
//! offset tracking with reopen-on-demand
//!
//! Grounded on `original_source/libewf/libewf_segment_file_handle.c` and
//! `ewf_file_header.c`: each segment file tracks its own logical offset so
//! the container can reopen a descriptor and seek back to where it left
//! off, rather than holding every segment's file handle open at once.

use ewf_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Evidence (E01/Ex01) file signature
pub const EVF_SIGNATURE: [u8; 8] = [0x45, 0x56, 0x46, 0x09, 0x0D, 0x0A, 0xFF, 0x00];
/// Logical (L01) file signature
pub const LVF_SIGNATURE: [u8; 8] = [0x4C, 0x56, 0x46, 0x09, 0x0D, 0x0A, 0xFF, 0x00];

/// Size of the fixed segment file header
pub const FILE_HEADER_SIZE: usize = 13;

/// Which family of container this segment file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Evidence file (E01, S01, Ex01)
    Evidence,
    /// Logical evidence file (L01)
    Logical,
}

impl FileType {
    fn signature(self) -> [u8; 8] {
        match self {
            FileType::Evidence => EVF_SIGNATURE,
            FileType::Logical => LVF_SIGNATURE,
        }
    }

    fn from_signature(sig: &[u8; 8]) -> Result<Self> {
        if *sig == EVF_SIGNATURE {
            Ok(FileType::Evidence)
        } else if *sig == LVF_SIGNATURE {
            Ok(FileType::Logical)
        } else {
            Err(Error::FormatSignature(format!("{sig:02x?}")))
        }
    }
}

/// The fixed 13-byte segment file header
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    /// Evidence vs. logical container
    pub file_type: FileType,
    /// 1-based segment number
    pub segment_number: u16,
}

impl FileHeader {
    /// Parse the 13-byte header from the start of a segment file
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FILE_HEADER_SIZE {
            return Err(Error::FormatSignature("file header truncated".into()));
        }
        let mut sig = [0u8; 8];
        sig.copy_from_slice(&data[0..8]);
        let file_type = FileType::from_signature(&sig)?;

        if data[8] != 0x01 {
            return Err(Error::FormatSignature("missing fields-start marker".into()));
        }
        let segment_number = crate::ewf::codec::read_u16(&data[9..11]);
        if data[11..13] != [0x00, 0x00] {
            return Err(Error::FormatSignature("missing fields-end marker".into()));
        }

        Ok(Self {
            file_type,
            segment_number,
        })
    }

    /// Serialize the header to its fixed 13-byte layout
    pub fn to_bytes(self) -> [u8; FILE_HEADER_SIZE] {
        let mut out = [0u8; FILE_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.file_type.signature());
        out[8] = 0x01;
        crate::ewf::codec::write_u16(&mut out[9..11], self.segment_number);
        out[11] = 0x00;
        out[12] = 0x00;
        out
    }
}

/// Open-mode for a container, per spec §6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlags {
    /// Read-only
    Read,
    /// Write-only; truncates an existing file
    Write,
    /// Read and write
    ReadWrite,
    /// Seek to the last `done` section and continue writing from there
    Resume,
}

/// A single physical file participating in the segment chain
pub struct SegmentFile {
    path: PathBuf,
    handle: Option<File>,
    flags: OpenFlags,
    /// Remembered logical offset, valid even while `handle` is closed
    offset: u64,
    /// 1-based position in the chain
    pub segment_number: u16,
    pub file_type: FileType,
}

impl SegmentFile {
    /// Open an existing segment file and parse its fixed header
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut handle = File::open(&path)?;
        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        handle.read_exact(&mut header_bytes)?;
        let header = FileHeader::parse(&header_bytes)?;

        Ok(Self {
            path,
            handle: Some(handle),
            flags,
            offset: FILE_HEADER_SIZE as u64,
            segment_number: header.segment_number,
            file_type: header.file_type,
        })
    }

    /// Create a new segment file and write its fixed header
    pub fn create(
        path: impl AsRef<Path>,
        segment_number: u16,
        file_type: FileType,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .read(true)
            .open(&path)?;

        let header = FileHeader {
            file_type,
            segment_number,
        };
        handle.write_all(&header.to_bytes())?;

        Ok(Self {
            path,
            handle: Some(handle),
            flags: OpenFlags::Write,
            offset: FILE_HEADER_SIZE as u64,
            segment_number,
            file_type,
        })
    }

    /// The segment file's path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The segment file's current logical offset
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Close the underlying descriptor, remembering the current offset
    ///
    /// The handle is reacquired transparently on the next `read`/`write`/
    /// `seek`, matching `libewf_segment_file_handle_reopen`'s contract: this
    /// is the strategy the read path uses when many handles would otherwise
    /// exhaust file descriptors.
    pub fn close(&mut self) {
        self.handle = None;
    }

    fn ensure_open(&mut self) -> Result<&mut File> {
        if self.handle.is_none() {
            let mut handle = match self.flags {
                OpenFlags::Read => File::open(&self.path)?,
                _ => OpenOptions::new().read(true).write(true).open(&self.path)?,
            };
            handle.seek(SeekFrom::Start(self.offset))?;
            self.handle = Some(handle);
        }
        Ok(self.handle.as_mut().expect("just ensured open"))
    }

    /// Seek to an absolute offset within the segment file
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let handle = self.ensure_open()?;
        handle.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    /// Read exactly `buf.len()` bytes, advancing the logical offset
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let handle = self.ensure_open()?;
        handle.read_exact(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Write all of `buf`, advancing the logical offset
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let handle = self.ensure_open()?;
        handle.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Flush any buffered writes
    pub fn flush(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.as_mut() {
            handle.flush()?;
        }
        Ok(())
    }
}
