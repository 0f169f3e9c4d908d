//! The container handle: ties the segment chain, offset table, chunk
//! cache, and header values together behind a flat, seekable byte stream
//!
//! Grounded on the teacher's `e01::EwfImage` open/read structure, generalized
//! to the full section chain and multi-segment layout spec.md describes.

use crate::ewf::cache::ChunkCache;
use crate::ewf::codec;
use crate::ewf::compression::{self, CompressionLevel, Decompressed};
use crate::ewf::error2::ErrorTable;
use crate::ewf::hash::HashSection;
use crate::ewf::header::{FormatVariant, HeaderValues};
use crate::ewf::policy::{self, CompressionPolicy};
use crate::ewf::section::{SectionDescriptor, SectionType, SECTION_DESCRIPTOR_SIZE};
use crate::ewf::segment::{FileType, OpenFlags, SegmentFile};
use crate::ewf::table::{ErrorTolerance, OffsetTable, TableEntry};
use crate::ewf::volume::{VolumeDescriptor, DISK_DESCRIPTOR_SIZE};
use crate::ewf::writer::{self, ExtensionFamily};
use ewf_core::{Error, Md5Digest, MessageDigest, Result, Sha1Digest};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

/// The opened image: segment files, resolved offset table, header values,
/// and the single-chunk read cache
pub struct EwfContainer {
    segments: Vec<SegmentFile>,
    volume: VolumeDescriptor,
    table: OffsetTable,
    header: HeaderValues,
    errors: ErrorTable,
    stored_md5: Option<[u8; 16]>,
    cache: ChunkCache,
    policy: CompressionPolicy,
    position: u64,
    crc_error_chunks: HashSet<usize>,
    hashed_chunks: HashSet<usize>,
    md5: Option<Box<dyn MessageDigest>>,
    sha1: Option<Box<dyn MessageDigest>>,
}

impl EwfContainer {
    /// Open a segment chain starting from its first file and follow `next`
    /// sections across every additional segment
    pub fn open(paths: &[impl AsRef<Path>], policy: &CompressionPolicy) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::invalid_argument("no segment filenames supplied"));
        }

        let mut segments = Vec::new();
        for path in paths {
            segments.push(SegmentFile::open(path.as_ref(), OpenFlags::Read)?);
        }

        let mut volume: Option<VolumeDescriptor> = None;
        let mut header = HeaderValues::new();
        let mut table = OffsetTable::new();
        let mut errors = ErrorTable::default();
        let mut last_segment_table: Option<OffsetTable> = None;
        let mut sectors_section_end = 0u64;
        let mut last_terminal: Option<SectionType> = None;
        let mut stored_md5: Option<[u8; 16]> = None;
        let tolerance = policy.error_tolerance;
        // S01 carries no `sectors` wrapper: its `table`/`table2` sections sit
        // directly in front of the raw chunk bytes they describe, so the
        // last entry's size can't be resolved until the section that
        // follows that chunk data is reached. `pending_table` defers that
        // parse from the `Table`/`Table2` arm to the top of the next
        // iteration, once `desc.self_offset` gives the blob's end.
        let mut is_smart_image = false;
        let mut pending_table: Option<(Vec<u8>, usize)> = None;

        for (segment_index, segment) in segments.iter_mut().enumerate() {
            let mut offset = 13u64;
            loop {
                let mut desc_bytes = [0u8; SECTION_DESCRIPTOR_SIZE];
                segment.seek_to(offset)?;
                segment.read_exact(&mut desc_bytes)?;
                let desc = SectionDescriptor::parse(&desc_bytes, offset)?;

                let payload_len =
                    ewf_core::limits::u64_to_usize(desc.payload_size(), "section.payload_size")?;
                let mut payload = vec![0u8; payload_len];
                segment.seek_to(desc.payload_offset())?;
                segment.read_exact(&mut payload)?;

                if let Some((pending_payload, pending_segment)) = pending_table.take() {
                    let parsed = OffsetTable::parse_payload(
                        &pending_payload,
                        pending_segment,
                        desc.self_offset,
                        tolerance,
                    )?;
                    for i in 0..parsed.len() {
                        table.push(*parsed.get(i).unwrap());
                    }
                }

                match &desc.section_type {
                    SectionType::Header => {
                        if let Ok(inflated) = inflate_header(&payload) {
                            if let Ok(parsed) = HeaderValues::decode(&inflated) {
                                header = parsed;
                            }
                        }
                    }
                    // header (v1/ASCII) already won if present; header2 is
                    // consulted only to fill values header left empty.
                    SectionType::Header2 if header.iter().next().is_none() => {
                        if let Ok(inflated) = inflate_header(&payload) {
                            if let Ok(parsed) = HeaderValues::decode(&inflated) {
                                header = parsed;
                            }
                        }
                    }
                    SectionType::XHeader if header.iter().next().is_none() => {
                        if let Ok(inflated) = inflate_header(&payload) {
                            if let Ok(parsed) = HeaderValues::decode_xheader(&inflated) {
                                header = parsed;
                            }
                        }
                    }
                    SectionType::Volume => {
                        // Detection is by section size, not tag: E01/Ex01
                        // carry the 1052-byte full descriptor, S01 the
                        // 94-byte disk descriptor, both tagged `volume`.
                        if payload.len() <= DISK_DESCRIPTOR_SIZE {
                            is_smart_image = true;
                            volume = Some(VolumeDescriptor::parse_smart(&payload, tolerance)?);
                        } else {
                            volume = Some(VolumeDescriptor::parse_full(&payload, tolerance)?);
                        }
                    }
                    SectionType::Disk => {
                        is_smart_image = true;
                        volume = Some(VolumeDescriptor::parse_smart(&payload, tolerance)?);
                    }
                    SectionType::Table if is_smart_image => {
                        // No `sectors` section precedes this one; the chunk
                        // blob it describes follows immediately, so its
                        // size is resolved once the next section is read.
                        pending_table = Some((payload, segment_index));
                    }
                    SectionType::Table2 if is_smart_image => {
                        // S01's `table2` extends `table` with the entries
                        // of a second chunk-data run rather than
                        // duplicating it for verification.
                        pending_table = Some((payload, segment_index));
                    }
                    SectionType::Table => {
                        // The `table` section immediately follows `sectors`,
                        // so its own offset marks where that payload ended;
                        // `table2`, coming later, must resolve its last
                        // entry's size against this same boundary rather
                        // than its own (later) offset.
                        sectors_section_end = desc.self_offset;
                        let parsed = OffsetTable::parse_payload(
                            &payload,
                            segment_index,
                            sectors_section_end,
                            tolerance,
                        )?;
                        for i in 0..parsed.len() {
                            table.push(*parsed.get(i).unwrap());
                        }
                        last_segment_table = Some(parsed);
                    }
                    SectionType::Table2 => {
                        let parsed = OffsetTable::parse_payload(
                            &payload,
                            segment_index,
                            sectors_section_end,
                            tolerance,
                        )?;
                        if let Some(table) = last_segment_table.take() {
                            if !table.reconcile_with_table2(&parsed, tolerance)? {
                                tracing::warn!(
                                    segment_index,
                                    "table/table2 disagree, trusting table"
                                );
                            }
                        }
                    }
                    SectionType::Error2 => {
                        errors = ErrorTable::parse(&payload)?;
                    }
                    SectionType::Hash => {
                        stored_md5 = Some(HashSection::parse(&payload)?.md5);
                    }
                    SectionType::Digest => {
                        // The Ex01 SHA-1-capable digest section's byte layout
                        // isn't pinned down by any available reference; this
                        // build only trusts the narrower `hash` section.
                        if tolerance < ErrorTolerance::NonFatal {
                            return Err(Error::unsupported("digest section (Ex01 SHA-1)"));
                        }
                        tracing::warn!(segment_index, "skipping unsupported digest section");
                    }
                    _ => {}
                }

                if desc.section_type.is_terminal() {
                    last_terminal = Some(desc.section_type.clone());
                    break;
                }
                offset = desc.next_offset;
            }
        }

        if !matches!(last_terminal, Some(SectionType::Done)) {
            return Err(Error::MissingSection("done"));
        }

        let volume = volume.ok_or(Error::MissingSection("volume"))?;

        Ok(Self {
            segments,
            volume,
            table,
            header,
            errors,
            stored_md5,
            cache: ChunkCache::new(),
            policy: *policy,
            position: 0,
            crc_error_chunks: HashSet::new(),
            hashed_chunks: HashSet::new(),
            md5: Some(Box::<Md5Digest>::default()),
            sha1: Some(Box::<Sha1Digest>::default()),
        })
    }

    /// Open a segment set by its base name (no extension), discovering the
    /// ordered path list by globbing the extension sequence rather than
    /// requiring the caller to already have it
    pub fn open_base_name(base_path: impl AsRef<Path>, policy: &CompressionPolicy) -> Result<Self> {
        let paths = glob_segment_set(base_path.as_ref())?;
        Self::open(&paths, policy)
    }

    pub fn header_values(&self) -> &HeaderValues {
        &self.header
    }

    pub fn volume(&self) -> &VolumeDescriptor {
        &self.volume
    }

    pub fn errors(&self) -> &ErrorTable {
        &self.errors
    }

    /// The MD5 digest stored in the image's `hash` section on write, if any
    pub fn stored_md5(&self) -> Option<[u8; 16]> {
        self.stored_md5
    }

    pub fn chunk_size(&self) -> Result<u64> {
        self.volume.chunk_size()
    }

    pub fn media_size(&self) -> u64 {
        self.volume.sector_count as u64 * self.volume.bytes_per_sector as u64
    }

    /// Chunks with a recorded CRC/decompression failure
    pub fn crc_error_chunks(&self) -> &HashSet<usize> {
        &self.crc_error_chunks
    }

    /// The resolved segment/offset/size for a chunk, as recorded in the
    /// offset table
    pub fn table_entry(&self, chunk_index: usize) -> Option<TableEntry> {
        self.table.get(chunk_index).copied()
    }

    /// Finalize the rolling digests once every chunk has been read at least
    /// once, returning `(md5, sha1)`
    pub fn finalize_digests(&mut self) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        let md5 = self.md5.take().map(|d| d.finalize());
        let sha1 = self.sha1.take().map(|d| d.finalize());
        (md5, sha1)
    }

    fn load_chunk(&mut self, chunk_index: usize) -> Result<()> {
        if self.cache.hit(chunk_index) {
            return Ok(());
        }

        let chunk_size = ewf_core::limits::u64_to_usize(self.chunk_size()?, "chunk_size")?;
        let entry @ TableEntry {
            segment,
            offset,
            size,
            compressed,
        } = *self
            .table
            .get(chunk_index)
            .ok_or_else(|| Error::OutOfRange(format!("chunk {chunk_index} out of range")))?;
        let _ = entry;

        let raw_len = ewf_core::limits::u64_to_usize(size, "chunk.raw_size")?;
        self.cache.scratch_mut(raw_len).resize(raw_len, 0);
        let mut raw = vec![0u8; raw_len];
        self.segments[segment].seek_to(offset)?;
        self.segments[segment].read_exact(&mut raw)?;

        let mut payload = if compressed {
            match compression::decompress(&raw, chunk_size + 4)? {
                Decompressed::Ok(data) => data,
                Decompressed::DataError => {
                    self.crc_error_chunks.insert(chunk_index);
                    if self.policy.error_tolerance < ErrorTolerance::DataOnly {
                        return Err(Error::DecompressionDataError(chunk_index));
                    }
                    // No usable bytes survive a failed inflate, so there is
                    // nothing to fall back to short of zero-filling even
                    // when `wipe_block_on_read_error` is unset.
                    tracing::warn!(chunk_index, "chunk decompression failed, returning zeros");
                    vec![0u8; chunk_size]
                }
            }
        } else {
            let data_len = raw.len().saturating_sub(4).min(chunk_size);
            let (_, ok) = codec::verify_trailer(&raw[..data_len + 4]);
            if !ok {
                self.crc_error_chunks.insert(chunk_index);
                if self.policy.error_tolerance < ErrorTolerance::DataOnly {
                    return Err(Error::PayloadCrc(format!("chunk {chunk_index}")));
                }
                if self.policy.wipe_block_on_read_error {
                    tracing::warn!(chunk_index, "chunk payload CRC mismatch, returning zeros");
                    vec![0u8; chunk_size]
                } else {
                    tracing::warn!(
                        chunk_index,
                        "chunk payload CRC mismatch, returning unverified bytes"
                    );
                    let mut salvaged = raw[..data_len].to_vec();
                    salvaged.resize(chunk_size, 0);
                    salvaged
                }
            } else {
                raw[..data_len].to_vec()
            }
        };

        if self.hashed_chunks.insert(chunk_index) {
            if let Some(md5) = self.md5.as_mut() {
                md5.update(&payload);
            }
            if let Some(sha1) = self.sha1.as_mut() {
                sha1.update(&payload);
            }
        }

        if self.policy.swap_byte_pairs {
            policy::swap_byte_pairs(&mut payload);
        }

        self.cache.store(chunk_index, &payload);
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `offset` into `buf`, returning the
    /// number of bytes actually copied (short at end of media)
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let chunk_size = self.chunk_size()?;
        let media_size = self.media_size();
        let mut copied = 0usize;
        let mut cursor = offset;

        while copied < buf.len() && cursor < media_size {
            let chunk_index = ewf_core::limits::u64_to_usize(cursor / chunk_size, "chunk_index")?;
            let in_chunk_offset =
                ewf_core::limits::u64_to_usize(cursor % chunk_size, "in_chunk_offset")?;

            self.load_chunk(chunk_index)?;
            let payload = self.cache.get(chunk_index).expect("just loaded");

            let available = payload.len().saturating_sub(in_chunk_offset);
            let want = (buf.len() - copied).min(available);
            if want == 0 {
                break;
            }
            buf[copied..copied + want]
                .copy_from_slice(&payload[in_chunk_offset..in_chunk_offset + want]);
            copied += want;
            cursor += want as u64;
        }

        Ok(copied)
    }

    /// Read `len` bytes at `offset`, returning a freshly allocated buffer
    pub fn read(&mut self, len: usize, offset: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Move the logical cursor used by the [`std::io::Read`]/[`std::io::Seek`]
    /// adapter returned by [`Container::content`]
    pub fn seek_to(&mut self, offset: u64) -> u64 {
        self.position = offset.min(self.media_size());
        self.position
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl std::io::Read for EwfContainer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let offset = self.position();
        let n = self.read_at(buf, offset).map_err(std::io::Error::other)?;
        self.seek_to(offset + n as u64);
        Ok(n)
    }
}

impl std::io::Seek for EwfContainer {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        let media_size = self.media_size();
        let new_pos = match pos {
            std::io::SeekFrom::Start(n) => n as i64,
            std::io::SeekFrom::End(n) => media_size as i64 + n,
            std::io::SeekFrom::Current(n) => self.position() as i64 + n,
        };
        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of media",
            ));
        }
        Ok(self.seek_to(new_pos as u64))
    }
}

impl ewf_core::Container for EwfContainer {
    fn identify(&self) -> &str {
        "EWF"
    }

    fn length(&self) -> u64 {
        self.media_size()
    }

    fn content(&mut self) -> &mut dyn ewf_core::ReadSeek {
        self
    }
}

/// Discover an ordered segment set from a base name by generating the
/// extension sequence [`writer::segment_extension`] produces and probing for
/// each file on disk, stopping at the first one that doesn't exist. The
/// dialect's extension family is detected by checking which of `.E01`,
/// `.L01`, or `.s01` the first segment actually uses.
fn glob_segment_set(base_path: &Path) -> Result<Vec<PathBuf>> {
    const FAMILIES: [ExtensionFamily; 3] = [
        ExtensionFamily::Evidence,
        ExtensionFamily::Logical,
        ExtensionFamily::Smart,
    ];

    let family = FAMILIES
        .into_iter()
        .find(|&family| {
            base_path
                .with_extension(writer::segment_extension(family, 1))
                .is_file()
        })
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "no segment files found for base name {}",
                base_path.display()
            ))
        })?;

    let mut paths = Vec::new();
    let mut segment_number = 1u32;
    loop {
        let path = base_path.with_extension(writer::segment_extension(family, segment_number));
        if !path.is_file() {
            break;
        }
        paths.push(path);
        segment_number += 1;
    }
    Ok(paths)
}

fn inflate_header(payload: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    let mut decoder = ZlibDecoder::new(payload);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::CompressionFailed(e.to_string()))?;
    Ok(out)
}

/// Plan for building an image from scratch: geometry, dialect, and
/// per-segment size target. The single entry point the write path in
/// `build_image` consumes.
pub struct WritePlan {
    pub base_path: PathBuf,
    pub variant: FormatVariant,
    pub compression: CompressionLevel,
    /// Compress a chunk that is a single repeated byte even when it wouldn't
    /// otherwise beat the raw encoding on size (spec §4.9's
    /// `compress_empty_block` option)
    pub compress_empty_block: bool,
    pub bytes_per_sector: u32,
    pub sectors_per_chunk: u32,
    pub segment_target_size: u64,
    pub header: HeaderValues,
    pub error_ranges: Vec<crate::ewf::error2::ErrorRange>,
}

/// Build a complete segment chain for `data`, splitting across segments per
/// `plan.segment_target_size`, and return the ordered list of filenames
/// written. This is the write-time counterpart to [`EwfContainer::open`].
pub fn build_image(plan: &WritePlan, data: &[u8]) -> Result<Vec<PathBuf>> {
    let chunk_size = plan.sectors_per_chunk as u64 * plan.bytes_per_sector as u64;
    ewf_core::limits::ensure_fits_31_bits(chunk_size, "write_plan.chunk_size")?;
    let chunk_size = ewf_core::limits::u64_to_usize(chunk_size, "chunk_size")?;

    let sector_count = (data.len() as u64).div_ceil(plan.bytes_per_sector as u64);
    let chunk_count = (data.len() + chunk_size - 1).max(chunk_size) / chunk_size;

    let family = match plan.variant {
        FormatVariant::Smart => ExtensionFamily::Smart,
        _ => ExtensionFamily::Evidence,
    };
    let emit_table2 = !matches!(plan.variant, FormatVariant::Smart);

    let mut written_paths = Vec::new();
    let mut segment_number = 1u32;
    let mut chunk_index = 0usize;
    let total_chunks = chunk_count.max(1);

    let volume = VolumeDescriptor {
        media_type: crate::ewf::volume::MediaType::Fixed,
        chunk_count: total_chunks as u32,
        sectors_per_chunk: plan.sectors_per_chunk,
        bytes_per_sector: plan.bytes_per_sector,
        sector_count: sector_count as u32,
        media_flags: 1,
        compression_level: crate::ewf::volume::CompressionLevelTag::None,
        error_granularity: 64,
        guid: Some(uuid::Uuid::new_v4()),
    };

    let is_smart = matches!(plan.variant, FormatVariant::Smart);

    while chunk_index < total_chunks {
        let ext = writer::segment_extension(family, segment_number);
        let path = plan.base_path.with_extension(ext);
        let mut segment = SegmentFile::create(&path, segment_number as u16, FileType::Evidence)?;

        if segment_number == 1 {
            write_header_sections(&mut segment, plan)?;
            let volume_payload = if is_smart {
                volume.to_bytes_smart()
            } else {
                volume.to_bytes_full()
            };
            write_section(&mut segment, SectionType::Volume, &volume_payload)?;
        } else if !is_smart {
            write_section(&mut segment, SectionType::Data, &volume.to_bytes_full())?;
        }
        // S01 segments after the first carry nothing between the file
        // header and `table`: there is no per-segment `data` section.

        // Entries are accumulated relative to the start of the chunk blob
        // (offset 0) and shifted to their real, section-relative offsets
        // once that blob's own start is known below - `sectors_start` for
        // the `sectors`-wrapped (E01/Ex01) layout, or the end of `table`
        // itself for S01, which has no wrapper section at all.
        let mut table = OffsetTable::new();
        let mut chunk_blob = Vec::new();

        while chunk_index < total_chunks {
            let start = chunk_index * chunk_size;
            let end = (start + chunk_size).min(data.len());
            let raw = &data[start..end];

            let plan_result = writer::plan_chunk(
                raw,
                plan.variant,
                plan.compression,
                plan.compress_empty_block,
            )?;
            table.push(TableEntry {
                segment: (segment_number - 1) as usize,
                offset: chunk_blob.len() as u64,
                size: plan_result.payload.len() as u64,
                compressed: plan_result.compressed,
            });
            chunk_blob.extend_from_slice(&plan_result.payload);
            chunk_index += 1;

            let projected = segment.offset() as usize
                + chunk_blob.len()
                + writer::reserved_tail_size(table.len(), emit_table2, false) as usize;
            if projected as u64 > plan.segment_target_size && chunk_index < total_chunks {
                break;
            }
        }

        if is_smart {
            // `table` sits directly in front of the chunk blob it
            // describes; its own encoded size doesn't depend on the base
            // offset, so compute that size first to find where the blob
            // (and hence the real base offset) begins.
            let provisional = table.to_payload(0)?;
            let chunk_data_start =
                segment.offset() + SECTION_DESCRIPTOR_SIZE as u64 + provisional.len() as u64;
            let mut shifted = OffsetTable::new();
            for i in 0..table.len() {
                let entry = *table.get(i).unwrap();
                shifted.push(TableEntry {
                    offset: entry.offset + chunk_data_start,
                    ..entry
                });
            }
            let table_payload = shifted.to_payload(chunk_data_start)?;
            // The chunk blob isn't part of `table`'s own payload, but it
            // sits between `table` and whatever section follows, so the
            // descriptor's chain pointer has to skip over it even though
            // its declared size does not include it.
            write_section_with_next(
                &mut segment,
                SectionType::Table,
                &table_payload,
                chunk_data_start + chunk_blob.len() as u64,
            )?;
            segment.write_all(&chunk_blob)?;
        } else {
            let sectors_start = segment.offset() + SECTION_DESCRIPTOR_SIZE as u64;
            write_section(&mut segment, SectionType::Sectors, &chunk_blob)?;

            let mut shifted = OffsetTable::new();
            for i in 0..table.len() {
                let entry = *table.get(i).unwrap();
                shifted.push(TableEntry {
                    offset: entry.offset + sectors_start,
                    ..entry
                });
            }
            let table_payload = shifted.to_payload(sectors_start)?;
            write_section(&mut segment, SectionType::Table, &table_payload)?;
            if emit_table2 {
                write_section(&mut segment, SectionType::Table2, &table_payload)?;
            }
        }

        let is_last = chunk_index >= total_chunks;
        if is_last {
            if !plan.error_ranges.is_empty() {
                let errors = ErrorTable {
                    ranges: plan.error_ranges.clone(),
                };
                write_section(&mut segment, SectionType::Error2, &errors.to_payload())?;
            }
            let mut digest: Box<dyn MessageDigest> = Box::<Md5Digest>::default();
            digest.update(data);
            let mut md5 = [0u8; 16];
            md5.copy_from_slice(&digest.finalize());
            write_section(
                &mut segment,
                SectionType::Hash,
                &HashSection { md5 }.to_payload(),
            )?;
            write_done_or_next(&mut segment, SectionType::Done)?;
        } else {
            write_done_or_next(&mut segment, SectionType::Next)?;
        }

        segment.flush()?;
        written_paths.push(path);
        segment_number += 1;
    }

    Ok(written_paths)
}

fn write_header_sections(segment: &mut SegmentFile, plan: &WritePlan) -> Result<()> {
    let section_plan = plan.variant.sections();
    let needs_aux = plan.variant.needs_srce_sub();
    // Linen's single `header` block carries the srce/sub tables itself;
    // Encase5/6 carry them on `header2` instead (no `header2` for Linen).
    if let Some(encoding) = section_plan.header {
        let aux = needs_aux && section_plan.header2.is_none();
        let text = plan.header.encode_with_aux(encoding, aux);
        let compressed = compression::compress(&text, CompressionLevel::Best)?;
        write_section(segment, SectionType::Header, &compressed)?;
    }
    if let Some(encoding) = section_plan.header2 {
        let text = plan.header.encode_with_aux(encoding, needs_aux);
        let compressed = compression::compress(&text, CompressionLevel::Best)?;
        write_section(segment, SectionType::Header2, &compressed)?;
    }
    if section_plan.xheader {
        let xml = plan.header.encode_xheader();
        let compressed = compression::compress(&xml, CompressionLevel::Best)?;
        write_section(segment, SectionType::XHeader, &compressed)?;
    }
    Ok(())
}

fn write_section(
    segment: &mut SegmentFile,
    section_type: SectionType,
    payload: &[u8],
) -> Result<()> {
    let self_offset = segment.offset();
    let size = SECTION_DESCRIPTOR_SIZE as u64 + payload.len() as u64;
    write_section_with_next(segment, section_type, payload, self_offset + size)
}

/// Like [`write_section`], but for a section followed by bytes that belong
/// to it physically (S01's unwrapped chunk blob) without being part of its
/// own declared payload: `next_offset` must skip past those bytes even
/// though `size` does not count them.
fn write_section_with_next(
    segment: &mut SegmentFile,
    section_type: SectionType,
    payload: &[u8],
    next_offset: u64,
) -> Result<()> {
    let self_offset = segment.offset();
    let size = SECTION_DESCRIPTOR_SIZE as u64 + payload.len() as u64;
    let desc = SectionDescriptor {
        section_type,
        next_offset,
        size,
        self_offset,
    };
    segment.write_all(&desc.to_bytes())?;
    segment.write_all(payload)?;
    Ok(())
}

fn write_done_or_next(segment: &mut SegmentFile, section_type: SectionType) -> Result<()> {
    let self_offset = segment.offset();
    let desc = SectionDescriptor {
        section_type,
        next_offset: self_offset,
        size: SECTION_DESCRIPTOR_SIZE as u64,
        self_offset,
    };
    segment.write_all(&desc.to_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn plan(base: PathBuf, target_size: u64) -> WritePlan {
        let mut header = HeaderValues::new();
        header.set("c", "1");
        header.set("n", "Item-1");
        WritePlan {
            base_path: base,
            variant: FormatVariant::Encase5,
            compression: CompressionLevel::None,
            compress_empty_block: false,
            bytes_per_sector: 512,
            sectors_per_chunk: 1,
            segment_target_size: target_size,
            header,
            error_ranges: vec![],
        }
    }

    #[test]
    fn single_segment_round_trip() {
        let dir = tempdir().unwrap();
        let data = vec![0u8; 512];
        let plan = plan(dir.path().join("foo"), 1 << 20);
        let paths = build_image(&plan, &data).unwrap();
        assert_eq!(paths.len(), 1);

        let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let out = container.read(512, 0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn multi_segment_split_reads_across_boundary() {
        let dir = tempdir().unwrap();
        let mut data = Vec::new();
        for i in 0..10u32 {
            data.extend(std::iter::repeat_n((i % 256) as u8, 512));
        }
        let plan = plan(dir.path().join("foo"), 4096);
        let paths = build_image(&plan, &data).unwrap();
        assert!(
            paths.len() >= 2,
            "expected at least 2 segments, got {}",
            paths.len()
        );

        let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let out = container.read(1024, 3 * 512).unwrap();
        assert_eq!(out, data[3 * 512..3 * 512 + 1024]);
    }

    #[test]
    fn open_by_base_name_globs_segment_set() {
        let dir = tempdir().unwrap();
        let mut data = Vec::new();
        for i in 0..10u32 {
            data.extend(std::iter::repeat_n((i % 256) as u8, 512));
        }
        let base = dir.path().join("foo");
        let plan = plan(base.clone(), 4096);
        let paths = build_image(&plan, &data).unwrap();
        assert!(paths.len() >= 2, "expected at least 2 segments");

        let mut container =
            EwfContainer::open_base_name(&base, &CompressionPolicy::default()).unwrap();
        let out = container.read(1024, 3 * 512).unwrap();
        assert_eq!(out, data[3 * 512..3 * 512 + 1024]);
    }

    #[test]
    fn open_by_base_name_rejects_missing_set() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nope");
        assert!(EwfContainer::open_base_name(&base, &CompressionPolicy::default()).is_err());
    }

    #[test]
    fn header_values_survive_round_trip() {
        let dir = tempdir().unwrap();
        let data = vec![7u8; 512];
        let plan = plan(dir.path().join("foo"), 1 << 20);
        let paths = build_image(&plan, &data).unwrap();

        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        assert_eq!(container.header_values().get("c"), Some("1"));
        assert_eq!(container.header_values().get("n"), Some("Item-1"));
    }

    #[test]
    fn error2_section_round_trips() {
        let dir = tempdir().unwrap();
        let data = vec![1u8; 512];
        let mut plan = plan(dir.path().join("foo"), 1 << 20);
        plan.error_ranges = vec![
            crate::ewf::error2::ErrorRange {
                first_sector: 100,
                sector_count: 8,
            },
            crate::ewf::error2::ErrorRange {
                first_sector: 4096,
                sector_count: 1,
            },
        ];
        let paths = build_image(&plan, &data).unwrap();

        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        assert_eq!(container.errors().ranges.len(), 2);
        assert_eq!(container.errors().ranges[0].first_sector, 100);
        assert_eq!(container.errors().ranges[1].sector_count, 1);
    }

    #[test]
    fn ewfx_variant_writes_and_reopens_with_xheader() {
        let dir = tempdir().unwrap();
        let data = vec![3u8; 512];
        let mut plan = plan(dir.path().join("foo"), 1 << 20);
        plan.variant = FormatVariant::Ewfx;
        let paths = build_image(&plan, &data).unwrap();

        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        assert_eq!(container.header_values().get("c"), Some("1"));
    }

    #[test]
    fn byte_swap_round_trip_undoes_itself() {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        let plan = plan(dir.path().join("foo"), 1 << 20);
        let paths = build_image(&plan, &data).unwrap();

        let mut plain = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let plain_bytes = plain.read(512, 0).unwrap();

        let swapped_policy = CompressionPolicy {
            swap_byte_pairs: true,
            ..CompressionPolicy::default()
        };
        let mut swapped = EwfContainer::open(&paths, &swapped_policy).unwrap();
        let mut swapped_bytes = swapped.read(512, 0).unwrap();
        policy::swap_byte_pairs(&mut swapped_bytes);

        assert_eq!(plain_bytes, swapped_bytes);
    }

    #[test]
    fn crc_error_recovery_returns_zeros_when_wiped() {
        let dir = tempdir().unwrap();
        let data = vec![9u8; 1024]; // two 512-byte chunks
        let plan = plan(dir.path().join("foo"), 1 << 20);
        let paths = build_image(&plan, &data).unwrap();

        // Corrupt the trailing Adler-32 of the second chunk's uncompressed payload.
        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let entry = *container.table.get(1).unwrap();
        drop(container);
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut f = std::fs::OpenOptions::new()
                .write(true)
                .open(&paths[entry.segment])
                .unwrap();
            f.seek(SeekFrom::Start(entry.offset + entry.size - 1))
                .unwrap();
            f.write_all(&[0xFF]).unwrap();
        }

        let policy = CompressionPolicy {
            error_tolerance: ErrorTolerance::Compensate,
            wipe_block_on_read_error: true,
            ..CompressionPolicy::default()
        };
        let mut container = EwfContainer::open(&paths, &policy).unwrap();
        let out = container.read(512, 512).unwrap();
        assert_eq!(out, vec![0u8; 512]);
        assert!(container.crc_error_chunks().contains(&1));
    }

    #[test]
    fn smart_variant_has_no_sectors_section_and_small_volume() {
        let dir = tempdir().unwrap();
        let data = vec![4u8; 512];
        let mut plan = plan(dir.path().join("foo"), 1 << 20);
        plan.variant = FormatVariant::Smart;
        plan.compression = CompressionLevel::Best;
        let paths = build_image(&plan, &data).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].extension().and_then(|e| e.to_str()), Some("s01"));

        // Walk the section chain directly: no `sectors` section should
        // appear between `volume` and `table`.
        let mut segment = SegmentFile::open(&paths[0], OpenFlags::Read).unwrap();
        let mut seen = Vec::new();
        let mut offset = 13u64;
        loop {
            let mut desc_bytes = [0u8; SECTION_DESCRIPTOR_SIZE];
            segment.seek_to(offset).unwrap();
            segment.read_exact(&mut desc_bytes).unwrap();
            let desc = SectionDescriptor::parse(&desc_bytes, offset).unwrap();
            seen.push(desc.section_type.clone());
            if desc.section_type.is_terminal() {
                break;
            }
            offset = desc.next_offset;
        }
        assert!(!seen.contains(&SectionType::Sectors));
        assert!(seen.contains(&SectionType::Table));
        assert!(!seen.contains(&SectionType::Table2));

        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        assert_eq!(container.volume.guid, None);

        let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let out = container.read(512, 0).unwrap();
        assert_eq!(out, data);
    }
}
