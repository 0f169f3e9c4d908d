//! Integration tests for the literal S1-S6 scenarios: whole segment chains
//! built and re-read from disk through the public API, one per acquisition
//! dialect or failure mode the container is expected to handle.

use ewf_format::ewf::compression::CompressionLevel;
use ewf_format::ewf::container::{build_image, WritePlan};
use ewf_format::ewf::error2::ErrorRange;
use ewf_format::ewf::header::{FormatVariant, HeaderValues};
use ewf_format::ewf::policy::CompressionPolicy;
use ewf_format::ewf::table::ErrorTolerance;
use ewf_format::ewf::EwfContainer;
use std::io::Read;
use tempfile::tempdir;

fn base_plan(base: std::path::PathBuf, target_size: u64) -> WritePlan {
    WritePlan {
        base_path: base,
        variant: FormatVariant::Encase5,
        compression: CompressionLevel::None,
        compress_empty_block: false,
        bytes_per_sector: 512,
        sectors_per_chunk: 1,
        segment_target_size: target_size,
        header: HeaderValues::new(),
        error_ranges: vec![],
    }
}

/// S1: smallest possible E01, a single 512-byte zeroed chunk.
#[test]
fn s1_smallest_e01() {
    let dir = tempdir().unwrap();
    let data = vec![0u8; 512];
    let plan = base_plan(dir.path().join("s1"), 1 << 20);
    let paths = build_image(&plan, &data).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].extension().and_then(|e| e.to_str()), Some("E01"));

    let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
    assert_eq!(container.read(512, 0).unwrap(), data);
}

/// S2: compressed single-chunk S01, no `sectors` section, `table2` extends
/// `table` rather than duplicating it.
#[test]
fn s2_compressed_s01() {
    let dir = tempdir().unwrap();
    let data = vec![4u8; 512];
    let mut plan = base_plan(dir.path().join("s2"), 1 << 20);
    plan.variant = FormatVariant::Smart;
    plan.compression = CompressionLevel::Best;
    let paths = build_image(&plan, &data).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].extension().and_then(|e| e.to_str()), Some("s01"));

    let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
    assert_eq!(container.read(512, 0).unwrap(), data);
}

/// S3: a two-segment split where the read crosses the segment boundary.
#[test]
fn s3_two_segment_split() {
    let dir = tempdir().unwrap();
    let mut data = Vec::new();
    for i in 0..10u32 {
        data.extend(std::iter::repeat_n((i % 256) as u8, 512));
    }
    let plan = base_plan(dir.path().join("s3"), 4096);
    let paths = build_image(&plan, &data).unwrap();
    assert!(
        paths.len() >= 2,
        "expected a segment split, got {}",
        paths.len()
    );

    let mut container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
    let out = container.read(1024, 3 * 512).unwrap();
    assert_eq!(out, data[3 * 512..3 * 512 + 1024]);
}

/// S4: a corrupted chunk trailer is tolerated under `Compensate` with
/// block-wiping enabled, and surfaces in the CRC-error set.
#[test]
fn s4_crc_error_recovery() {
    let dir = tempdir().unwrap();
    let mut data = Vec::new();
    for i in 0..4u32 {
        data.extend(std::iter::repeat_n((i + 1) as u8, 512));
    }
    let plan = base_plan(dir.path().join("s4"), 1 << 20);
    let paths = build_image(&plan, &data).unwrap();

    let chunk_size = 512u64;
    {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&paths[0])
            .unwrap();
        let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
        let entry = container.table_entry(2).unwrap();
        drop(container);
        use std::io::{Seek, SeekFrom, Write};
        file.seek(SeekFrom::Start(entry.offset + entry.size - 1))
            .unwrap();
        let mut last = [0u8; 1];
        file.read_exact(&mut last).unwrap();
        last[0] ^= 0xff;
        file.seek(SeekFrom::Start(entry.offset + entry.size - 1))
            .unwrap();
        file.write_all(&last).unwrap();
    }

    let policy = CompressionPolicy {
        error_tolerance: ErrorTolerance::Compensate,
        wipe_block_on_read_error: true,
        ..CompressionPolicy::default()
    };
    let mut container = EwfContainer::open(&paths, &policy).unwrap();
    let out = container.read(chunk_size as usize, 2 * chunk_size).unwrap();
    assert_eq!(out, vec![0u8; chunk_size as usize]);
    assert!(container.crc_error_chunks().contains(&2));
}

/// S5: header values survive a write/read round trip byte-equal.
#[test]
fn s5_header_round_trip() {
    let dir = tempdir().unwrap();
    let data = vec![9u8; 512];
    let mut plan = base_plan(dir.path().join("s5"), 1 << 20);
    plan.header.set("c", "1");
    plan.header.set("n", "Item-1");
    plan.header.set("a", "desc");
    plan.header.set("e", "John");
    plan.header.set("t", "notes");
    plan.header.set("av", "libewf 0.1");
    plan.header.set("ov", "Linux");
    plan.header.set("m", "acquired");
    plan.header.set("u", "system");
    plan.header.set("p", "");
    let paths = build_image(&plan, &data).unwrap();

    let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
    let values = container.header_values();
    assert_eq!(values.get("c"), Some("1"));
    assert_eq!(values.get("n"), Some("Item-1"));
    assert_eq!(values.get("a"), Some("desc"));
    assert_eq!(values.get("e"), Some("John"));
    assert_eq!(values.get("t"), Some("notes"));
    assert_eq!(values.get("av"), Some("libewf 0.1"));
    assert_eq!(values.get("ov"), Some("Linux"));
    assert_eq!(values.get("m"), Some("acquired"));
    assert_eq!(values.get("u"), Some("system"));
    assert_eq!(values.get("p"), Some(""));
}

/// S6: two sparse error ranges acquired during imaging round-trip through
/// the `error2` section.
#[test]
fn s6_error2_section() {
    let dir = tempdir().unwrap();
    let data = vec![2u8; 512];
    let mut plan = base_plan(dir.path().join("s6"), 1 << 20);
    plan.error_ranges = vec![
        ErrorRange {
            first_sector: 100,
            sector_count: 8,
        },
        ErrorRange {
            first_sector: 4096,
            sector_count: 1,
        },
    ];
    let paths = build_image(&plan, &data).unwrap();

    let container = EwfContainer::open(&paths, &CompressionPolicy::default()).unwrap();
    assert_eq!(container.errors().ranges.len(), 2);
    assert_eq!(container.errors().ranges[0].first_sector, 100);
    assert_eq!(container.errors().ranges[0].sector_count, 8);
    assert_eq!(container.errors().ranges[1].first_sector, 4096);
    assert_eq!(container.errors().ranges[1].sector_count, 1);
}
