//! Black-box, whole-pipeline tests covering spec.md §8's concrete
//! scenarios, grounded in `jafreck-lz4r`'s `tests/e2e_*.rs` convention of
//! exercising the public API end to end rather than internal helpers.

use bsdiff_extent::{apply_patch, offtout, Error, MAGIC};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Write;
use tempfile::tempdir;

fn bz(data: &[u8]) -> Vec<u8> {
    let mut enc = BzEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn ctrl_bytes(triples: &[(i64, i64, i64)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (x, y, z) in triples {
        out.extend_from_slice(&offtout(*x));
        out.extend_from_slice(&offtout(*y));
        out.extend_from_slice(&offtout(*z));
    }
    out
}

fn build_patch(ctrl_plain: &[u8], diff_plain: &[u8], extra_plain: &[u8], new_len: i64) -> Vec<u8> {
    let ctrl_bz = bz(ctrl_plain);
    let diff_bz = bz(diff_plain);
    let extra_bz = bz(extra_plain);

    let mut patch = Vec::new();
    patch.extend_from_slice(MAGIC);
    patch.extend_from_slice(&offtout(ctrl_bz.len() as i64));
    patch.extend_from_slice(&offtout(diff_bz.len() as i64));
    patch.extend_from_slice(&offtout(new_len));
    patch.extend_from_slice(&ctrl_bz);
    patch.extend_from_slice(&diff_bz);
    patch.extend_from_slice(&extra_bz);
    patch
}

struct Scratch {
    _dir: tempfile::TempDir,
    old: std::path::PathBuf,
    new: std::path::PathBuf,
    patch: std::path::PathBuf,
}

fn scratch() -> Scratch {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let patch = dir.path().join("patch.bsdiff");
    Scratch {
        _dir: dir,
        old,
        new,
        patch,
    }
}

#[test]
fn s1_identity_patch_round_trips() {
    let s = scratch();
    std::fs::write(&s.old, b"hello").unwrap();

    let ctrl = ctrl_bytes(&[(5, 0, 5)]);
    let patch = build_patch(&ctrl, &[0u8; 5], &[], 5);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, None, None).unwrap();
    assert_eq!(std::fs::read(&s.new).unwrap(), b"hello");
}

#[test]
fn s2_small_additive_patch() {
    let s = scratch();
    std::fs::write(&s.old, [0x10, 0x20, 0x30]).unwrap();

    let ctrl = ctrl_bytes(&[(3, 0, 3)]);
    let patch = build_patch(&ctrl, &[0x01, 0x02, 0x03], &[], 3);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, None, None).unwrap();
    assert_eq!(std::fs::read(&s.new).unwrap(), vec![0x11, 0x22, 0x33]);
}

#[test]
fn s3_extra_only_patch() {
    let s = scratch();
    std::fs::write(&s.old, [0xDEu8, 0xAD, 0xBE, 0xEF]).unwrap();

    let ctrl = ctrl_bytes(&[(0, 4, 0)]);
    let patch = build_patch(&ctrl, &[], b"ABCD", 4);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, None, None).unwrap();
    assert_eq!(std::fs::read(&s.new).unwrap(), b"ABCD");
}

#[test]
fn s4_old_out_of_range_contributes_zero() {
    let s = scratch();
    std::fs::write(&s.old, [0xAAu8]).unwrap();

    let ctrl = ctrl_bytes(&[(3, 0, 0)]);
    let patch = build_patch(&ctrl, &[0x01, 0x02, 0x03], &[], 3);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, None, None).unwrap();
    assert_eq!(std::fs::read(&s.new).unwrap(), vec![0xAB, 0x02, 0x03]);
}

#[test]
fn s5_sparse_extent_reads_zero_through_full_pipeline() {
    let s = scratch();
    // underlying old file holds only the 2 real bytes; the patch's
    // logical old image is 6 bytes: 4 sparse zeros then those 2 bytes.
    std::fs::write(&s.old, [0x77u8, 0x88]).unwrap();

    // additive patch that copies the full 6-byte logical old image
    // through unchanged (diff of all zeros).
    let ctrl = ctrl_bytes(&[(6, 0, 0)]);
    let patch = build_patch(&ctrl, &[0u8; 6], &[], 6);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, Some("-1:4,0:2"), None).unwrap();
    assert_eq!(
        std::fs::read(&s.new).unwrap(),
        vec![0, 0, 0, 0, 0x77, 0x88]
    );
}

#[test]
fn s6_bad_magic_is_corrupt_patch_with_no_output() {
    let s = scratch();
    std::fs::write(&s.old, b"hello").unwrap();

    let ctrl = ctrl_bytes(&[(5, 0, 5)]);
    let mut patch = build_patch(&ctrl, &[0u8; 5], &[], 5);
    patch[0..8].copy_from_slice(b"BSDIFF41");
    std::fs::write(&s.patch, patch).unwrap();

    let result = apply_patch(&s.old, &s.new, &s.patch, None, None);
    assert!(matches!(result, Err(Error::CorruptPatch(_))));
    assert!(!s.new.exists());
}

#[test]
fn negative_header_length_is_rejected() {
    let s = scratch();
    std::fs::write(&s.old, b"hello").unwrap();

    let mut patch = build_patch(&ctrl_bytes(&[(5, 0, 5)]), &[0u8; 5], &[], 5);
    // stomp the ctrl-length field with a negative sign-magnitude value
    patch[8..16].copy_from_slice(&offtout(-1));
    std::fs::write(&s.patch, patch).unwrap();

    let result = apply_patch(&s.old, &s.new, &s.patch, None, None);
    assert!(matches!(result, Err(Error::CorruptPatch(_))));
}

#[test]
fn new_extents_scatter_output_across_a_sparse_layout() {
    let s = scratch();
    std::fs::write(&s.old, b"hello").unwrap();

    let ctrl = ctrl_bytes(&[(5, 0, 5)]);
    let patch = build_patch(&ctrl, &[0u8; 5], &[], 5);
    std::fs::write(&s.patch, patch).unwrap();

    // new logical image "hello" laid out as 2 real bytes, 3 sparse bytes
    // discarded, then nothing else — only the first two bytes of the
    // underlying new file should be touched.
    std::fs::write(&s.new, [0u8; 2]).unwrap();
    apply_patch(&s.old, &s.new, &s.patch, None, Some("0:2,-1:3")).unwrap();
    assert_eq!(std::fs::read(&s.new).unwrap(), b"he");
}

#[test]
fn round_trip_with_multi_triple_control_stream() {
    let s = scratch();
    let old_data = (0u8..20).collect::<Vec<_>>();
    std::fs::write(&s.old, &old_data).unwrap();

    // two control triples: copy+mix the first 5 bytes with a diff,
    // insert 3 literal extra bytes, then mix another 4 bytes after
    // skipping 2 old bytes.
    let ctrl = ctrl_bytes(&[(5, 3, 2), (4, 0, 0)]);
    let diff = vec![1u8, 1, 1, 1, 1, 2, 2, 2, 2];
    let extra = b"XYZ".to_vec();
    let patch = build_patch(&ctrl, &diff, &extra, 12);
    std::fs::write(&s.patch, patch).unwrap();

    apply_patch(&s.old, &s.new, &s.patch, None, None).unwrap();

    let mut expected = Vec::new();
    for i in 0..5u8 {
        expected.push(old_data[i as usize].wrapping_add(1));
    }
    expected.extend_from_slice(b"XYZ");
    // old cursor: after first add (5) -> 5, then seek +2 -> 7
    for i in 0..4u8 {
        expected.push(old_data[7 + i as usize].wrapping_add(2));
    }
    assert_eq!(std::fs::read(&s.new).unwrap(), expected);
}
