use std::fs;

use chrono::{DateTime, Utc};
use dirsnap_codec::{
    CodecError, FORMAT_MARKER, SnapshotReader, decode, encode, read_snapshot_file,
    write_snapshot_file,
};
use dirsnap_core::SnapshotNode;
use dirsnap_scan::{ScanConfig, SnapshotScanner};
use tempfile::TempDir;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Directory `A` with `f1` (100 bytes), `f2` (0 bytes) and `B/f3` (50 bytes).
fn scenario_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f1"), vec![b'x'; 100]).unwrap();
    fs::write(root.join("f2"), b"").unwrap();
    fs::create_dir(root.join("B")).unwrap();
    fs::write(root.join("B/f3"), vec![b'y'; 50]).unwrap();
    temp
}

/// Recompute aggregates from children and compare with the stored ones.
fn assert_recomputed(node: &SnapshotNode) {
    if let Some(children) = node.children() {
        let size: u64 = children.iter().map(SnapshotNode::total_size).sum();
        let files: u64 = children
            .iter()
            .map(|c| if c.is_file() { 1 } else { c.file_count() })
            .sum();
        assert_eq!(node.total_size(), size);
        assert_eq!(node.file_count(), files);
        children.iter().for_each(assert_recomputed);
    }
}

#[test]
fn test_scanned_tree_round_trip() {
    let temp = scenario_dir();
    let tree = SnapshotScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

    let decoded = decode(&encode(&tree.root).unwrap()).unwrap();

    assert_eq!(decoded.total_size(), 150);
    assert_eq!(decoded.file_count(), 3);
    assert_eq!(decoded.find_divergence(&tree.root), None);
    assert_eq!(decoded, tree.root);
    assert_recomputed(&decoded);
}

#[test]
fn test_file_round_trip() {
    let temp = scenario_dir();
    let tree = SnapshotScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

    let out = TempDir::new().unwrap();
    let path = out.path().join("nested/dir/snap.ssf");
    write_snapshot_file(&path, &tree.root).unwrap();

    assert_eq!(fs::read(&path).unwrap()[0], FORMAT_MARKER);
    let restored = read_snapshot_file(&path).unwrap();
    assert_eq!(restored, tree.root);
}

#[test]
fn test_wide_and_large_tree_round_trip() {
    let files: Vec<_> = (0..1_000u64)
        .map(|i| SnapshotNode::file(format!("file-{i:04}"), i * 1_000_003, at(1_600_000_000 + i as i64)))
        .collect();
    let huge = SnapshotNode::file("huge.bin", u64::MAX / 4, at(1_700_000_000));
    let sub = SnapshotNode::directory("sub", at(1_000), vec![huge]);
    let mut children = vec![sub];
    children.extend(files);
    let root = SnapshotNode::directory("root", at(1_800_000_000), children);

    let decoded = decode(&encode(&root).unwrap()).unwrap();

    assert_eq!(decoded.child_count(), 1_001);
    assert_eq!(decoded.modified(), at(1_800_000_000));
    assert_eq!(decoded, root);
    assert_recomputed(&decoded);
}

#[test]
fn test_deep_tree_round_trip() {
    let mut node = SnapshotNode::file("leaf", 7, at(500));
    for depth in 0..2_000 {
        node = SnapshotNode::directory(format!("d{depth}"), at(depth), vec![node]);
    }

    let decoded = decode(&encode(&node).unwrap()).unwrap();
    assert_eq!(decoded.total_size(), 7);
    assert_eq!(decoded.file_count(), 1);
    assert_eq!(decoded.modified(), node.modified());
    assert_eq!(decoded.name(), "d1999");
}

#[test]
fn test_empty_directories_round_trip() {
    let root = SnapshotNode::directory(
        "root",
        at(50),
        vec![
            SnapshotNode::directory("empty-old", at(0), Vec::new()),
            SnapshotNode::directory("empty-new", at(40), Vec::new()),
        ],
    );

    let decoded = decode(&encode(&root).unwrap()).unwrap();
    assert_eq!(decoded, root);
    let children = decoded.children().unwrap();
    assert_eq!(children[0].modified(), at(0));
    assert_eq!(children[1].modified(), at(40));
}

#[test]
fn test_unicode_names_round_trip() {
    let root = SnapshotNode::directory(
        "данные",
        at(1),
        vec![SnapshotNode::file("写真.jpg", 4096, at(1)), SnapshotNode::file("🦀.rs", 12, at(1))],
    );
    assert_eq!(decode(&encode(&root).unwrap()).unwrap(), root);
}

#[test]
fn test_every_truncation_fails() {
    let temp = scenario_dir();
    let tree = SnapshotScanner::new().scan(&ScanConfig::new(temp.path())).unwrap();
    let bytes = encode(&tree.root).unwrap();

    for len in 0..bytes.len() {
        assert!(decode(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
    }
}

#[test]
fn test_read_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = read_snapshot_file(temp.path().join("absent.ssf")).unwrap_err();
    assert!(matches!(err, CodecError::File { .. }));
}

#[test]
fn test_read_file_with_wrong_marker() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("not-a-snapshot.ssf");
    fs::write(&path, b"{\"json\": true}").unwrap();

    assert!(matches!(
        read_snapshot_file(&path),
        Err(CodecError::InvalidMarker { found: b'{', .. })
    ));
}

#[test]
fn test_reader_over_borrowed_stream() {
    let root = SnapshotNode::directory("r", at(9), vec![SnapshotNode::file("a", 1, at(9))]);
    let bytes = encode(&root).unwrap();

    let mut cursor = std::io::Cursor::new(bytes);
    let decoded = SnapshotReader::new(&mut cursor).read().unwrap();
    assert_eq!(decoded, root);
}
