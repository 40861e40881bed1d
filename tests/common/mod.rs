#![allow(dead_code)]

use std::path::Path;

use annostore::config::StoreConfig;
use annostore::store::RecordStore;
use tempfile::TempDir;

/// A fresh store rooted in its own temporary directory.
pub fn temp_store() -> (TempDir, RecordStore) {
    let temp = tempfile::tempdir().expect("create temp dir");
    let store = RecordStore::open(&StoreConfig::new(temp.path().join("data"))).expect("open store");
    (temp, store)
}

/// A minimal PNG header: signature plus an IHDR chunk for `width` x `height`.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    // bit depth, colour type, compression, filter, interlace, CRC
    bytes.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).expect("write fixture file");
}

/// Names of *.tmp files directly under `dir`.
pub fn stray_temps(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}
