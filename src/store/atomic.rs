//! Replace-on-write file primitives.
//!
//! Every write lands in a temporary file in the destination directory and
//! is renamed over the canonical path only once it is complete and synced.
//! The temporary file is owned by a [`NamedTempFile`] guard, so any early
//! return removes it. A crash before the rename leaves the previous version
//! in place; the stray temporary (`.<random>.tmp`) is never mistaken for a
//! record because readers only look at `*.json` names.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::AnnostoreError;

/// Opens a temporary file next to `path`, on the same filesystem.
pub(crate) fn temp_file_beside(path: &Path) -> Result<NamedTempFile, AnnostoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| AnnostoreError::store_io(dir, source))
}

/// Syncs `tmp` and atomically renames it onto `path`.
pub(crate) fn commit(tmp: NamedTempFile, path: &Path) -> Result<(), AnnostoreError> {
    tmp.as_file()
        .sync_all()
        .map_err(|source| AnnostoreError::store_io(path, source))?;
    tmp.persist(path)
        .map_err(|err| AnnostoreError::store_io(path, err.error))?;
    Ok(())
}

/// Atomically replaces `path` with `bytes`.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), AnnostoreError> {
    let mut tmp = temp_file_beside(path)?;
    tmp.write_all(bytes)
        .map_err(|source| AnnostoreError::store_io(path, source))?;
    commit(tmp, path)
}

/// Atomically replaces `path` with the contents of `reader`.
pub(crate) fn copy_atomic(path: &Path, reader: &mut impl io::Read) -> Result<u64, AnnostoreError> {
    let mut tmp = temp_file_beside(path)?;
    let written =
        io::copy(reader, &mut tmp).map_err(|source| AnnostoreError::store_io(path, source))?;
    commit(tmp, path)?;
    Ok(written)
}

/// Atomically replaces `path` with compact JSON.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AnnostoreError> {
    let bytes = serde_json::to_vec(value).map_err(|source| AnnostoreError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes_atomic(path, &bytes)
}

/// Atomically replaces `path` with indented JSON.
pub(crate) fn write_json_pretty_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AnnostoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| AnnostoreError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes_atomic(path, &bytes)
}

/// Reads JSON from `path`, returning `None` if the file does not exist.
pub(crate) fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AnnostoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(AnnostoreError::store_io(path, source)),
    };

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| AnnostoreError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
}
