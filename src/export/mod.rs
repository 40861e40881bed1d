//! Portable zip bundles of a project.
//!
//! Layout of an archive:
//!
//! ```text
//! images/<asset name>           one per image whose asset exists
//! annotations/<image id>.json   one per image
//! manifest.json
//! ```
//!
//! Entries are written in image-id order with a fixed timestamp, so the same
//! store state always yields byte-identical archives.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::AnnostoreError;
use crate::model::ImageId;
use crate::store::{atomic, RecordStore};

/// Name of the manifest entry.
pub const MANIFEST_NAME: &str = "manifest.json";

/// `<project>_export.zip`
pub fn default_archive_name(project: &str) -> String {
    format!("{}_export.zip", project)
}

/// Top-level manifest written into every archive.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Manifest {
    pub project: String,
    pub count: usize,
    pub items: Vec<ManifestItem>,
    pub skipped_assets: Vec<ImageId>,
}

/// One image of the bundle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ManifestItem {
    pub image_id: ImageId,
    pub filename: String,
    /// `None` when the asset was missing and left out.
    pub image_path: Option<String>,
    pub annotation_path: String,
}

/// Outcome of [`export_project`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportReport {
    pub archive: PathBuf,
    pub project: String,
    pub included: usize,
    pub skipped_assets: Vec<ImageId>,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} image(s) of project '{}' to {}",
            self.included,
            self.project,
            self.archive.display()
        )?;
        if !self.skipped_assets.is_empty() {
            writeln!(f, "Missing assets ({}):", self.skipped_assets.len())?;
            for id in &self.skipped_assets {
                writeln!(f, "  - {}", id)?;
            }
        }
        Ok(())
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

/// Bundles every image of `project` into a zip archive at `out_path`.
///
/// Images whose asset file is gone still get their annotation entry and are
/// listed in `skipped_assets`. The archive replaces `out_path` atomically.
pub fn export_project(
    store: &RecordStore,
    project: &str,
    out_path: &Path,
) -> Result<ExportReport, AnnostoreError> {
    let records = store.list_images(project)?;
    if records.is_empty() {
        return Err(AnnostoreError::NothingToExport {
            project: project.to_string(),
        });
    }

    let archive_err = |source| AnnostoreError::Archive {
        path: out_path.to_path_buf(),
        source,
    };
    let write_err = |source| AnnostoreError::store_io(out_path, source);

    let tmp = atomic::temp_file_beside(out_path)?;
    let mut zip = ZipWriter::new(tmp);
    let options = entry_options();

    let mut items = Vec::with_capacity(records.len());
    let mut skipped_assets = Vec::new();

    for record in &records {
        let asset = store
            .asset_path(record)
            .filter(|path| path.is_file())
            .zip(record.asset_name());

        let image_path = match asset {
            Some((path, name)) => {
                let entry = format!("images/{}", name);
                let mut file = File::open(&path).map_err(|source| AnnostoreError::store_io(&path, source))?;
                zip.start_file(entry.as_str(), options).map_err(archive_err)?;
                io::copy(&mut file, &mut zip).map_err(write_err)?;
                Some(entry)
            }
            None => {
                warn!(image_id = %record.id, project, "asset missing, exporting annotations only");
                skipped_assets.push(record.id.clone());
                None
            }
        };

        let annotations = store.get_annotations(&record.id)?;
        let annotation_path = format!("annotations/{}.json", record.id);
        let bytes = serde_json::to_vec_pretty(&annotations).map_err(|source| {
            AnnostoreError::JsonWrite {
                path: PathBuf::from(&annotation_path),
                source,
            }
        })?;
        zip.start_file(annotation_path.as_str(), options).map_err(archive_err)?;
        zip.write_all(&bytes).map_err(write_err)?;

        items.push(ManifestItem {
            image_id: record.id.clone(),
            filename: record.filename.clone(),
            image_path,
            annotation_path,
        });
    }

    let manifest = Manifest {
        project: project.to_string(),
        count: items.len(),
        items,
        skipped_assets,
    };
    let bytes = serde_json::to_vec_pretty(&manifest).map_err(|source| AnnostoreError::JsonWrite {
        path: PathBuf::from(MANIFEST_NAME),
        source,
    })?;
    zip.start_file(MANIFEST_NAME, options).map_err(archive_err)?;
    zip.write_all(&bytes).map_err(write_err)?;

    let tmp = zip.finish().map_err(archive_err)?;
    atomic::commit(tmp, out_path)?;

    let report = ExportReport {
        archive: out_path.to_path_buf(),
        project: project.to_string(),
        included: manifest.count,
        skipped_assets: manifest.skipped_assets,
    };
    info!(
        project,
        included = report.included,
        skipped = report.skipped_assets.len(),
        archive = %out_path.display(),
        "exported project bundle"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn test_default_archive_name() {
        assert_eq!(default_archive_name("birds"), "birds_export.zip");
    }

    #[test]
    fn test_empty_project_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(&StoreConfig::new(temp.path().join("data"))).unwrap();
        let out = temp.path().join("out.zip");

        let err = export_project(&store, "nothing", &out).unwrap_err();
        assert!(matches!(err, AnnostoreError::NothingToExport { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_report_display_lists_missing_assets() {
        let report = ExportReport {
            archive: PathBuf::from("p_export.zip"),
            project: "p".into(),
            included: 2,
            skipped_assets: vec![ImageId::new("abc")],
        };
        let text = report.to_string();
        assert!(text.contains("Exported 2 image(s) of project 'p'"));
        assert!(text.contains("  - abc"));
    }

    #[test]
    fn test_manifest_serializes_null_image_path() {
        let item = ManifestItem {
            image_id: ImageId::new("a"),
            filename: "a.jpg".into(),
            image_path: None,
            annotation_path: "annotations/a.json".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["image_path"].is_null());
        assert_eq!(json["image_id"], "a");
    }
}
