//! The durable record store.
//!
//! Layout under the configured roots (see [`StoreConfig`]):
//!
//! ```text
//! storage/<image-id><ext>       binary asset
//! metadata/<image-id>.json      ImageRecord
//! annotations/<image-id>.json   annotation set, in write order
//! ```
//!
//! Every JSON write is an atomic full replace (see [`atomic`]). Each image is
//! an independent unit: operations on different ids never contend, and the
//! store takes no locks. Two writers racing on the same image's annotation
//! set resolve as last-writer-wins.

pub(crate) mod atomic;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::AnnostoreError;
use crate::model::{Annotation, AnnotationId, ImageId, ImageRecord, RawAnnotation};
use crate::validation;

/// Logical URL prefix recorded in [`ImageRecord::storage_url`].
pub const STORAGE_URL_PREFIX: &str = "/storage/";

/// Extension used when an uploaded filename has none.
pub const DEFAULT_ASSET_EXT: &str = ".jpg";

/// Handle to a store rooted at a set of directories.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone, Debug)]
pub struct RecordStore {
    assets_dir: PathBuf,
    metadata_dir: PathBuf,
    annotations_dir: PathBuf,
}

impl RecordStore {
    /// Opens a store, creating its directories if needed.
    pub fn open(config: &StoreConfig) -> Result<Self, AnnostoreError> {
        let store = Self {
            assets_dir: config.assets_dir(),
            metadata_dir: config.metadata_dir(),
            annotations_dir: config.annotations_dir(),
        };
        for dir in [&store.assets_dir, &store.metadata_dir, &store.annotations_dir] {
            fs::create_dir_all(dir).map_err(|source| AnnostoreError::store_io(dir, source))?;
        }
        debug!(metadata = %store.metadata_dir.display(), "opened record store");
        Ok(store)
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    // Every record path goes through these two, so an id that is not a plain
    // file name never reaches the filesystem.
    fn metadata_path(&self, id: &ImageId) -> Result<PathBuf, AnnostoreError> {
        validation::ensure_path_safe(id)?;
        Ok(self.metadata_dir.join(format!("{}.json", id)))
    }

    fn annotations_path(&self, id: &ImageId) -> Result<PathBuf, AnnostoreError> {
        validation::ensure_path_safe(id)?;
        Ok(self.annotations_dir.join(format!("{}.json", id)))
    }

    /// Where the asset for `record` lives, if it has one.
    pub fn asset_path(&self, record: &ImageRecord) -> Option<PathBuf> {
        record.asset_name().map(|name| self.assets_dir.join(name))
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Writes metadata for a new or existing image id.
    pub fn put_image(&self, record: &ImageRecord) -> Result<(), AnnostoreError> {
        let path = self.metadata_path(&record.id)?;
        atomic::write_json_atomic(&path, record)?;
        debug!(image_id = %record.id, project = %record.project, "wrote image metadata");
        Ok(())
    }

    /// Loads the metadata for `id`.
    pub fn get_image(&self, id: &ImageId) -> Result<ImageRecord, AnnostoreError> {
        atomic::read_json_opt(&self.metadata_path(id)?)?
            .ok_or_else(|| AnnostoreError::image_not_found(id))
    }

    /// Returns true if metadata exists for `id`.
    pub fn contains_image(&self, id: &ImageId) -> bool {
        self.metadata_path(id).is_ok_and(|path| path.is_file())
    }

    /// The last-write time of the image's metadata record.
    pub fn modified_at(&self, id: &ImageId) -> Result<SystemTime, AnnostoreError> {
        let path = self.metadata_path(id)?;
        let meta = fs::metadata(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AnnostoreError::image_not_found(id)
            } else {
                AnnostoreError::store_io(&path, source)
            }
        })?;
        meta.modified()
            .map_err(|source| AnnostoreError::store_io(&path, source))
    }

    /// Every image record in the store, ordered by id.
    pub fn all_images(&self) -> Result<Vec<ImageRecord>, AnnostoreError> {
        let entries = fs::read_dir(&self.metadata_dir)
            .map_err(|source| AnnostoreError::store_io(&self.metadata_dir, source))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AnnostoreError::store_io(&self.metadata_dir, source))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Deleted between read_dir and open.
            if let Some(record) = atomic::read_json_opt::<ImageRecord>(&path)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Image records whose project tag equals `project`.
    pub fn list_images(&self, project: &str) -> Result<Vec<ImageRecord>, AnnostoreError> {
        Ok(self
            .all_images()?
            .into_iter()
            .filter(|r| r.project == project)
            .collect())
    }

    /// Removes an image's asset, annotation set and metadata.
    ///
    /// Every part is attempted. If any part fails the error carries the
    /// full [`DeleteReport`], so the caller can see what was removed.
    pub fn delete_image(&self, id: &ImageId) -> Result<DeleteReport, AnnostoreError> {
        let record = self.get_image(id)?;

        // Metadata goes last so a partial failure leaves the image addressable
        // for a retry.
        let asset = match self.asset_path(&record) {
            Some(path) => remove_part(&path),
            None => PartOutcome::Absent,
        };
        let annotations = remove_part(&self.annotations_path(id)?);
        let metadata = remove_part(&self.metadata_path(id)?);

        let report = DeleteReport {
            image_id: id.clone(),
            asset,
            annotations,
            metadata,
        };

        if report.is_complete() {
            debug!(image_id = %id, "deleted image");
            Ok(report)
        } else {
            warn!(image_id = %id, ?report, "image only partially deleted");
            Err(AnnostoreError::PartialDelete { report })
        }
    }

    // ------------------------------------------------------------------
    // Asset ingestion
    // ------------------------------------------------------------------

    /// Stores a new image: asset bytes, metadata and an empty annotation set.
    ///
    /// The id is freshly generated. The asset is named `<id><ext>` where
    /// `ext` is the lower-cased extension of `filename` (`.jpg` if none).
    pub fn ingest_image(
        &self,
        filename: &str,
        project: &str,
        mut reader: impl Read,
    ) -> Result<ImageRecord, AnnostoreError> {
        let id = ImageId::generate();
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_else(|| DEFAULT_ASSET_EXT.to_string());
        let asset_name = format!("{}{}", id, ext);

        let bytes = atomic::copy_atomic(&self.assets_dir.join(&asset_name), &mut reader)?;

        let record = ImageRecord::new(
            id,
            filename,
            format!("{}{}", STORAGE_URL_PREFIX, asset_name),
            project,
        );
        self.put_image(&record)?;
        atomic::write_json_atomic(&self.annotations_path(&record.id)?, &[] as &[Annotation])?;

        debug!(image_id = %record.id, bytes, filename, "ingested image");
        Ok(record)
    }

    /// Ingests image files from disk in order. An empty list is rejected.
    pub fn ingest_files(
        &self,
        paths: &[PathBuf],
        project: &str,
    ) -> Result<Vec<ImageRecord>, AnnostoreError> {
        if paths.is_empty() {
            return Err(AnnostoreError::EmptyPayload("no files to ingest".into()));
        }

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let file = File::open(path).map_err(|source| AnnostoreError::store_io(path, source))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            records.push(self.ingest_image(&filename, project, file)?);
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Annotation sets
    // ------------------------------------------------------------------

    /// The image's annotations in the order of the last write.
    ///
    /// Returns `[]` if nothing has been recorded yet and `NotFound` if the
    /// image itself is unknown.
    pub fn get_annotations(&self, image_id: &ImageId) -> Result<Vec<Annotation>, AnnostoreError> {
        self.ensure_image(image_id)?;
        Ok(atomic::read_json_opt(&self.annotations_path(image_id)?)?.unwrap_or_default())
    }

    /// Validates `raws` and atomically replaces the image's whole set.
    ///
    /// Returns the stored records (with assigned ids). Nothing is written if
    /// validation fails.
    pub fn put_annotations(
        &self,
        image_id: &ImageId,
        raws: Vec<RawAnnotation>,
    ) -> Result<Vec<Annotation>, AnnostoreError> {
        self.ensure_image(image_id)?;
        let annotations = validation::validate_annotations(image_id, raws)?;
        self.write_annotations(image_id, &annotations)?;
        Ok(annotations)
    }

    /// Atomically replaces the set with records that are already validated.
    pub fn put_validated_annotations(
        &self,
        image_id: &ImageId,
        annotations: &[Annotation],
    ) -> Result<(), AnnostoreError> {
        self.ensure_image(image_id)?;
        self.write_annotations(image_id, annotations)
    }

    /// Removes one annotation and rewrites the reduced set.
    pub fn delete_annotation(
        &self,
        image_id: &ImageId,
        annotation_id: &AnnotationId,
    ) -> Result<(), AnnostoreError> {
        let mut annotations = self.get_annotations(image_id)?;
        let before = annotations.len();
        annotations.retain(|a| &a.id != annotation_id);
        if annotations.len() == before {
            return Err(AnnostoreError::annotation_not_found(annotation_id));
        }
        self.write_annotations(image_id, &annotations)
    }

    fn write_annotations(
        &self,
        image_id: &ImageId,
        annotations: &[Annotation],
    ) -> Result<(), AnnostoreError> {
        atomic::write_json_atomic(&self.annotations_path(image_id)?, annotations)?;
        debug!(image_id = %image_id, count = annotations.len(), "replaced annotation set");
        Ok(())
    }

    fn ensure_image(&self, id: &ImageId) -> Result<(), AnnostoreError> {
        if self.contains_image(id) {
            Ok(())
        } else {
            Err(AnnostoreError::image_not_found(id))
        }
    }
}

/// What happened to one sub-resource during [`RecordStore::delete_image`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum PartOutcome {
    /// The file existed and was removed.
    Removed,
    /// There was nothing to remove.
    Absent,
    /// Removal failed; the file may still be present.
    Failed(String),
}

impl PartOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PartOutcome::Failed(_))
    }
}

fn remove_part(path: &Path) -> PartOutcome {
    match fs::remove_file(path) {
        Ok(()) => PartOutcome::Removed,
        Err(err) if err.kind() == io::ErrorKind::NotFound => PartOutcome::Absent,
        Err(err) => PartOutcome::Failed(format!("{}: {}", path.display(), err)),
    }
}

/// Per-part outcome of deleting an image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub image_id: ImageId,
    pub asset: PartOutcome,
    pub annotations: PartOutcome,
    pub metadata: PartOutcome,
}

impl DeleteReport {
    /// True when no part failed.
    pub fn is_complete(&self) -> bool {
        !(self.asset.is_failed() || self.annotations.is_failed() || self.metadata.is_failed())
    }
}
