//! Project listing.
//!
//! A project is only a tag on [`ImageRecord`]s, so the index is a view over
//! the store's metadata records. It never reads annotation sets.

use std::collections::BTreeSet;
use std::time::SystemTime;

use serde::Serialize;

use crate::error::AnnostoreError;
use crate::model::ImageRecord;
use crate::store::RecordStore;

/// An image record together with its metadata last-write time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexedImage {
    #[serde(flatten)]
    pub record: ImageRecord,
    #[serde(skip)]
    pub modified: SystemTime,
}

/// Read-only listing queries over a [`RecordStore`].
#[derive(Clone, Copy, Debug)]
pub struct ProjectIndex<'a> {
    store: &'a RecordStore,
}

impl<'a> ProjectIndex<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Images in `project`, most recently written metadata first.
    ///
    /// Ties keep ascending id order.
    pub fn list(&self, project: &str) -> Result<Vec<IndexedImage>, AnnostoreError> {
        // `list_images` is id-ordered and `sort_by` is stable.
        let mut items = self
            .store
            .list_images(project)?
            .into_iter()
            .map(|record| {
                let modified = self.store.modified_at(&record.id)?;
                Ok(IndexedImage { record, modified })
            })
            .collect::<Result<Vec<_>, AnnostoreError>>()?;

        items.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(items)
    }

    /// Number of images tagged with `project`.
    pub fn count(&self, project: &str) -> Result<usize, AnnostoreError> {
        Ok(self.store.list_images(project)?.len())
    }

    /// Every distinct project tag, sorted.
    pub fn projects(&self) -> Result<Vec<String>, AnnostoreError> {
        let tags: BTreeSet<String> = self
            .store
            .all_images()?
            .into_iter()
            .map(|r| r.project)
            .collect();
        Ok(tags.into_iter().collect())
    }
}
