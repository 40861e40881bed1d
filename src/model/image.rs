use serde::{Deserialize, Serialize};

use super::ids::{self, ImageId};

/// Project tag used when a caller does not name one.
pub const DEFAULT_PROJECT: &str = "default";

/// Metadata for one stored image.
///
/// Created on ingestion and never edited afterwards; deletion removes it
/// together with the asset and annotation set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,

    /// Original filename as supplied by the uploader.
    pub filename: String,

    /// Location of the binary asset, e.g. `/storage/<id>.jpg`.
    ///
    /// Empty when the image has no asset (registered by a COCO import).
    #[serde(alias = "url", default)]
    pub storage_url: String,

    /// Grouping tag; not enforced to exist anywhere else.
    #[serde(default = "default_project")]
    pub project: String,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

impl ImageRecord {
    /// Creates a new image record.
    pub fn new(
        id: impl Into<ImageId>,
        filename: impl Into<String>,
        storage_url: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            storage_url: storage_url.into(),
            project: project.into(),
        }
    }

    /// The asset file name: the last `/`-separated segment of `storage_url`.
    ///
    /// `None` when there is no asset or the segment is not a plain file name.
    pub fn asset_name(&self) -> Option<&str> {
        self.storage_url
            .rsplit('/')
            .next()
            .filter(|name| ids::is_path_safe(name))
    }
}
