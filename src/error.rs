use std::path::PathBuf;
use thiserror::Error;

use crate::store::DeleteReport;
use crate::validation::ValidationReport;

/// The main error type for annostore operations.
#[derive(Debug, Error)]
pub enum AnnostoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Annotation payload failed validation with {issue_count} issue(s)")]
    ValidationFailed {
        issue_count: usize,
        report: ValidationReport,
    },

    #[error("Store I/O error at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse COCO JSON from {path}: {source}")]
    CocoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Empty payload: {0}")]
    EmptyPayload(String),

    #[error("Nothing to export for project '{project}'")]
    NothingToExport { project: String },

    #[error("Image {} was only partially deleted", report.image_id)]
    PartialDelete { report: DeleteReport },

    #[error("Failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read config from {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AnnostoreError {
    pub(crate) fn image_not_found(id: impl ToString) -> Self {
        AnnostoreError::NotFound {
            kind: "image",
            id: id.to_string(),
        }
    }

    pub(crate) fn annotation_not_found(id: impl ToString) -> Self {
        AnnostoreError::NotFound {
            kind: "annotation",
            id: id.to_string(),
        }
    }

    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnnostoreError::StoreIo {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnnostoreError::NotFound { .. })
    }
}
