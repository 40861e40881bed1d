//! Opaque identifiers for images and annotations.
//!
//! Both kinds of id are plain strings on the wire. Freshly generated ids are
//! 128 random bits rendered as 32 lowercase hex characters. Ids read back from
//! storage or a COCO file may be any string, but the store only accepts ids
//! that are safe to use as a single file name (see [`is_path_safe`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a generated token in characters.
pub const TOKEN_LEN: usize = 32;

/// Produces a new opaque token from the thread-local random source.
///
/// This never fails; the collision probability of two 128-bit tokens is
/// negligible.
pub fn new_token() -> String {
    let bits: u128 = rand::random();
    format!("{:032x}", bits)
}

/// True if `id` can name a file inside a store directory: non-empty, no path
/// separators, no `..`, no leading `.` and no NUL.
pub fn is_path_safe(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains("..")
        && !id.contains(['/', '\\', '\0'])
}

/// A unique identifier for an image in the store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Creates an ImageId from an existing string.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ImageId.
    pub fn generate() -> Self {
        Self(new_token())
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// See [`is_path_safe`].
    pub fn is_path_safe(&self) -> bool {
        is_path_safe(&self.0)
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        ImageId::new(id)
    }
}

impl From<String> for ImageId {
    fn from(id: String) -> Self {
        ImageId(id)
    }
}

/// A unique identifier for an annotation within one image's set.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub String);

impl AnnotationId {
    /// Creates an AnnotationId from an existing string.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random AnnotationId.
    pub fn generate() -> Self {
        Self(new_token())
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationId({})", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        AnnotationId::new(id)
    }
}

impl From<String> for AnnotationId {
    fn from(id: String) -> Self {
        AnnotationId(id)
    }
}
