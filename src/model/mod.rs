//! Record types held by the store.
//!
//! # Design Principles
//!
//! 1. **Typed ids**: image and annotation ids are distinct newtypes so one
//!    cannot be passed where the other is expected.
//!
//! 2. **Closed payloads**: annotation attributes are a small closed set of
//!    value kinds rather than arbitrary JSON.
//!
//! 3. **Two stages**: callers submit [`RawAnnotation`]s; only validated
//!    [`Annotation`]s reach the store (see [`crate::validation`]).
//!
//! # Example
//!
//! ```
//! use annostore::model::{Annotation, BBox, ImageRecord};
//!
//! let image = ImageRecord::new("img1", "cat.jpg", "/storage/img1.jpg", "default");
//! let ann = Annotation::new_bbox("a1", image.id.clone(), "cat", BBox::new(10.0, 20.0, 30.0, 40.0));
//! assert_eq!(ann.effective_bbox().map(|b| b.area()), Some(1200.0));
//! ```

mod annotation;
mod bbox;
pub mod ids;
mod image;
mod point;

pub use annotation::{Annotation, AnnotationKind, AttrValue, RawAnnotation, DEFAULT_LABEL};
pub use bbox::BBox;
pub use ids::{AnnotationId, ImageId};
pub use image::{ImageRecord, DEFAULT_PROJECT};
pub use point::Point;
