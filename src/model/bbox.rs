//! Axis-aligned bounding boxes in top-left/size form.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box `[x, y, w, h]` in pixel coordinates.
///
/// `(x, y)` is the top-left corner. This is both the storage format and the
/// COCO format, so no conversion happens on export.
///
/// Note: the constructor does not reject negative sizes. Validation checks
/// that values are finite but geometry against image content is never
/// checked.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    /// Creates a new bounding box from its corner and size.
    #[inline]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Creates a bounding box from opposite corners.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::new(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    /// Returns the right edge (`x + w`).
    #[inline]
    pub fn xmax(&self) -> f64 {
        self.x + self.w
    }

    /// Returns the bottom edge (`y + h`).
    #[inline]
    pub fn ymax(&self) -> f64 {
        self.y + self.h
    }

    /// Returns `w * h`.
    ///
    /// May be negative if the box is malformed.
    #[inline]
    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Returns true if all values are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    /// Returns the box as `[x, y, w, h]`.
    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x, y, w, h]: [f64; 4]) -> Self {
        BBox::new(x, y, w, h)
    }
}

impl Serialize for BBox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <[f64; 4]>::deserialize(deserializer).map(BBox::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_xyxy() {
        let bbox = BBox::from_xyxy(10.0, 20.0, 100.0, 80.0);
        assert_eq!(bbox, BBox::new(10.0, 20.0, 90.0, 60.0));
        assert_eq!(bbox.xmax(), 100.0);
        assert_eq!(bbox.ymax(), 80.0);
    }

    #[test]
    fn test_bbox_area() {
        assert_eq!(BBox::new(10.0, 20.0, 90.0, 60.0).area(), 5400.0);
    }

    #[test]
    fn test_bbox_is_finite() {
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).is_finite());
        assert!(!BBox::new(0.0, f64::NAN, 1.0, 1.0).is_finite());
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let json = serde_json::to_string(&BBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
    }
}
