//! Annotation records: the validated form kept in the store and the raw
//! payload form accepted from callers.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::bbox::BBox;
use super::ids::{AnnotationId, ImageId};
use super::point::Point;
use crate::geometry;

/// Label given to raw annotations that do not carry one.
pub const DEFAULT_LABEL: &str = "object";

/// The kind of observation an annotation records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// An axis-aligned box; requires `bbox`.
    #[default]
    Bbox,
    /// A closed polygon; requires at least 3 `points`.
    Polygon,
    /// A free-form mask; no geometry field is required.
    Mask,
    /// A text label; requires `text`.
    Text,
}

impl AnnotationKind {
    /// Name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Bbox => "bbox",
            AnnotationKind::Polygon => "polygon",
            AnnotationKind::Mask => "mask",
            AnnotationKind::Text => "text",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in an annotation's `attrs` map.
///
/// Only scalars and (nested) lists of scalars are representable; JSON
/// objects are rejected when a raw payload is validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Interprets the value as an integer where that is unambiguous.
    ///
    /// Booleans map to 0/1, integral floats and numeric strings are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Bool(b) => Some(i64::from(*b)),
            AttrValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts a JSON value, returning `None` for JSON objects (at any depth).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        Some(match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Float(n.as_f64()?),
            },
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Array(items) => AttrValue::List(
                items
                    .iter()
                    .map(AttrValue::from_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(_) => return None,
        })
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

/// A validated annotation attached to one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique within the image's annotation set.
    pub id: AnnotationId,

    /// The image this annotation belongs to.
    pub image_id: ImageId,

    #[serde(rename = "type", alias = "atype")]
    pub kind: AnnotationKind,

    pub label: String,

    /// `[x, y, w, h]`; authoritative for `bbox` annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,

    /// Polygon vertices in insertion order; authoritative for `polygon`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,

    /// Authoritative for `text` annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Annotation {
    fn bare(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        kind: AnnotationKind,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            kind,
            label: label.into(),
            bbox: None,
            points: None,
            text: None,
            attrs: BTreeMap::new(),
        }
    }

    /// Creates a bbox annotation.
    pub fn new_bbox(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        label: impl Into<String>,
        bbox: BBox,
    ) -> Self {
        let mut ann = Self::bare(id, image_id, AnnotationKind::Bbox, label);
        ann.bbox = Some(bbox);
        ann
    }

    /// Creates a polygon annotation without an explicit bbox.
    pub fn new_polygon(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        label: impl Into<String>,
        points: Vec<Point>,
    ) -> Self {
        let mut ann = Self::bare(id, image_id, AnnotationKind::Polygon, label);
        ann.points = Some(points);
        ann
    }

    /// Creates a text annotation.
    pub fn new_text(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut ann = Self::bare(id, image_id, AnnotationKind::Text, label);
        ann.text = Some(text.into());
        ann
    }

    /// Adds an attribute to the annotation.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Sets an explicit bounding box.
    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// The stored bbox, or one inferred from the polygon points.
    pub fn effective_bbox(&self) -> Option<BBox> {
        self.bbox.or_else(|| {
            self.points
                .as_deref()
                .and_then(geometry::bbox_from_points)
        })
    }

    /// The COCO crowd flag from `attrs.iscrowd`, defaulting to 0.
    pub fn iscrowd(&self) -> u8 {
        self.attrs
            .get("iscrowd")
            .and_then(AttrValue::as_i64)
            .map(|v| u8::from(v != 0))
            .unwrap_or(0)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, AttrValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, AttrValue>>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

/// An annotation payload as received from a caller, before validation.
///
/// Shapes are deliberately loose (`Vec` instead of fixed arrays, JSON values
/// in `attrs`) so that validation can point at the offending field instead
/// of failing the whole parse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,

    #[serde(default, rename = "type", alias = "atype")]
    pub kind: AnnotationKind,

    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Vec<f64>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, serde_json::Value>>,
}

impl RawAnnotation {
    fn of_kind(kind: AnnotationKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            ..Default::default()
        }
    }

    /// A bbox payload.
    pub fn bbox(label: impl Into<String>, bbox: [f64; 4]) -> Self {
        let mut raw = Self::of_kind(AnnotationKind::Bbox, label);
        raw.bbox = Some(bbox.to_vec());
        raw
    }

    /// A polygon payload.
    pub fn polygon(label: impl Into<String>, points: &[(f64, f64)]) -> Self {
        let mut raw = Self::of_kind(AnnotationKind::Polygon, label);
        raw.points = Some(points.iter().map(|&(x, y)| vec![x, y]).collect());
        raw
    }

    /// A text payload.
    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        let mut raw = Self::of_kind(AnnotationKind::Text, label);
        raw.text = Some(text.into());
        raw
    }

    /// Sets the annotation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }
}

impl From<&Annotation> for RawAnnotation {
    fn from(ann: &Annotation) -> Self {
        Self {
            id: Some(ann.id.0.clone()),
            image_id: Some(ann.image_id.0.clone()),
            kind: ann.kind,
            label: ann.label.clone(),
            bbox: ann.bbox.map(|b| b.to_array().to_vec()),
            points: ann
                .points
                .as_ref()
                .map(|pts| pts.iter().map(|p| vec![p.x, p.y]).collect()),
            text: ann.text.clone(),
            attrs: if ann.attrs.is_empty() {
                None
            } else {
                Some(
                    ann.attrs
                        .iter()
                        .map(|(k, v)| {
                            (k.clone(), serde_json::to_value(v).unwrap_or_default())
                        })
                        .collect(),
                )
            },
        }
    }
}
