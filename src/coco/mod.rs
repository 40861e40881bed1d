//! COCO JSON interchange.
//!
//! Bidirectional conversion between the store's annotation sets and the
//! COCO `{categories, images, annotations}` document.
//!
//! # Internal -> COCO
//!
//! - Images of the project are emitted in id order.
//! - Categories are the sorted unique labels of those images' annotations,
//!   numbered from 1.
//! - Annotations are numbered from 1 in enumeration order. Polygons carry a
//!   single segmentation ring, their shoelace area, and an explicit or
//!   inferred bbox. Boxes carry an empty segmentation and `w * h` area.
//!
//! # COCO -> internal
//!
//! - A non-empty segmentation becomes a polygon built from the first ring;
//!   anything else becomes a box.
//! - The label is the name of the referenced category. Only when the
//!   document has no category with that id does the stringified
//!   `category_id` become the label. Using the name keeps labels intact
//!   across an export/import round-trip, since export numbers categories
//!   1..n rather than carrying the labels as ids.
//! - Records are grouped by image and each image's set is replaced once.
//!
//! # Deterministic Output
//!
//! The same store state always produces the same document.

mod report;

pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnnostoreError;
use crate::geometry;
use crate::model::{
    Annotation, AnnotationKind, AttrValue, BBox, ImageId, ImageRecord, RawAnnotation,
};
use crate::store::{atomic, RecordStore};
use crate::validation;

// ============================================================================
// COCO Schema Types
// ============================================================================

/// A COCO id: integer in most files, a string for ids written by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CocoId {
    Int(u64),
    Str(String),
}

impl fmt::Display for CocoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CocoId::Int(id) => write!(f, "{}", id),
            CocoId::Str(id) => f.write_str(id),
        }
    }
}

/// Top-level COCO document.
///
/// `info` and `licenses` are carried opaquely; they are written on export
/// and ignored on import.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<serde_json::Value>,

    #[serde(default)]
    pub categories: Vec<CocoCategory>,

    #[serde(default)]
    pub images: Vec<CocoImage>,

    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
}

/// COCO category entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: CocoId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// COCO image entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: CocoId,

    #[serde(default)]
    pub file_name: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,
}

/// COCO annotation entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CocoId>,

    pub image_id: CocoId,

    pub category_id: CocoId,

    /// `[x, y, width, height]` with `(x, y)` the top-left corner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    /// Polygon rings (`[[x0, y0, x1, y1, ...], ...]`) or an RLE object.
    #[serde(default)]
    pub segmentation: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    /// Crowd flag. Integers, booleans and numeric strings are accepted on
    /// read, like `attrs.iscrowd` on the store side.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub iscrowd: u8,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    AttrValue::from_json(&value)
        .and_then(|v| v.as_i64())
        .map(|v| u8::from(v != 0))
        .ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid iscrowd {}, expected an integer, boolean or numeric string",
                value
            ))
        })
}

// ============================================================================
// File and string entry points
// ============================================================================

/// Reads a COCO document from a JSON file.
pub fn read_coco_json(path: &Path) -> Result<CocoDocument, AnnostoreError> {
    let file = File::open(path).map_err(|source| AnnostoreError::store_io(path, source))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        AnnostoreError::CocoJsonParse {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Writes a COCO document as indented JSON, replacing `path` atomically.
pub fn write_coco_json(path: &Path, doc: &CocoDocument) -> Result<(), AnnostoreError> {
    atomic::write_json_pretty_atomic(path, doc)
}

/// Parses a COCO document from a string.
pub fn from_coco_str(json: &str) -> Result<CocoDocument, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parses a COCO document from raw bytes.
pub fn from_coco_slice(bytes: &[u8]) -> Result<CocoDocument, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Renders a COCO document as indented JSON.
pub fn to_coco_string(doc: &CocoDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(doc)
}

// ============================================================================
// Conversion: store -> COCO
// ============================================================================

/// Builds the COCO view of every image tagged with `project`.
pub fn export_project(
    store: &RecordStore,
    project: &str,
) -> Result<(CocoDocument, ConversionReport), AnnostoreError> {
    let records = store.list_images(project)?;
    let mut sets = Vec::with_capacity(records.len());
    for record in records {
        let annotations = store.get_annotations(&record.id)?;
        sets.push((record, annotations));
    }

    let dims = |record: &ImageRecord| {
        store
            .asset_path(record)
            .and_then(|path| imagesize::size(path).ok())
            .map(|size| (size.width as u32, size.height as u32))
    };
    let (doc, report) = build_document(project, &sets, dims);

    info!(
        project,
        images = doc.images.len(),
        annotations = doc.annotations.len(),
        "exported project to COCO"
    );
    Ok((doc, report))
}

/// Converts image records and their annotation sets into a COCO document.
///
/// `dims` supplies image dimensions; `None` is written as 0x0.
pub fn build_document(
    project: &str,
    sets: &[(ImageRecord, Vec<Annotation>)],
    dims: impl Fn(&ImageRecord) -> Option<(u32, u32)>,
) -> (CocoDocument, ConversionReport) {
    let mut report = ConversionReport::new("store", "coco");

    let mut sorted: Vec<&(ImageRecord, Vec<Annotation>)> = sets.iter().collect();
    sorted.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let labels: BTreeSet<&str> = sorted
        .iter()
        .flat_map(|(_, anns)| anns.iter().map(|a| a.label.as_str()))
        .collect();
    let category_ids: BTreeMap<&str, u64> = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (*label, idx as u64 + 1))
        .collect();
    let categories: Vec<CocoCategory> = category_ids
        .iter()
        .map(|(label, id)| CocoCategory {
            id: CocoId::Int(*id),
            name: label.to_string(),
            supercategory: None,
        })
        .collect();

    let mut images = Vec::with_capacity(sorted.len());
    let mut annotations = Vec::new();
    let mut unknown_dims = 0usize;
    let mut skipped_text = 0usize;
    let mut skipped_empty = 0usize;
    let mut masks = 0usize;
    let mut input_annotations = 0usize;

    for (record, anns) in &sorted {
        let (width, height) = dims(record).unwrap_or_else(|| {
            unknown_dims += 1;
            (0, 0)
        });
        images.push(CocoImage {
            id: CocoId::Str(record.id.to_string()),
            file_name: record.filename.clone(),
            width,
            height,
        });

        for ann in anns {
            input_annotations += 1;
            let Some((segmentation, area, bbox)) = coco_geometry(ann) else {
                if ann.kind == AnnotationKind::Text {
                    skipped_text += 1;
                } else {
                    skipped_empty += 1;
                }
                continue;
            };
            if ann.kind == AnnotationKind::Mask {
                masks += 1;
            }

            annotations.push(CocoAnnotation {
                id: Some(CocoId::Int(annotations.len() as u64 + 1)),
                image_id: CocoId::Str(record.id.to_string()),
                category_id: CocoId::Int(category_ids[ann.label.as_str()]),
                bbox: Some(bbox.to_array().to_vec()),
                segmentation: serde_json::json!(segmentation),
                area: Some(area),
                iscrowd: ann.iscrowd(),
            });
        }
    }

    if skipped_text > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::SkipTextAnnotation,
            format!("{} text annotation(s) have no COCO geometry and were skipped", skipped_text),
        ));
    }
    if skipped_empty > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::SkipAnnotationWithoutGeometry,
            format!("{} annotation(s) without points or bbox were skipped", skipped_empty),
        ));
    }
    if masks > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::MaskExportedAsGeometry,
            format!("{} mask annotation(s) written as polygon/bbox; they re-import as such", masks),
        ));
    }
    if unknown_dims > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::UnknownImageDimensions,
            format!("{} image(s) without a readable asset written with width/height 0", unknown_dims),
        ));
    }
    if !annotations.is_empty() {
        report.add(ConversionIssue::info(
            ConversionIssueCode::SequentialAnnotationIds,
            "COCO annotation ids are assigned 1..n in image-id order",
        ));
    }

    report.input = ConversionCounts {
        images: sorted.len(),
        categories: categories.len(),
        annotations: input_annotations,
    };
    report.output = ConversionCounts {
        images: images.len(),
        categories: categories.len(),
        annotations: annotations.len(),
    };

    let doc = CocoDocument {
        info: Some(serde_json::json!({ "description": project })),
        licenses: Vec::new(),
        categories,
        images,
        annotations,
    };
    (doc, report)
}

/// `(segmentation rings, area, bbox)` for an annotation, or `None` when it
/// has no COCO geometry.
fn coco_geometry(ann: &Annotation) -> Option<(Vec<Vec<f64>>, f64, BBox)> {
    let as_box = |bbox: BBox| (Vec::new(), bbox.area(), bbox);
    match ann.kind {
        AnnotationKind::Text => None,
        AnnotationKind::Bbox => ann.effective_bbox().map(as_box),
        AnnotationKind::Polygon | AnnotationKind::Mask => {
            match ann.points.as_deref().filter(|pts| !pts.is_empty()) {
                Some(points) => Some((
                    vec![geometry::flatten(points)],
                    geometry::polygon_area(points),
                    ann.effective_bbox()?,
                )),
                None => ann.bbox.map(as_box),
            }
        }
    }
}

// ============================================================================
// Conversion: COCO -> store
// ============================================================================

/// Outcome of [`import_document`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    /// Images whose annotation sets were replaced, in first-appearance order.
    pub images_written: Vec<ImageId>,
    /// Images that did not exist and were registered without an asset.
    pub registered: Vec<ImageId>,
    pub conversion: ConversionReport,
}

/// Shape of a COCO `segmentation` value.
enum Segmentation {
    Empty,
    Rings(Vec<f64>, usize),
    Rle,
}

fn classify_segmentation(value: &serde_json::Value) -> Segmentation {
    use serde_json::Value;

    let coords = |items: &[Value]| -> Vec<f64> {
        items
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    };

    match value {
        Value::Array(items) if items.is_empty() => Segmentation::Empty,
        Value::Array(items) => match &items[0] {
            Value::Array(ring) => Segmentation::Rings(coords(ring), items.len()),
            // A bare flat ring without the outer list.
            _ => Segmentation::Rings(coords(items), 1),
        },
        Value::Object(_) => Segmentation::Rle,
        _ => Segmentation::Empty,
    }
}

/// Converts one COCO annotation into a raw payload for validation.
fn coco_to_raw(
    ann: &CocoAnnotation,
    label: String,
    rle: &mut usize,
    extra_rings: &mut usize,
) -> RawAnnotation {
    let mut raw = RawAnnotation {
        id: ann.id.as_ref().map(CocoId::to_string),
        label,
        bbox: ann.bbox.clone(),
        ..Default::default()
    };

    match classify_segmentation(&ann.segmentation) {
        Segmentation::Rings(flat, rings) if !flat.is_empty() => {
            if rings > 1 {
                *extra_rings += 1;
            }
            raw.kind = AnnotationKind::Polygon;
            raw.points = Some(flat.chunks(2).map(<[f64]>::to_vec).collect());
        }
        Segmentation::Rle => {
            *rle += 1;
            raw.kind = AnnotationKind::Bbox;
        }
        _ => raw.kind = AnnotationKind::Bbox,
    }

    raw.with_attr("iscrowd", serde_json::json!(ann.iscrowd))
}

/// Writes the annotations of a COCO document into the store.
///
/// Every image's records are validated before anything is written. Images
/// the store does not know yet are registered under `project` without an
/// asset.
pub fn import_document(
    store: &RecordStore,
    doc: CocoDocument,
    project: &str,
) -> Result<ImportReport, AnnostoreError> {
    if doc.annotations.is_empty() {
        return Err(AnnostoreError::EmptyPayload(
            "COCO document has no annotations".into(),
        ));
    }

    let mut conversion = ConversionReport::new("coco", "store");
    conversion.input = ConversionCounts {
        images: doc.images.len(),
        categories: doc.categories.len(),
        annotations: doc.annotations.len(),
    };

    let category_names: HashMap<String, &str> = doc
        .categories
        .iter()
        .map(|c| (c.id.to_string(), c.name.as_str()))
        .collect();
    let file_names: HashMap<String, &str> = doc
        .images
        .iter()
        .map(|img| (img.id.to_string(), img.file_name.as_str()))
        .collect();

    // Group in first-appearance order.
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(ImageId, Vec<RawAnnotation>)> = Vec::new();
    let mut unnamed_categories = BTreeSet::new();
    let (mut rle, mut extra_rings) = (0usize, 0usize);

    for ann in &doc.annotations {
        let category_key = ann.category_id.to_string();
        let label = match category_names.get(&category_key) {
            Some(name) => name.to_string(),
            None => {
                unnamed_categories.insert(category_key.clone());
                category_key
            }
        };
        let raw = coco_to_raw(ann, label, &mut rle, &mut extra_rings);

        let image_key = ann.image_id.to_string();
        let slot = *group_index.entry(image_key.clone()).or_insert_with(|| {
            groups.push((ImageId::new(image_key), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(raw);
    }

    let mut validated = Vec::with_capacity(groups.len());
    for (image_id, raws) in groups {
        let annotations = validation::validate_annotations(&image_id, raws)?;
        validated.push((image_id, annotations));
    }

    // Images listed in the document plus any referenced only by annotations.
    // Listed ids are checked up front so a bad one fails before any write.
    let listed: Vec<ImageId> = doc
        .images
        .iter()
        .map(|img| ImageId::new(img.id.to_string()))
        .collect();
    for image_id in &listed {
        validation::ensure_path_safe(image_id)?;
    }
    let mut registered = Vec::new();
    let referenced = validated.iter().map(|(id, _)| id.clone());
    let mut seen = BTreeSet::new();
    for image_id in listed.into_iter().chain(referenced) {
        if !seen.insert(image_id.clone()) || store.contains_image(&image_id) {
            continue;
        }
        let filename = file_names
            .get(image_id.as_str())
            .copied()
            .filter(|name| !name.is_empty())
            .unwrap_or(image_id.as_str())
            .to_string();
        store.put_image(&ImageRecord::new(image_id.clone(), filename, "", project))?;
        registered.push(image_id);
    }

    let mut labels = BTreeSet::new();
    let mut written_annotations = 0usize;
    let mut images_written = Vec::with_capacity(validated.len());
    for (image_id, annotations) in validated {
        store.put_validated_annotations(&image_id, &annotations)?;
        written_annotations += annotations.len();
        labels.extend(annotations.into_iter().map(|a| a.label));
        images_written.push(image_id);
    }

    if rle > 0 {
        conversion.add(ConversionIssue::warning(
            ConversionIssueCode::RleSegmentationAsBBox,
            format!("{} RLE segmentation(s) kept as bbox only", rle),
        ));
    }
    if extra_rings > 0 {
        conversion.add(ConversionIssue::warning(
            ConversionIssueCode::DropExtraSegmentationRings,
            format!("{} multi-ring segmentation(s) reduced to their first ring", extra_rings),
        ));
    }
    if !unnamed_categories.is_empty() {
        conversion.add(ConversionIssue::info(
            ConversionIssueCode::CategoryIdAsLabel,
            format!(
                "category id(s) {} have no category entry and were used as labels",
                unnamed_categories.into_iter().collect::<Vec<_>>().join(", ")
            ),
        ));
    }
    if !registered.is_empty() {
        conversion.add(ConversionIssue::info(
            ConversionIssueCode::RegisterImagesWithoutAsset,
            format!("{} image(s) registered in project '{}' without an asset", registered.len(), project),
        ));
    }
    if doc.info.is_some() || !doc.licenses.is_empty() {
        conversion.add(ConversionIssue::info(
            ConversionIssueCode::DropDocumentMetadata,
            "document info and licenses are not stored",
        ));
    }

    conversion.output = ConversionCounts {
        images: images_written.len(),
        categories: labels.len(),
        annotations: written_annotations,
    };

    info!(
        project,
        images = images_written.len(),
        annotations = written_annotations,
        registered = registered.len(),
        "imported COCO document"
    );

    Ok(ImportReport {
        images_written,
        registered,
        conversion,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::model::Point;

    fn rect_points() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        ]
    }

    fn sample_sets() -> Vec<(ImageRecord, Vec<Annotation>)> {
        let b = ImageRecord::new("b", "b.jpg", "", "default");
        let a = ImageRecord::new("a", "a.jpg", "", "default");
        vec![
            (
                b.clone(),
                vec![Annotation::new_bbox("x", b.id.clone(), "zebra", BBox::new(1.0, 2.0, 10.0, 5.0))
                    .with_attr("iscrowd", 1i64)],
            ),
            (
                a.clone(),
                vec![
                    Annotation::new_polygon("p", a.id.clone(), "ant", rect_points()),
                    Annotation::new_text("t", a.id.clone(), "caption", "hello"),
                ],
            ),
        ]
    }

    #[test]
    fn test_build_document_categories_and_ids() {
        let (doc, report) = build_document("default", &sample_sets(), |_| None);

        let names: Vec<_> = doc.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ant", "caption", "zebra"]);
        assert_eq!(doc.categories[0].id, CocoId::Int(1));
        assert_eq!(doc.categories[2].id, CocoId::Int(3));

        // Images and annotations follow image-id order.
        assert_eq!(doc.images[0].id, CocoId::Str("a".into()));
        assert_eq!(doc.annotations.len(), 2);
        assert_eq!(doc.annotations[0].id, Some(CocoId::Int(1)));
        assert_eq!(doc.annotations[0].image_id, CocoId::Str("a".into()));
        assert_eq!(doc.annotations[1].id, Some(CocoId::Int(2)));
        assert_eq!(doc.annotations[1].category_id, CocoId::Int(3));

        assert!(report.has(ConversionIssueCode::SkipTextAnnotation));
        assert!(report.has(ConversionIssueCode::UnknownImageDimensions));
        assert_eq!(report.input.annotations, 3);
        assert_eq!(report.output.annotations, 2);
    }

    #[test]
    fn test_polygon_geometry() {
        let (doc, _) = build_document("default", &sample_sets(), |_| Some((640, 480)));
        let poly = &doc.annotations[0];
        assert_eq!(poly.area, Some(12.0));
        assert_eq!(poly.bbox, Some(vec![0.0, 0.0, 4.0, 3.0]));
        assert_eq!(
            poly.segmentation,
            serde_json::json!([[0.0, 0.0, 4.0, 0.0, 4.0, 3.0, 0.0, 3.0]])
        );
        assert_eq!(poly.iscrowd, 0);
        assert_eq!(doc.images[0].width, 640);
    }

    #[test]
    fn test_bbox_geometry_and_iscrowd() {
        let (doc, _) = build_document("default", &sample_sets(), |_| None);
        let boxed = &doc.annotations[1];
        assert_eq!(boxed.area, Some(50.0));
        assert_eq!(boxed.segmentation, serde_json::json!([]));
        assert_eq!(boxed.bbox, Some(vec![1.0, 2.0, 10.0, 5.0]));
        assert_eq!(boxed.iscrowd, 1);
    }

    #[test]
    fn test_classify_segmentation() {
        use serde_json::json;
        assert!(matches!(classify_segmentation(&json!([])), Segmentation::Empty));
        assert!(matches!(classify_segmentation(&json!(null)), Segmentation::Empty));
        assert!(matches!(
            classify_segmentation(&json!({"counts": [1, 2], "size": [4, 4]})),
            Segmentation::Rle
        ));
        match classify_segmentation(&json!([[1, 2, 3, 4, 5, 6], [7, 8]])) {
            Segmentation::Rings(flat, rings) => {
                assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
                assert_eq!(rings, 2);
            }
            _ => panic!("expected rings"),
        }
    }

    fn open_temp() -> (tempfile::TempDir, RecordStore) {
        let temp = tempfile::tempdir().expect("create temp dir");
        let store = RecordStore::open(&StoreConfig::new(temp.path())).expect("open store");
        (temp, store)
    }

    #[test]
    fn test_import_rejects_empty_payload() {
        let (_temp, store) = open_temp();
        let doc = from_coco_str(r#"{"categories": [], "images": [], "annotations": []}"#).unwrap();
        let err = import_document(&store, doc, "default").unwrap_err();
        assert!(matches!(err, AnnostoreError::EmptyPayload(_)));
    }

    #[test]
    fn test_import_external_document() {
        let (_temp, store) = open_temp();
        let json = r#"{
            "info": {"year": 2024},
            "categories": [{"id": 1, "name": "person"}],
            "images": [{"id": 7, "file_name": "seven.jpg", "width": 10, "height": 10}],
            "annotations": [
                {"id": 1, "image_id": 7, "category_id": 1, "bbox": [1, 2, 3, 4], "segmentation": [], "iscrowd": 0},
                {"id": 2, "image_id": 7, "category_id": 9, "segmentation": [[0, 0, 4, 0, 4, 3]], "iscrowd": 1},
                {"id": 3, "image_id": 7, "category_id": 1, "bbox": [0, 0, 2, 2], "segmentation": {"counts": "abc", "size": [2, 2]}}
            ]
        }"#;
        let doc = from_coco_str(json).unwrap();
        let report = import_document(&store, doc, "imported").unwrap();

        let id = ImageId::new("7");
        assert_eq!(report.images_written, vec![id.clone()]);
        assert_eq!(report.registered, vec![id.clone()]);
        assert!(report.conversion.has(ConversionIssueCode::CategoryIdAsLabel));
        assert!(report.conversion.has(ConversionIssueCode::RleSegmentationAsBBox));
        assert!(report.conversion.has(ConversionIssueCode::DropDocumentMetadata));

        let record = store.get_image(&id).unwrap();
        assert_eq!(record.filename, "seven.jpg");
        assert_eq!(record.project, "imported");
        assert_eq!(record.asset_name(), None);

        let anns = store.get_annotations(&id).unwrap();
        assert_eq!(anns.len(), 3);
        assert_eq!(anns[0].kind, AnnotationKind::Bbox);
        assert_eq!(anns[0].label, "person");
        assert_eq!(anns[0].id.as_str(), "1");
        assert_eq!(anns[1].kind, AnnotationKind::Polygon);
        assert_eq!(anns[1].label, "9");
        assert_eq!(anns[1].points.as_ref().map(Vec::len), Some(3));
        assert_eq!(anns[1].bbox, None);
        assert_eq!(anns[1].attrs["iscrowd"], AttrValue::Int(1));
        assert_eq!(anns[2].kind, AnnotationKind::Bbox);
    }

    #[test]
    fn test_import_validates_before_writing() {
        let (_temp, store) = open_temp();
        let json = r#"{
            "categories": [{"id": 1, "name": "a"}],
            "images": [],
            "annotations": [
                {"id": 1, "image_id": "good", "category_id": 1, "bbox": [0, 0, 1, 1]},
                {"id": 2, "image_id": "bad", "category_id": 1, "segmentation": [[0, 0, 1]]}
            ]
        }"#;
        let doc = from_coco_str(json).unwrap();
        let err = import_document(&store, doc, "default").unwrap_err();
        assert!(matches!(err, AnnostoreError::ValidationFailed { .. }));
        assert!(!store.contains_image(&ImageId::new("good")));
    }

    #[test]
    fn test_import_replaces_existing_set() {
        let (_temp, store) = open_temp();
        let record = store.ingest_image("a.jpg", "default", &b""[..]).unwrap();
        store
            .put_annotations(&record.id, vec![RawAnnotation::bbox("old", [0.0; 4])])
            .unwrap();

        let doc = CocoDocument {
            categories: vec![CocoCategory {
                id: CocoId::Int(1),
                name: "new".into(),
                supercategory: None,
            }],
            annotations: vec![CocoAnnotation {
                id: Some(CocoId::Int(1)),
                image_id: CocoId::Str(record.id.to_string()),
                category_id: CocoId::Int(1),
                bbox: Some(vec![0.0, 0.0, 1.0, 1.0]),
                segmentation: serde_json::json!([]),
                area: None,
                iscrowd: 0,
            }],
            ..Default::default()
        };
        let report = import_document(&store, doc, "default").unwrap();
        assert!(report.registered.is_empty());

        let anns = store.get_annotations(&record.id).unwrap();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].label, "new");
    }

    fn doc_for_image(image_id: &str) -> CocoDocument {
        from_coco_str(&format!(
            r#"{{
                "categories": [{{"id": 1, "name": "a"}}],
                "images": [{{"id": "{id}", "file_name": "x.jpg"}}],
                "annotations": [{{"id": 1, "image_id": "{id}", "category_id": 1, "bbox": [0, 0, 1, 1]}}]
            }}"#,
            id = image_id
        ))
        .unwrap()
    }

    #[test]
    fn test_import_rejects_path_like_image_ids() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("data");
        let store = RecordStore::open(&StoreConfig::new(&root)).unwrap();

        for bad in ["../../escaped", "../x", "a/b", ".x"] {
            let err = import_document(&store, doc_for_image(bad), "p").unwrap_err();
            match err {
                AnnostoreError::ValidationFailed { report, .. } => {
                    assert!(report.has(crate::validation::IssueCode::UnsafeImageId), "{}", bad);
                }
                other => panic!("unexpected error for {:?}: {}", bad, other),
            }
        }

        assert!(!temp.path().join("escaped.json").exists());
        assert!(!root.join("x.json").exists());
        assert!(store.all_images().unwrap().is_empty());
    }

    #[test]
    fn test_import_rejects_unsafe_listed_image_before_writing() {
        let (_temp, store) = open_temp();
        let mut doc = doc_for_image("good");
        doc.images.push(CocoImage {
            id: CocoId::Str("../listed".into()),
            file_name: "l.jpg".into(),
            width: 0,
            height: 0,
        });

        let err = import_document(&store, doc, "p").unwrap_err();
        assert!(matches!(err, AnnostoreError::ValidationFailed { .. }));
        assert!(!store.contains_image(&ImageId::new("good")));
    }

    #[test]
    fn test_iscrowd_accepts_bools_and_strings() {
        let json = r#"{
            "annotations": [
                {"image_id": 1, "category_id": 1, "iscrowd": false},
                {"image_id": 1, "category_id": 1, "iscrowd": true},
                {"image_id": 1, "category_id": 1, "iscrowd": "1"},
                {"image_id": 1, "category_id": 1, "iscrowd": null},
                {"image_id": 1, "category_id": 1, "iscrowd": 3},
                {"image_id": 1, "category_id": 1}
            ]
        }"#;
        let doc = from_coco_str(json).unwrap();
        let flags: Vec<u8> = doc.annotations.iter().map(|a| a.iscrowd).collect();
        assert_eq!(flags, vec![0, 1, 1, 0, 1, 0]);

        let bad = r#"{"annotations": [{"image_id": 1, "category_id": 1, "iscrowd": [1]}]}"#;
        let err = from_coco_str(bad).unwrap_err();
        assert!(err.to_string().contains("invalid iscrowd"));
    }

    #[test]
    fn test_annotation_without_geometry_has_its_own_code() {
        let record = ImageRecord::new("m", "m.jpg", "", "default");
        let mut mask = Annotation::new_bbox("k", record.id.clone(), "blob", BBox::default());
        mask.kind = AnnotationKind::Mask;
        mask.bbox = None;
        let sets = vec![(record, vec![mask])];

        let (doc, report) = build_document("default", &sets, |_| None);
        assert!(doc.annotations.is_empty());
        assert!(report.has(ConversionIssueCode::SkipAnnotationWithoutGeometry));
        assert!(!report.has(ConversionIssueCode::SkipTextAnnotation));
    }

    #[test]
    fn test_document_json_shape() {
        let (doc, _) = build_document("proj", &sample_sets(), |_| None);
        let json = to_coco_string(&doc).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["info"]["description"], "proj");
        assert_eq!(parsed["images"][0]["id"], "a");
        assert_eq!(parsed["categories"][0]["id"], 1);
        assert_eq!(parsed["annotations"][0]["image_id"], "a");
        assert!(parsed.get("licenses").is_none());
    }
}
