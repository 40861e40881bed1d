//! Boundary validation for annotation payloads.
//!
//! Raw payloads are checked for:
//! - Identity (ids unique within the set, target image matches)
//! - Required geometry per annotation type
//! - Well-formed, finite coordinates
//! - Representable attribute values
//!
//! Geometry is never checked against image content.

mod report;

pub use report::{IssueCode, IssueContext, ValidationIssue, ValidationReport};

use std::collections::{BTreeMap, HashMap};

use crate::error::AnnostoreError;
use crate::model::{
    Annotation, AnnotationId, AnnotationKind, AttrValue, BBox, ImageId, Point, RawAnnotation,
};

/// Minimum number of vertices for a polygon annotation.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Validates a payload destined for `image_id` and returns the normalized
/// records, with ids assigned where missing.
///
/// All issues are collected before failing, so the returned
/// [`AnnostoreError::ValidationFailed`] lists every offending field.
pub fn validate_annotations(
    image_id: &ImageId,
    raws: Vec<RawAnnotation>,
) -> Result<Vec<Annotation>, AnnostoreError> {
    let (annotations, report) = check_annotations(image_id, raws);
    if report.is_clean() {
        Ok(annotations)
    } else {
        Err(AnnostoreError::ValidationFailed {
            issue_count: report.issue_count(),
            report,
        })
    }
}

/// Rejects image ids that cannot name a record file.
///
/// Fails with [`AnnostoreError::ValidationFailed`] before anything touches
/// the filesystem.
pub fn ensure_path_safe(image_id: &ImageId) -> Result<(), AnnostoreError> {
    if image_id.is_path_safe() {
        return Ok(());
    }
    let mut report = ValidationReport::new(image_id.as_str());
    report.add(unsafe_image_id_issue(image_id));
    Err(AnnostoreError::ValidationFailed {
        issue_count: report.issue_count(),
        report,
    })
}

fn unsafe_image_id_issue(image_id: &ImageId) -> ValidationIssue {
    ValidationIssue::new(
        IssueCode::UnsafeImageId,
        "image_id",
        format!(
            "image id {:?} must be a non-empty file name without '/', '\\', '..' or a leading '.'",
            image_id.as_str()
        ),
        IssueContext {
            index: None,
            annotation_id: None,
        },
    )
}

/// Validates without failing: returns whatever records could be normalized
/// alongside the full report.
pub fn check_annotations(
    image_id: &ImageId,
    raws: Vec<RawAnnotation>,
) -> (Vec<Annotation>, ValidationReport) {
    let mut report = ValidationReport::new(image_id.as_str());
    if !image_id.is_path_safe() {
        report.add(unsafe_image_id_issue(image_id));
    }
    let mut seen_ids: HashMap<AnnotationId, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raws.len());

    for (index, raw) in raws.into_iter().enumerate() {
        let ctx = IssueContext {
            index: Some(index),
            annotation_id: raw.id.clone(),
        };
        let before = report.issue_count();

        let id = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => AnnotationId::new(id),
            _ => AnnotationId::generate(),
        };
        if let Some(first) = seen_ids.get(&id) {
            report.add(ValidationIssue::new(
                IssueCode::DuplicateAnnotationId,
                "id",
                format!("Duplicate annotation ID {} (first seen at index {})", id, first),
                ctx.clone(),
            ));
        } else {
            seen_ids.insert(id.clone(), index);
        }

        if let Some(claimed) = raw.image_id.as_deref() {
            if claimed != image_id.as_str() {
                report.add(ValidationIssue::new(
                    IssueCode::ImageIdMismatch,
                    "image_id",
                    format!("Annotation names image {} but is written to {}", claimed, image_id),
                    ctx.clone(),
                ));
            }
        }

        let bbox = raw
            .bbox
            .as_deref()
            .and_then(|values| check_bbox(values, &ctx, &mut report));
        let points = raw
            .points
            .as_deref()
            .and_then(|values| check_points(values, &ctx, &mut report));
        let attrs = check_attrs(raw.attrs.as_ref(), &ctx, &mut report);

        match raw.kind {
            AnnotationKind::Bbox if raw.bbox.is_none() => report.add(ValidationIssue::new(
                IssueCode::MissingBBox,
                "bbox",
                "bbox annotations require a bbox",
                ctx.clone(),
            )),
            AnnotationKind::Polygon => {
                let count = raw.points.as_ref().map_or(0, Vec::len);
                if count < MIN_POLYGON_POINTS {
                    report.add(ValidationIssue::new(
                        IssueCode::TooFewPoints,
                        "points",
                        format!(
                            "polygon annotations require at least {} points, got {}",
                            MIN_POLYGON_POINTS, count
                        ),
                        ctx.clone(),
                    ));
                }
            }
            AnnotationKind::Text if raw.text.is_none() => report.add(ValidationIssue::new(
                IssueCode::MissingText,
                "text",
                "text annotations require text",
                ctx.clone(),
            )),
            _ => {}
        }

        if report.issue_count() == before {
            out.push(Annotation {
                id,
                image_id: image_id.clone(),
                kind: raw.kind,
                label: raw.label,
                bbox,
                points,
                text: raw.text,
                attrs,
            });
        }
    }

    (out, report)
}

fn check_bbox(values: &[f64], ctx: &IssueContext, report: &mut ValidationReport) -> Option<BBox> {
    let Ok(array) = <[f64; 4]>::try_from(values) else {
        report.add(ValidationIssue::new(
            IssueCode::MalformedBBox,
            "bbox",
            format!("bbox must have 4 values [x, y, w, h], got {}", values.len()),
            ctx.clone(),
        ));
        return None;
    };

    let bbox = BBox::from(array);
    if !bbox.is_finite() {
        report.add(ValidationIssue::new(
            IssueCode::BBoxNotFinite,
            "bbox",
            format!(
                "Non-finite values ({}, {}, {}, {})",
                bbox.x, bbox.y, bbox.w, bbox.h
            ),
            ctx.clone(),
        ));
        return None;
    }
    Some(bbox)
}

fn check_points(
    values: &[Vec<f64>],
    ctx: &IssueContext,
    report: &mut ValidationReport,
) -> Option<Vec<Point>> {
    let mut points = Vec::with_capacity(values.len());
    let mut ok = true;

    for (i, pair) in values.iter().enumerate() {
        match pair.as_slice() {
            &[x, y] => {
                let point = Point::new(x, y);
                if !point.is_finite() {
                    report.add(ValidationIssue::new(
                        IssueCode::PointNotFinite,
                        "points",
                        format!("point {} has non-finite coordinates ({}, {})", i, x, y),
                        ctx.clone(),
                    ));
                    ok = false;
                }
                points.push(point);
            }
            other => {
                report.add(ValidationIssue::new(
                    IssueCode::MalformedPoint,
                    "points",
                    format!("point {} must have 2 coordinates, got {}", i, other.len()),
                    ctx.clone(),
                ));
                ok = false;
            }
        }
    }

    ok.then_some(points)
}

fn check_attrs(
    attrs: Option<&BTreeMap<String, serde_json::Value>>,
    ctx: &IssueContext,
    report: &mut ValidationReport,
) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    for (key, value) in attrs.into_iter().flatten() {
        match AttrValue::from_json(value) {
            Some(v) => {
                out.insert(key.clone(), v);
            }
            None => report.add(ValidationIssue::new(
                IssueCode::UnsupportedAttrValue,
                "attrs",
                format!("attribute '{}' contains a JSON object", key),
                ctx.clone(),
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn img() -> ImageId {
        ImageId::new("img1")
    }

    #[test]
    fn test_unsafe_image_id_is_rejected() {
        let target = ImageId::new("../x");
        let (anns, report) = check_annotations(&target, vec![RawAnnotation::bbox("a", [0.0; 4])]);
        assert!(report.has(IssueCode::UnsafeImageId));
        assert_eq!(report.issues[0].context.index, None);
        // The records themselves are fine; only the target is refused.
        assert_eq!(anns.len(), 1);

        let err = ensure_path_safe(&target).unwrap_err();
        assert!(matches!(err, AnnostoreError::ValidationFailed { issue_count: 1, .. }));
        assert!(ensure_path_safe(&img()).is_ok());
    }

    #[test]
    fn test_valid_payload_passes_and_assigns_ids() {
        let raws = vec![
            RawAnnotation::bbox("cat", [0.0, 0.0, 10.0, 10.0]),
            RawAnnotation::polygon("dog", &[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)]).with_id("keep-me"),
            RawAnnotation::text("caption", "hello"),
        ];
        let anns = validate_annotations(&img(), raws).expect("valid payload");
        assert_eq!(anns.len(), 3);
        assert_eq!(anns[0].id.as_str().len(), crate::model::ids::TOKEN_LEN);
        assert_eq!(anns[1].id.as_str(), "keep-me");
        assert!(anns.iter().all(|a| a.image_id == img()));
    }

    #[test]
    fn test_empty_id_is_replaced() {
        let raws = vec![RawAnnotation::bbox("cat", [0.0, 0.0, 1.0, 1.0]).with_id("")];
        let anns = validate_annotations(&img(), raws).unwrap();
        assert!(!anns[0].id.as_str().is_empty());
    }

    #[test]
    fn test_type_requirements() {
        let mut no_bbox = RawAnnotation::bbox("a", [0.0; 4]);
        no_bbox.bbox = None;
        let short_polygon = RawAnnotation::polygon("b", &[(0.0, 0.0), (1.0, 1.0)]);
        let mut no_text = RawAnnotation::text("c", "");
        no_text.text = None;

        let (anns, report) = check_annotations(&img(), vec![no_bbox, short_polygon, no_text]);
        assert!(anns.is_empty());
        assert_eq!(report.issue_count(), 3);
        assert!(report.has(IssueCode::MissingBBox));
        assert!(report.has(IssueCode::TooFewPoints));
        assert!(report.has(IssueCode::MissingText));
    }

    #[test]
    fn test_malformed_geometry_reports_field() {
        let mut bad_bbox = RawAnnotation::bbox("a", [0.0; 4]);
        bad_bbox.bbox = Some(vec![1.0, 2.0, 3.0]);
        let mut bad_point = RawAnnotation::polygon("b", &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        bad_point.points.as_mut().unwrap()[1] = vec![1.0];
        let nan = RawAnnotation::bbox("c", [f64::NAN, 0.0, 1.0, 1.0]);

        let err = validate_annotations(&img(), vec![bad_bbox, bad_point, nan]).unwrap_err();
        match err {
            AnnostoreError::ValidationFailed { issue_count, report } => {
                assert_eq!(issue_count, 3);
                assert_eq!(report.issues[0].field, "bbox");
                assert_eq!(report.issues[0].code, IssueCode::MalformedBBox);
                assert_eq!(report.issues[1].field, "points");
                assert_eq!(report.issues[1].context.index, Some(1));
                assert_eq!(report.issues[2].code, IssueCode::BBoxNotFinite);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let raws = vec![
            RawAnnotation::bbox("a", [0.0; 4]).with_id("x"),
            RawAnnotation::bbox("b", [0.0; 4]).with_id("x"),
        ];
        let (_, report) = check_annotations(&img(), raws);
        assert!(report.has(IssueCode::DuplicateAnnotationId));
        assert_eq!(report.issues[0].context.index, Some(1));
    }

    #[test]
    fn test_image_id_mismatch_rejected() {
        let mut raw = RawAnnotation::bbox("a", [0.0; 4]);
        raw.image_id = Some("other".into());
        let (_, report) = check_annotations(&img(), vec![raw]);
        assert!(report.has(IssueCode::ImageIdMismatch));
    }

    #[test]
    fn test_attrs_are_converted_and_objects_rejected() {
        let ok = RawAnnotation::bbox("a", [0.0; 4])
            .with_attr("iscrowd", json!(1))
            .with_attr("tags", json!(["x", 2]));
        let anns = validate_annotations(&img(), vec![ok]).unwrap();
        assert_eq!(anns[0].attrs["iscrowd"], AttrValue::Int(1));

        let bad = RawAnnotation::bbox("a", [0.0; 4]).with_attr("meta", json!({"k": "v"}));
        let (_, report) = check_annotations(&img(), vec![bad]);
        assert!(report.has(IssueCode::UnsupportedAttrValue));
    }

    #[test]
    fn test_mask_requires_no_geometry() {
        let raw = RawAnnotation {
            kind: AnnotationKind::Mask,
            label: "blob".into(),
            ..Default::default()
        };
        assert!(validate_annotations(&img(), vec![raw]).is_ok());
    }
}
