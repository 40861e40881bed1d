//! Derived geometry for polygon annotations.
//!
//! The area functions apply the shoelace formula literally: every vertex
//! pair, wrapping around from the last vertex to the first, contributes
//! `x_i * y_{i+1} - x_{i+1} * y_i`. Self-intersecting polygons are not
//! special-cased.

use crate::model::{BBox, Point};

/// Signed shoelace area. Positive for counter-clockwise winding in a
/// y-up frame (clockwise as drawn in image space, where y grows downward).
///
/// Fewer than 3 vertices give 0.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Polygon area: the absolute value of [`signed_area`].
pub fn polygon_area(points: &[Point]) -> f64 {
    signed_area(points).abs()
}

/// The tightest axis-aligned box around the points, `None` when empty.
pub fn bbox_from_points(points: &[Point]) -> Option<BBox> {
    let first = points.first()?;
    let (mut xmin, mut ymin, mut xmax, mut ymax) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        xmin = xmin.min(p.x);
        ymin = ymin.min(p.y);
        xmax = xmax.max(p.x);
        ymax = ymax.max(p.y);
    }
    Some(BBox::from_xyxy(xmin, ymin, xmax, ymax))
}

/// Flattens points into `[x0, y0, x1, y1, ...]` (COCO segmentation ring).
pub fn flatten(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

/// Pairs up a flat coordinate list. Returns `None` for an odd length.
pub fn unflatten(flat: &[f64]) -> Option<Vec<Point>> {
    if flat.len() % 2 != 0 {
        return None;
    }
    Some(
        flat.chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect(),
    )
}
