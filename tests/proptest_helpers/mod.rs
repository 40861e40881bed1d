#![allow(dead_code)]

use annostore::model::{Point, RawAnnotation};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Coordinate tolerance for COCO round-trips.
pub const EPS_COCO: f64 = 1e-6;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Coordinates on a 1/1000 grid, so sums stay exact enough to compare.
fn coord() -> impl Strategy<Value = f64> {
    (-100_000i32..=100_000).prop_map(|v| v as f64 / 1000.0)
}

pub fn arb_point() -> BoxedStrategy<Point> {
    (coord(), coord()).prop_map(|(x, y)| Point::new(x, y)).boxed()
}

pub fn arb_polygon(min: usize, max: usize) -> BoxedStrategy<Vec<Point>> {
    proptest::collection::vec(arb_point(), min..=max).boxed()
}

fn label_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z]{1,8}")
        .expect("valid label regex")
        .boxed()
}

/// A valid bbox or polygon payload.
pub fn arb_raw_annotation() -> BoxedStrategy<RawAnnotation> {
    let bbox = (
        label_strategy(),
        coord(),
        coord(),
        (0i32..=50_000).prop_map(|v| v as f64 / 1000.0),
        (0i32..=50_000).prop_map(|v| v as f64 / 1000.0),
    )
        .prop_map(|(label, x, y, w, h)| RawAnnotation::bbox(label, [x, y, w, h]));

    let polygon = (label_strategy(), arb_polygon(3, 12)).prop_map(|(label, points)| {
        let pairs: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        RawAnnotation::polygon(label, &pairs)
    });

    prop_oneof![bbox, polygon].boxed()
}

/// One to `max_images` annotation payloads, each with up to `max_anns` records.
pub fn arb_image_sets(max_images: usize, max_anns: usize) -> BoxedStrategy<Vec<Vec<RawAnnotation>>> {
    assert!(max_images > 0, "max_images must be > 0");
    proptest::collection::vec(
        proptest::collection::vec(arb_raw_annotation(), 0..=max_anns),
        1..=max_images,
    )
    .boxed()
}

pub fn approx(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}
