//! Property tests for the store -> COCO -> store round-trip.

mod common;
mod proptest_helpers;

use annostore::coco::{export_project, from_coco_str, import_document, to_coco_string};
use annostore::model::{Annotation, AnnotationKind, ImageRecord, RawAnnotation};
use proptest::prelude::*;
use proptest_helpers::{approx, arb_image_sets, proptest_config, EPS_COCO};

fn same_geometry(a: &Annotation, b: &Annotation) -> bool {
    let boxes = match (a.effective_bbox(), b.effective_bbox()) {
        (Some(x), Some(y)) => x
            .to_array()
            .iter()
            .zip(y.to_array().iter())
            .all(|(p, q)| approx(*p, *q, EPS_COCO)),
        (None, None) => true,
        _ => false,
    };
    let points = match (&a.points, &b.points) {
        (Some(x), Some(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(p, q)| approx(p.x, q.x, EPS_COCO) && approx(p.y, q.y, EPS_COCO))
        }
        (None, None) => true,
        _ => false,
    };
    boxes && points
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn coco_roundtrip_preserves_labels_and_geometry(sets in arb_image_sets(4, 6)) {
        let (_src_dir, source) = common::temp_store();
        let mut originals = Vec::new();
        for (idx, raws) in sets.into_iter().enumerate() {
            let record = ImageRecord::new(format!("img{:02}", idx), format!("{}.jpg", idx), "", "rt");
            source.put_image(&record).unwrap();
            let stored = source.put_annotations(&record.id, raws).unwrap();
            originals.push((record.id, stored));
        }

        let (doc, _report) = export_project(&source, "rt").unwrap();
        let total: usize = originals.iter().map(|(_, anns)| anns.len()).sum();
        prop_assert_eq!(doc.annotations.len(), total);
        prop_assume!(total > 0);

        // Through the serialized form, as a file would be.
        let doc = from_coco_str(&to_coco_string(&doc).unwrap()).unwrap();

        let (_dst_dir, target) = common::temp_store();
        let report = import_document(&target, doc, "rt").unwrap();
        prop_assert!(!report.conversion.is_lossy());

        for (image_id, before) in &originals {
            if before.is_empty() {
                // No annotations means the image never reached the document's
                // annotation list, but it is still registered from `images`.
                prop_assert!(target.get_annotations(image_id).unwrap().is_empty());
                continue;
            }
            let after = target.get_annotations(image_id).unwrap();
            prop_assert_eq!(after.len(), before.len());
            for (a, b) in before.iter().zip(&after) {
                prop_assert_eq!(&a.label, &b.label);
                prop_assert_eq!(a.kind, b.kind);
                prop_assert!(same_geometry(a, b), "geometry differs: {:?} vs {:?}", a, b);
            }

            // Stored records resubmitted as payloads come back unchanged.
            let resubmitted: Vec<RawAnnotation> = after.iter().map(RawAnnotation::from).collect();
            let again = target.put_annotations(image_id, resubmitted).unwrap();
            prop_assert_eq!(&again, &after);
        }
    }

    #[test]
    fn coco_export_category_ids_are_dense(sets in arb_image_sets(3, 5)) {
        let (_dir, store) = common::temp_store();
        for (idx, raws) in sets.into_iter().enumerate() {
            let record = ImageRecord::new(format!("i{}", idx), "x.jpg", "", "p");
            store.put_image(&record).unwrap();
            store.put_annotations(&record.id, raws).unwrap();
        }

        let (doc, _) = export_project(&store, "p").unwrap();
        let ids: Vec<String> = doc.categories.iter().map(|c| c.id.to_string()).collect();
        let expected: Vec<String> = (1..=doc.categories.len()).map(|i| i.to_string()).collect();
        prop_assert_eq!(ids, expected);

        let mut names: Vec<&str> = doc.categories.iter().map(|c| c.name.as_str()).collect();
        let sorted = { let mut s = names.clone(); s.sort(); s };
        prop_assert_eq!(&names, &sorted);
        names.dedup();
        prop_assert_eq!(names.len(), doc.categories.len());

        for ann in &doc.annotations {
            prop_assert!(ann.area.unwrap() >= 0.0);
        }
    }
}

#[test]
fn polygon_without_bbox_gets_inferred_bbox_on_export() {
    let (_dir, store) = common::temp_store();
    let record = ImageRecord::new("a", "a.jpg", "", "default");
    store.put_image(&record).unwrap();
    store
        .put_annotations(
            &record.id,
            vec![RawAnnotation::polygon(
                "leaf",
                &[(1.0, 1.0), (5.0, 1.0), (5.0, 4.0)],
            )],
        )
        .unwrap();

    let (doc, _) = export_project(&store, "default").unwrap();
    let ann = &doc.annotations[0];
    assert_eq!(ann.bbox, Some(vec![1.0, 1.0, 4.0, 3.0]));
    assert_eq!(ann.area, Some(6.0));

    let stored = store.get_annotations(&record.id).unwrap();
    assert_eq!(stored[0].kind, AnnotationKind::Polygon);
    assert_eq!(stored[0].bbox, None);
}
