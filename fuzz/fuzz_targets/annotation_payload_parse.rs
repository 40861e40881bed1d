//! Fuzz target for annotation payload parsing and validation.
//!
//! Run with:
//!   cargo +nightly fuzz run annotation_payload_parse

#![no_main]

use annostore::model::{ImageId, RawAnnotation};
use annostore::validation::check_annotations;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    // Errors are fine; panics are not.
    if let Ok(raws) = serde_json::from_slice::<Vec<RawAnnotation>>(data) {
        let _ = check_annotations(&ImageId::new("fuzz"), raws);
    }
});
