//! Fuzz target for COCO JSON parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use annostore::coco::from_coco_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for JSON annotation files.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    // Errors are fine; panics are not.
    let _ = from_coco_slice(data);
});
