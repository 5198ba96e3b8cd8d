//! Fuzz target for transfer graph parsing.
//!
//! Feeds arbitrary bytes to the graph parser and, when they parse, through
//! pending-file splitting and validation, checking for panics, crashes, or
//! hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use transferpack::graph::io_json::from_json_slice;
use transferpack::packet::split_pending_files;
use transferpack::validation::{validate_graph, ValidateOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(mut graph) = from_json_slice(data) {
        if split_pending_files(&mut graph).is_ok() {
            let _ = validate_graph(&graph, &ValidateOptions::default());
        }
    }
});
