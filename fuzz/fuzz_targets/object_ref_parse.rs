//! Fuzz target for root object and graph reference parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use transferpack::graph::{GraphRef, ObjectRef};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(object) = input.parse::<ObjectRef>() {
        let reparsed: ObjectRef = object.to_string().parse().expect("display form reparses");
        assert_eq!(object, reparsed);
    }
    if let Ok(reference) = input.parse::<GraphRef>() {
        let reparsed: GraphRef = reference.to_string().parse().expect("display form reparses");
        assert_eq!(reference, reparsed);
    }
});
