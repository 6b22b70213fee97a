#![no_main]
//! Stored-record fuzzing
//!
//! Arbitrary JSON snapshots must load and resolve for every context id
//! without panicking.

use libfuzzer_sys::fuzz_target;

use sitecsp_policy::{resolve, MemorySink, PolicySnapshot};

fuzz_target!(|data: &[u8]| {
    let json = match std::str::from_utf8(data) {
        Ok(json) => json,
        Err(_) => return,
    };
    let snapshot = match PolicySnapshot::from_json_str(json) {
        Ok(snapshot) => snapshot,
        Err(_) => return,
    };

    let sink = MemorySink::new();
    for id in ["admin", "logged-in", "frontend", "unknown"] {
        let _ = resolve(id, &snapshot, &sink);
    }

    let reloaded = PolicySnapshot::from_records(&snapshot.to_records())
        .expect("records produced by a snapshot must load");
    assert_eq!(reloaded, snapshot);
});
