#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|source: &str| {
    // Parsing the same input twice must agree, and never panic
    let first = jasp::parse_str(source);
    let second = jasp::parse_str(source);
    assert_eq!(first, second);
});
