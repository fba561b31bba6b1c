#![no_main]

use libfuzzer_sys::fuzz_target;
use interop_report::{parse, RunStatus};

// Arbitrary process output must never panic the parser, and any verdict must be self consistent.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(verdict) = parse(&text) {
        assert_eq!(verdict.passed() + verdict.failed() + verdict.skipped(), verdict.total());
        if verdict.failed() > 0 {
            assert_eq!(verdict.status(), RunStatus::Fail);
        }
    }
});
