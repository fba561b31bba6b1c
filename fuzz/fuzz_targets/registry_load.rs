#![no_main]

use libfuzzer_sys::fuzz_target;
use interop_core::{ConfigError, Registry};

// Registry validation either yields a registry or a typed error; an Invalid error is never empty.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    match Registry::from_json(&text) {
        Ok(registry) => {
            for imp in registry.implementations.values() {
                assert!(!imp.draft_versions.is_empty());
                assert!(!imp.roles.is_empty());
            }
        }
        Err(ConfigError::Invalid(issues)) => assert!(!issues.is_empty()),
        Err(_) => {}
    }
});
