#![no_main]
use libfuzzer_sys::fuzz_target;

use dns_wire::name::Name;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(name) = Name::from_text(text, None) {
            let rendered = name.to_text(false);
            let reparsed = Name::from_text(&rendered, None).unwrap();
            assert_eq!(name, reparsed);
        }
    }
});
