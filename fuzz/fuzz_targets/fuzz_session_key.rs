//! Fuzz target: session keys taken from client cookies.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shop_core::SessionKey;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(key) = SessionKey::parse(raw) {
        assert_eq!(key.as_str(), raw);
        assert_eq!(raw.len(), SessionKey::LEN);
    }
});
