//! Fuzz target: `Price` parsing from arbitrary text.
//!
//! Any accepted input must stay within ten digits and survive a
//! display/parse round trip unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shop_core::Price;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(price) = text.parse::<Price>() else {
        return;
    };
    assert!(price.cents() <= Price::MAX_CENTS, "accepted out-of-range amount {text:?}");
    let reparsed: Price = price.to_string().parse().expect("displayed price must parse");
    assert_eq!(reparsed, price);
});
