//! Fuzz target: JSON deserialization and validation of the checkout body.
//!
//! Errors are expected; panics are not.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shop_gateway::routes::orders::CheckoutBody;
use validator::Validate;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = serde_json::from_slice::<CheckoutBody>(data) {
        let _ = body.validate();
    }
});
