//! Fuzz target: arbitrary JSON filter trees through every translator.
//!
//! A tree that fails validation must fail translation on every backend,
//! and translation must be deterministic. Nothing may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulserag::filter::{translate, BackendKind, FilterExpression};

fuzz_target!(|data: &[u8]| {
    let Ok(expr) = serde_json::from_slice::<FilterExpression>(data) else {
        return;
    };
    let valid = expr.validate().is_ok();

    for backend in BackendKind::ALL {
        let first = translate(&expr, backend);
        if !valid {
            assert!(first.is_err(), "{backend} translated an invalid tree");
        }
        if let Ok(native) = &first {
            assert_eq!(native.backend(), backend);
        }
        assert_eq!(first, translate(&expr, backend));
    }
});
