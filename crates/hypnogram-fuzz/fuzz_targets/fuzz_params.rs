#![no_main]
use hypnogram_core::Thresholds;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Parsing must never panic; accepted options must convert cleanly.
    if let Ok(thresholds) = Thresholds::from_params(text.split(',')) {
        assert!(thresholds.to_epochs(30.0).is_ok());
    }
});
