#![no_main]
use libfuzzer_sys::fuzz_target;
use svc_cli::tokenize;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let _ = tokenize(&tokens);
    }
});
