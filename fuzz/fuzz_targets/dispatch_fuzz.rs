#![no_main]
use libfuzzer_sys::fuzz_target;
use svc_sim::Simulator;

// Each line is one command against the same simulator; nothing may panic.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut sim = Simulator::default();
    for line in text.lines().take(64) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let _ = sim.execute(&tokens, false);
    }
});
