#![no_main]
use libfuzzer_sys::fuzz_target;
use steplink_core::frame::{FrameAccumulator, decode_telemetry_frame};

fuzz_target!(|data: &[u8]| {
    // Arbitrary line noise must only ever produce errors, never panics,
    // and the accumulator must stay bounded.
    let mut acc = FrameAccumulator::with_max_len(64);
    for chunk in data.chunks(7) {
        acc.extend(chunk);
        while let Some(frame) = acc.next_frame() {
            let _ = decode_telemetry_frame(&frame);
        }
        assert!(acc.pending() <= 64);
    }
});
