//! Fuzz target: `FrameDecoder::feed` and `parse`
//!
//! Drives arbitrary byte sequences into the streaming decoder and the
//! one-shot parser.  Neither may panic, and every frame they accept must
//! re-validate on its own.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use sunster::protocol::codec::{Frame, FrameDecoder, parse};
use sunster::protocol::telemetry::HeaterStatus;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    decoder.feed(data, |result| match result {
        Ok(Frame::Heater(frame)) => {
            assert!(parse(frame.bytes()).is_ok(), "accepted frame must re-parse");
            let status = HeaterStatus::from_frame(&frame);
            assert!(status.input_voltage >= 0.0);
        }
        Ok(Frame::Controller(_)) | Err(_) => {}
    });

    let _ = parse(data);

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert!(!decoder.is_synced());
    decoder.feed(data, |_| {});
});
