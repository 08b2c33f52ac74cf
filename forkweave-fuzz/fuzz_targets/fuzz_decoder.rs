#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

use forkweave_tunnel::codec::FrameDecoder;
use forkweave_tunnel::rpc::{decode_request, decode_response, decode_result};
use forkweave_tunnel::wire::{decode_added, decode_event, decode_topic};

fuzz_target!(|data: &[u8]| {
    // Frame decoder must never panic, whatever the stream contains.
    let mut decoder = FrameDecoder::new(1024 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(envelope)) = decoder.decode(&mut buf) {
        // Record codecs must reject garbage without panicking.
        let _ = decode_event(&envelope.payload);
        let _ = decode_topic(&envelope.payload);
        let _ = decode_added(&envelope.payload);
        let _ = decode_request(&envelope.payload);
        let _ = decode_result(&envelope.payload);
        let _ = decode_response(&envelope.payload);
    }

    // Raw payload decoding, independent of framing.
    let _ = decode_event(data);
    let _ = decode_response(data);
});
