#![no_main]

use libfuzzer_sys::fuzz_target;
use unidiag_core::{
    decode_incremental, decode_slice, diagnose, is_valid_scalar, DecodeOutcome, StreamDecoder,
    SubjectId,
};

fuzz_target!(|data: &[u8]| {
    let whole = decode_slice(data);
    assert_eq!(decode_incremental(data), whole);

    // First byte picks a split point for a two-chunk feed.
    let split = data.first().map_or(0, |b| usize::from(*b) % (data.len() + 1));
    let mut decoder = StreamDecoder::new();
    let mut chunked = decoder.feed_chunk(&data[..split]);
    chunked.extend(decoder.feed_chunk(&data[split..]));
    chunked.retain(|o| o.is_significant());
    chunked.extend(decoder.finish().map(DecodeOutcome::Invalid));
    assert_eq!(chunked, whole);

    for outcome in &whole {
        if let Some(s) = outcome.scalar() {
            assert!(is_valid_scalar(s.value()));
        }
    }

    let verdict = diagnose(SubjectId::from_bytes(data), data);
    assert_eq!(verdict.decoded.is_some(), std::str::from_utf8(data).is_ok());
});
