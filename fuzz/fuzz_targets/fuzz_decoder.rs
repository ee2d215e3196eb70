#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use utf8flow::{
    ByteView, CodePoint, DecoderState, EncoderState, decode, encode, finish, flush,
    split_at_offsets,
};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    bytes: &'a [u8],
    splits: Vec<u16>,
    capacity: u8,
}

fn decode_all<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<CodePoint> {
    let mut state = DecoderState::new();
    let mut out = Vec::new();
    for chunk in chunks {
        let mut input = Some(ByteView::copy_from_slice(chunk));
        while let Some(cp) = decode(input.take(), &mut state) {
            out.push(cp);
        }
    }
    while let Some(cp) = finish(&mut state) {
        out.push(cp);
    }
    out
}

fuzz_target!(|input: Input<'_>| {
    // Splitting anywhere must not change the decoded code points.
    let whole = decode_all([input.bytes]);
    let offsets: Vec<usize> = input.splits.iter().map(|&s| usize::from(s)).collect();
    let parts = split_at_offsets(input.bytes, &offsets);
    assert_eq!(decode_all(parts.iter().copied()), whole);

    // Re-encoding through any window size and decoding again is lossless.
    let capacity = usize::from(input.capacity % 8) + 1;
    let mut state = EncoderState::new();
    let mut windows = Vec::new();
    for &cp in &whole {
        let mut window = vec![0u8; capacity];
        let written = encode(Some(cp), &mut window, &mut state).unwrap();
        window.truncate(written);
        windows.push(window);
    }
    loop {
        let mut window = vec![0u8; capacity];
        let flushed = flush(&mut window, &mut state).unwrap();
        window.truncate(flushed.written);
        windows.push(window);
        if flushed.complete {
            break;
        }
    }
    assert_eq!(decode_all(windows.iter().map(Vec::as_slice)), whole);
});
