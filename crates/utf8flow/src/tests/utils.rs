use alloc::vec::Vec;

use crate::{ByteView, CodePoint, DecoderState, EncoderState, decode, encode, finish, flush};

/// Decode `chunks` in order, then finish the stream.
pub fn decode_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<CodePoint> {
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

/// Encode `code_points` through an output window of `capacity` bytes,
/// returning every filled window.
pub fn encode_windows(code_points: &[CodePoint], capacity: usize) -> Vec<Vec<u8>> {
    let mut state = EncoderState::new();
    let mut windows = Vec::new();
    for &cp in code_points {
        let mut window = alloc::vec![0u8; capacity];
        let written = encode(Some(cp), &mut window, &mut state).unwrap();
        window.truncate(written);
        windows.push(window);
    }
    loop {
        let mut window = alloc::vec![0u8; capacity];
        let flushed = flush(&mut window, &mut state).unwrap();
        window.truncate(flushed.written);
        windows.push(window);
        if flushed.complete {
            break;
        }
    }
    windows
}
