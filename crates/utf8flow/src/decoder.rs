//! Incremental UTF-8 decoding over arbitrarily split byte chunks.
//!
//! The decoder is a byte-at-a-time state machine over a [`DecoderState`].
//! Input arrives as [`ByteView`]s that may cut a multi-byte sequence at any
//! point; the partially accumulated scalar is carried in the state until the
//! next view supplies the missing continuation bytes.
//!
//! Calling convention
//! - [`decode`] returns at most one code point per call. Call it with the new
//!   view once, then with `None` until it returns `None`, which means the
//!   buffered input is exhausted and more is needed.
//! - If a view is supplied while bytes of the previous view are still
//!   unconsumed, the unconsumed tail and the new view are concatenated into a
//!   fresh buffer, so no byte is skipped or decoded twice.
//! - [`finish`] is the terminal call: it drains what is buffered and then
//!   silently drops an incomplete trailing sequence.
//!
//! Malformed input never fails. Invalid lead bytes, invalid continuation
//! bytes and accumulated values above `0x10FFFF` each yield exactly one
//! U+FFFD. An invalid continuation byte is consumed together with the
//! sequence it interrupted; it is not re-read as a lead byte.

use crate::{ByteView, CodePoint, REPLACEMENT_CHARACTER};

/// Mutable state of one decoder instance.
#[derive(Debug, Clone, Default)]
pub struct DecoderState {
    pending_value: u32,
    continuation_bytes_remaining: u8,
    buffered_input: Option<ByteView>,
    read_index: usize,
}

impl DecoderState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a multi-byte sequence has been started but not completed.
    #[must_use]
    pub fn is_mid_sequence(&self) -> bool {
        self.continuation_bytes_remaining > 0
    }

    /// Number of continuation bytes still expected by the current sequence.
    #[must_use]
    pub fn continuation_bytes_remaining(&self) -> u8 {
        self.continuation_bytes_remaining
    }

    /// Buffered bytes that have not been read yet.
    #[must_use]
    pub fn unread(&self) -> &[u8] {
        match &self.buffered_input {
            Some(view) => &view.as_bytes()[self.read_index..],
            None => &[],
        }
    }

    fn accept(&mut self, input: ByteView) {
        if input.is_empty() {
            return;
        }
        let merged = match self.buffered_input.take() {
            Some(buffered) if self.read_index < buffered.len() => {
                buffered.slice(self.read_index..).concat(&input)
            }
            _ => input,
        };
        self.buffered_input = Some(merged);
        self.read_index = 0;
    }

    /// Advance the state machine by one byte.
    fn step(&mut self, byte: u8) -> Option<CodePoint> {
        if self.continuation_bytes_remaining == 0 {
            if byte < 0x80 {
                self.pending_value = 0;
                return Some(CodePoint::new(u32::from(byte)));
            }
            let (value, remaining) = if byte & 0xE0 == 0xC0 {
                (byte & 0x1F, 1)
            } else if byte & 0xF0 == 0xE0 {
                (byte & 0x0F, 2)
            } else if byte & 0xF8 == 0xF0 {
                (byte & 0x07, 3)
            } else {
                return Some(REPLACEMENT_CHARACTER);
            };
            self.pending_value = u32::from(value);
            self.continuation_bytes_remaining = remaining;
            return None;
        }

        if byte & 0xC0 != 0x80 {
            self.continuation_bytes_remaining = 0;
            self.pending_value = 0;
            return Some(REPLACEMENT_CHARACTER);
        }
        self.pending_value = (self.pending_value << 6) | u32::from(byte & 0x3F);
        self.continuation_bytes_remaining -= 1;
        if self.continuation_bytes_remaining == 0 {
            let value = core::mem::take(&mut self.pending_value);
            Some(CodePoint::new(value))
        } else {
            None
        }
    }

    fn drop_partial(&mut self) {
        if self.continuation_bytes_remaining > 0 {
            tracing::trace!(
                missing = self.continuation_bytes_remaining,
                "dropping incomplete trailing sequence"
            );
        }
        self.continuation_bytes_remaining = 0;
        self.pending_value = 0;
    }
}

/// Decode the next code point.
///
/// `input` is new data, or `None` to keep draining what is already
/// buffered. Returns `None` once every buffered byte has been read; a
/// sequence left incomplete at that point is retained for the next view.
pub fn decode(input: Option<ByteView>, state: &mut DecoderState) -> Option<CodePoint> {
    if let Some(view) = input {
        state.accept(view);
    }
    let buffered = state.buffered_input.clone()?;
    let bytes = buffered.as_bytes();
    while state.read_index < bytes.len() {
        let byte = bytes[state.read_index];
        state.read_index += 1;
        if let Some(cp) = state.step(byte) {
            return Some(cp);
        }
    }
    state.buffered_input = None;
    state.read_index = 0;
    None
}

/// Terminal counterpart of [`decode`]: no further input will arrive.
///
/// Returns the remaining buffered code points one per call, then drops any
/// incomplete trailing sequence and returns `None`. The state is reset and
/// may be reused for a new stream afterwards.
pub fn finish(state: &mut DecoderState) -> Option<CodePoint> {
    let next = decode(None, state);
    if next.is_none() {
        state.drop_partial();
    }
    next
}

/// Owned decoder with a feed/finish API.
///
/// ```rust
/// use utf8flow::Utf8Decoder;
///
/// let mut decoder = Utf8Decoder::new();
/// let mut text = String::new();
/// for chunk in [&b"caf"[..], &b"\xC3"[..], &b"\xA9!"[..]] {
///     text.extend(decoder.feed(chunk.to_vec()).map(|cp| cp.to_string()));
/// }
/// text.extend(decoder.finish().map(|cp| cp.to_string()));
/// assert_eq!(text, "café!");
/// ```
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    state: DecoderState,
}

impl Utf8Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Feed a chunk and iterate the code points it completes.
    ///
    /// Dropping the iterator early keeps the unread bytes buffered; they are
    /// decoded ahead of the next chunk.
    pub fn feed(&mut self, chunk: impl Into<ByteView>) -> Drain<'_> {
        Drain {
            state: &mut self.state,
            input: Some(chunk.into()),
        }
    }

    /// End the stream and iterate the remaining code points.
    #[must_use]
    pub fn finish(self) -> Finished {
        Finished { state: self.state }
    }
}

/// Iterator returned by [`Utf8Decoder::feed`].
#[derive(Debug)]
pub struct Drain<'a> {
    state: &'a mut DecoderState,
    input: Option<ByteView>,
}

impl Iterator for Drain<'_> {
    type Item = CodePoint;

    fn next(&mut self) -> Option<CodePoint> {
        decode(self.input.take(), self.state)
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        if let Some(view) = self.input.take() {
            self.state.accept(view);
        }
    }
}

/// Iterator returned by [`Utf8Decoder::finish`].
#[derive(Debug)]
pub struct Finished {
    state: DecoderState,
}

impl Iterator for Finished {
    type Item = CodePoint;

    fn next(&mut self) -> Option<CodePoint> {
        finish(&mut self.state)
    }
}

impl crate::Transform for Utf8Decoder {
    type Input = ByteView;
    type Output = CodePoint;

    fn push(&mut self, input: ByteView, emit: &mut dyn FnMut(CodePoint)) {
        for cp in self.feed(input) {
            emit(cp);
        }
    }

    fn flush(&mut self, emit: &mut dyn FnMut(CodePoint)) {
        while let Some(cp) = finish(&mut self.state) {
            emit(cp);
        }
    }
}
