//! UTF-8 encoding into output windows of bounded capacity.
//!
//! [`encode`] never writes past the end of the slice it is given. Bytes of a
//! code point that do not fit are queued in [`EncoderState`] and written,
//! in order, at the start of the next call before anything new.

use alloc::collections::VecDeque;
use core::num::NonZeroUsize;

use bytes::BytesMut;

use crate::{ByteView, CodePoint, ConfigError, EncodeError, EncoderOptions};

/// Bytes computed on an earlier call that did not fit in its output.
#[derive(Debug, Clone, Default)]
pub struct EncoderState {
    hold_bytes: VecDeque<u8>,
}

impl EncoderState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes waiting for output space.
    #[must_use]
    pub fn held(&self) -> usize {
        self.hold_bytes.len()
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.hold_bytes.is_empty()
    }
}

/// Result of [`flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flushed {
    /// Bytes written to the output by this call.
    pub written: usize,
    /// `true` once no held bytes remain.
    pub complete: bool,
}

#[allow(clippy::cast_possible_truncation)]
fn utf8_bytes(cp: CodePoint) -> ([u8; 4], usize) {
    let v = cp.value();
    let cont = |shift: u32| ((v >> shift) & 0x3F) as u8 | 0x80;
    match cp.utf8_len() {
        1 => ([v as u8, 0, 0, 0], 1),
        2 => ([(v >> 6) as u8 | 0xC0, cont(0), 0, 0], 2),
        3 => ([(v >> 12) as u8 | 0xE0, cont(6), cont(0), 0], 3),
        _ => ([(v >> 18) as u8 | 0xF0, cont(12), cont(6), cont(0)], 4),
    }
}

/// Encode `input` into `output`, draining held bytes first.
///
/// Returns the number of bytes written to `output`. Bytes that did not fit
/// are held and do not count; they appear in the output of a later call.
///
/// # Errors
///
/// [`EncodeError::ZeroCapacity`] if `output` is empty while there is
/// anything to write, since held bytes could then never drain.
pub fn encode(
    input: Option<CodePoint>,
    output: &mut [u8],
    state: &mut EncoderState,
) -> Result<usize, EncodeError> {
    if output.is_empty() && (input.is_some() || !state.is_drained()) {
        return Err(EncodeError::ZeroCapacity {
            pending: state.held() + input.map_or(0, CodePoint::utf8_len),
        });
    }

    let mut written = 0;
    while written < output.len() {
        let Some(byte) = state.hold_bytes.pop_front() else {
            break;
        };
        output[written] = byte;
        written += 1;
    }

    if let Some(cp) = input {
        let (bytes, len) = utf8_bytes(cp);
        for &byte in &bytes[..len] {
            if written < output.len() {
                output[written] = byte;
                written += 1;
            } else {
                state.hold_bytes.push_back(byte);
            }
        }
    }
    Ok(written)
}

/// Terminal call: drain held bytes into `output` without new input.
///
/// # Errors
///
/// [`EncodeError::ZeroCapacity`] if bytes are held and `output` is empty.
pub fn flush(output: &mut [u8], state: &mut EncoderState) -> Result<Flushed, EncodeError> {
    let written = encode(None, output, state)?;
    Ok(Flushed {
        written,
        complete: state.is_drained(),
    })
}

/// Encoder that packs code points into [`ByteView`] chunks of a fixed
/// capacity.
///
/// Every emitted chunk is exactly `capacity` bytes long except the last one
/// produced by a flush, which holds whatever remained.
#[derive(Debug)]
pub struct Utf8Encoder {
    capacity: NonZeroUsize,
    current: BytesMut,
    filled: usize,
    state: EncoderState,
}

impl Utf8Encoder {
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            current: BytesMut::zeroed(capacity.get()),
            filled: 0,
            state: EncoderState::new(),
        }
    }

    /// # Errors
    ///
    /// Returns the validation error of `options`.
    pub fn new(options: &EncoderOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let capacity =
            NonZeroUsize::new(options.output_capacity).ok_or(ConfigError::ZeroOutputCapacity)?;
        Ok(Self::with_capacity(capacity))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    #[must_use]
    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    /// Bytes written to the current chunk but not emitted yet.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.current[..self.filled]
    }

    fn write(&mut self, mut input: Option<CodePoint>, emit: &mut dyn FnMut(ByteView)) {
        loop {
            // `filled < capacity` holds here: a full chunk is emitted below
            // before the next iteration.
            let Ok(written) = encode(input.take(), &mut self.current[self.filled..], &mut self.state)
            else {
                unreachable!("output window is never empty");
            };
            self.filled += written;
            if self.filled == self.capacity.get() {
                let full =
                    core::mem::replace(&mut self.current, BytesMut::zeroed(self.capacity.get()));
                self.filled = 0;
                emit(ByteView::new(full.freeze()));
            }
            if self.state.is_drained() {
                break;
            }
        }
    }
}

impl crate::Transform for Utf8Encoder {
    type Input = CodePoint;
    type Output = ByteView;

    fn push(&mut self, input: CodePoint, emit: &mut dyn FnMut(ByteView)) {
        self.write(Some(input), emit);
    }

    fn flush(&mut self, emit: &mut dyn FnMut(ByteView)) {
        self.write(None, emit);
        if self.filled > 0 {
            let mut last =
                core::mem::replace(&mut self.current, BytesMut::zeroed(self.capacity.get()));
            last.truncate(self.filled);
            self.filled = 0;
            emit(ByteView::new(last.freeze()));
        }
    }
}
