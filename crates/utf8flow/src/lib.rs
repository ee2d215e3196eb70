//! Streaming UTF-8 transcoding driven by an adaptive, usage-throttled chunk
//! source.
//!
//! The crate is organised as a small push pipeline:
//!
//! ```text
//! AdaptiveChunkSource -> Utf8Decoder -> Utf8Encoder -> output buffer
//! ```
//!
//! - [`decode`] turns arbitrarily split [`ByteView`]s into [`CodePoint`]s,
//!   resuming multi-byte sequences across chunk boundaries.
//! - [`encode`] writes code points into output slices of bounded capacity,
//!   holding back bytes that do not fit.
//! - [`AdaptiveChunkSource`] reads a finite [`ChunkSource`] in cycles and
//!   inserts idle gaps so that measured run time stays near a target fraction
//!   of wall-clock time.
//!
//! All of it runs on a single-threaded cooperative [`Scheduler`].
//!
//! ```rust
//! use utf8flow::{ByteView, CodePoint, DecoderState, decode, finish};
//!
//! let mut state = DecoderState::new();
//! let mut out = Vec::new();
//! for chunk in [&[0xE2][..], &[0x82, 0xAC][..]] {
//!     let mut input = Some(ByteView::copy_from_slice(chunk));
//!     while let Some(cp) = decode(input.take(), &mut state) {
//!         out.push(cp);
//!     }
//! }
//! assert_eq!(finish(&mut state), None);
//! assert_eq!(out, vec![CodePoint::from('€')]);
//! ```

#![no_std]
#![allow(missing_docs)]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod byte_view;
mod chunk_utils;
mod code_point;
mod decoder;
mod encoder;
mod error;
mod node;
mod options;
mod pipeline;
mod rate;
mod report;
mod scheduler;
mod source;

#[cfg(test)]
mod tests;

pub use byte_view::ByteView;
#[doc(hidden)]
pub use chunk_utils::{produce_chunks, split_at_offsets};
pub use code_point::{CodePoint, MAX_CODE_POINT, REPLACEMENT_CHARACTER};
pub use decoder::{DecoderState, Drain, Finished, Utf8Decoder, decode, finish};
pub use encoder::{EncoderState, Flushed, Utf8Encoder, encode, flush};
pub use error::{ConfigError, EncodeError, PipelineError, SourceError};
pub use node::{Node, NodeHandle, OnceSignal, Output, Signal, Transform};
pub use options::{AdaptiveOptions, EncoderOptions, PipelineOptions};
pub use pipeline::{Collector, PipelineStatus, TranscodePipeline, transcode};
pub use rate::RateController;
pub use report::{CollectingSink, FailureReport, FailureSink, TracingSink};
#[cfg(feature = "std")]
pub use scheduler::SystemClock;
pub use scheduler::{Clock, ManualClock, Scheduler, Step, Task, TaskId};
#[cfg(feature = "std")]
pub use source::ReaderSource;
pub use source::{AdaptiveChunkSource, ChunkSource, Progress, SliceSource};
