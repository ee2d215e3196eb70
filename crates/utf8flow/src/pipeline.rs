//! Assembly of a whole transcode: source, decoder, encoder and sinks.

use alloc::{rc::Rc, vec::Vec};
use core::{
    cell::{Cell, RefCell},
    fmt,
    time::Duration,
};

use bytes::BytesMut;

use crate::{
    AdaptiveChunkSource, ByteView, ChunkSource, Clock, CodePoint, FailureReport, FailureSink,
    ManualClock, NodeHandle, PipelineError, PipelineOptions, Progress, Scheduler, SliceSource,
    Step, Task, TracingSink, Utf8Decoder, Utf8Encoder, report::reported,
};

/// Completion and failure state of a [`TranscodePipeline`]. Clones share the
/// same state and stay valid after the pipeline has been handed to a
/// scheduler.
#[derive(Debug, Clone, Default)]
pub struct PipelineStatus {
    finished: Rc<Cell<bool>>,
    failure: Rc<RefCell<Option<PipelineError>>>,
}

impl PipelineStatus {
    /// Whether the encoder has flushed its last chunk.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// The first failure reported by the pipeline, if any.
    #[must_use]
    pub fn failure(&self) -> Option<PipelineError> {
        self.failure.borrow().clone()
    }

    /// `Ok` once finished without failure.
    ///
    /// # Errors
    ///
    /// The reported failure. A pipeline that neither finished nor failed
    /// yields `Ok(false)`.
    pub fn result(&self) -> Result<bool, PipelineError> {
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self.is_finished()),
        }
    }
}

/// Accumulates every encoded chunk of a pipeline.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    bytes: Rc<RefCell<BytesMut>>,
}

impl Collector {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.borrow().is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.borrow().to_vec()
    }

    fn push(&self, chunk: &ByteView) {
        self.bytes.borrow_mut().extend_from_slice(chunk);
    }
}

/// Forwards reports and remembers the first one in the pipeline status.
struct StatusSink<F> {
    inner: F,
    status: PipelineStatus,
}

impl<F: FailureSink> FailureSink for StatusSink<F> {
    fn report(&mut self, report: FailureReport) {
        self.status
            .failure
            .borrow_mut()
            .get_or_insert_with(|| report.error.clone());
        self.inner.report(report);
    }
}

/// A chunk source feeding a UTF-8 decoder feeding a bounded-capacity UTF-8
/// encoder.
///
/// ```text
/// source --chunks--> decoder --code points--> encoder --chunks--> outputs
///   `ended` ---------> flush ----------------> flush ----> finished
/// ```
///
/// The pipeline is a [`Task`]; spawn it on a [`Scheduler`] sharing its clock,
/// or call [`TranscodePipeline::run_to_completion`].
///
/// # Examples
///
/// ```rust
/// use utf8flow::{ManualClock, PipelineOptions, SliceSource, TracingSink, TranscodePipeline};
///
/// let mut options = PipelineOptions::default();
/// options.source.chunk_size = 2;
/// options.encoder.output_capacity = 3;
///
/// let pipeline = TranscodePipeline::new(
///     SliceSource::new(b"Hello".to_vec()),
///     ManualClock::new(),
///     &options,
///     TracingSink,
/// )
/// .unwrap();
/// let collected = pipeline.collect();
/// let status = pipeline.run_to_completion();
/// assert_eq!(status.result(), Ok(true));
/// assert_eq!(collected.to_vec(), b"Hello");
/// ```
pub struct TranscodePipeline<S, C> {
    source: AdaptiveChunkSource<S, C>,
    decoder: NodeHandle<Utf8Decoder>,
    encoder: NodeHandle<Utf8Encoder>,
    clock: C,
    status: PipelineStatus,
}

impl<S, C> fmt::Debug for TranscodePipeline<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodePipeline")
            .field("source", &self.source)
            .field("decoder", &self.decoder)
            .field("encoder", &self.encoder)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<S, C> TranscodePipeline<S, C>
where
    S: ChunkSource + 'static,
    C: Clock + Clone + 'static,
{
    /// Validate `options` and wire the stages together.
    ///
    /// # Errors
    ///
    /// An invalid configuration, which is also reported to `sink` with
    /// origin `"TranscodePipeline::new"`.
    pub fn new(
        source: S,
        clock: C,
        options: &PipelineOptions,
        mut sink: impl FailureSink + 'static,
    ) -> Result<Self, PipelineError> {
        let built = options.validate().and_then(|()| {
            let source = AdaptiveChunkSource::new(source, clock.clone(), &options.source)?;
            let encoder = Utf8Encoder::new(&options.encoder)?;
            Ok((source, encoder))
        });
        let (source, encoder) = reported(&mut sink, "TranscodePipeline::new", built)?;

        let status = PipelineStatus::default();
        let mut source = source.with_failure_sink(StatusSink {
            inner: sink,
            status: status.clone(),
        });
        let decoder = NodeHandle::new(Utf8Decoder::new());
        let encoder = NodeHandle::new(encoder);

        source.connect_output(decoder.acceptor());
        source.on_ended(decoder.flusher());
        decoder.pipe(&encoder);
        let finished = Rc::clone(&status.finished);
        encoder.on_flushed(move || finished.set(true));

        Ok(Self {
            source,
            decoder,
            encoder,
            clock,
            status,
        })
    }

    /// Also deliver every decoded code point to `acceptor`.
    pub fn connect_code_points(&self, acceptor: impl FnMut(CodePoint) + 'static) {
        self.decoder.connect_output(acceptor);
    }

    /// Also deliver every encoded chunk to `acceptor`.
    pub fn connect_output(&self, acceptor: impl FnMut(ByteView) + 'static) {
        self.encoder.connect_output(acceptor);
    }

    /// Accumulate the encoded output in memory.
    #[must_use]
    pub fn collect(&self) -> Collector {
        let collector = Collector::default();
        let sink = collector.clone();
        self.connect_output(move |chunk| sink.push(&chunk));
        collector
    }

    pub fn on_progress(&mut self, listener: impl FnMut(&Progress) + 'static) {
        self.source.on_progress(listener);
    }

    /// Run `listener` once the last encoded chunk has been delivered.
    pub fn on_finished(&self, listener: impl FnOnce() + 'static) {
        self.encoder.on_flushed(listener);
    }

    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.status.clone()
    }

    /// Run to completion on a private scheduler driven by the pipeline's
    /// clock.
    pub fn run_to_completion(self) -> PipelineStatus {
        let status = self.status();
        let mut scheduler = Scheduler::new(self.clock.clone());
        scheduler.spawn(self);
        scheduler.run_until_idle();
        status
    }
}

impl<S, C> Task for TranscodePipeline<S, C>
where
    S: ChunkSource,
    C: Clock,
{
    fn run(&mut self, now: Duration) -> Step {
        self.source.run(now)
    }
}

/// Transcode an in-memory buffer on virtual time.
///
/// Pacing still applies but idle gaps are skipped instantly, so this
/// returns as fast as the codec runs.
///
/// # Errors
///
/// An invalid configuration.
pub fn transcode(
    input: impl Into<ByteView>,
    options: &PipelineOptions,
) -> Result<Vec<u8>, PipelineError> {
    let pipeline =
        TranscodePipeline::new(SliceSource::new(input), ManualClock::new(), options, TracingSink)?;
    let collected = pipeline.collect();
    pipeline.run_to_completion().result()?;
    Ok(collected.to_vec())
}
