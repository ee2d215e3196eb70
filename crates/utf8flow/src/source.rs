//! Chunk sources and the adaptive, usage-throttled pump.

use alloc::boxed::Box;
use core::{fmt, time::Duration};

use crate::{
    AdaptiveOptions, ByteView, Clock, ConfigError, FailureReport, FailureSink, OnceSignal,
    Output, PipelineError, RateController, Signal, SourceError, Step, Task, TracingSink,
};

/// A finite supply of bytes, read in chunks.
pub trait ChunkSource {
    /// Read at most `max` bytes. `Ok(None)` marks the end of the source.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying source.
    fn read_chunk(&mut self, max: usize) -> Result<Option<ByteView>, SourceError>;

    /// Total size in bytes, if known up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn read_chunk(&mut self, max: usize) -> Result<Option<ByteView>, SourceError> {
        (**self).read_chunk(max)
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

/// Chunks of an in-memory buffer. Every chunk aliases the buffer.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: ByteView,
    position: usize,
}

impl SliceSource {
    pub fn new(data: impl Into<ByteView>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }
}

impl ChunkSource for SliceSource {
    fn read_chunk(&mut self, max: usize) -> Result<Option<ByteView>, SourceError> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let end = self.data.len().min(self.position + max);
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        Ok(Some(chunk))
    }

    fn size_hint(&self) -> Option<u64> {
        u64::try_from(self.data.len()).ok()
    }
}

/// Chunks read from any [`std::io::Read`], e.g. a file or stdin.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    size_hint: Option<u64>,
}

#[cfg(feature = "std")]
impl<R: std::io::Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            size_hint: None,
        }
    }

    /// Advertise the total size, e.g. from file metadata.
    #[must_use]
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }
}

#[cfg(feature = "std")]
impl ReaderSource<std::fs::File> {
    /// Open `path`, taking the size hint from its metadata.
    ///
    /// # Errors
    ///
    /// If the file cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata().ok().map(|m| m.len());
        Ok(Self {
            reader: file,
            size_hint: size,
        })
    }
}

#[cfg(feature = "std")]
impl<R: std::io::Read> ChunkSource for ReaderSource<R> {
    fn read_chunk(&mut self, max: usize) -> Result<Option<ByteView>, SourceError> {
        let mut buf = bytes::BytesMut::zeroed(max);
        let n = loop {
            match self.reader.read(&mut buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        };
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(ByteView::new(buf.freeze())))
    }

    fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }
}

/// Snapshot passed to progress listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Bytes read from the source so far.
    pub bytes_consumed: u64,
    /// Total size of the source, if known.
    pub total: Option<u64>,
    /// Cycles run so far.
    pub cycles: u64,
    /// Realized usage fraction, once two cycles have run.
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Running,
    Ended,
    Failed,
}

/// Reads a [`ChunkSource`] in cycles, leaving idle gaps between them so that
/// time spent producing chunks stays near a target fraction of wall-clock
/// time.
///
/// Run time of a cycle covers everything connected downstream, since
/// outputs are pushed synchronously. Drive it with a
/// [`Scheduler`](crate::Scheduler) (it is a [`Task`]) or call
/// [`AdaptiveChunkSource::cycle`] directly.
///
/// Signals:
/// - `ended` fires once after the last chunk was pushed.
/// - `progress` fires after each chunk, or, with a progress threshold, at
///   most once per threshold-sized increment of consumed bytes. Bytes past
///   the last crossed threshold are not reported; read
///   [`AdaptiveChunkSource::bytes_consumed`] after `ended` for the total.
///
/// A read failure is reported to the failure sink and stops the source;
/// `ended` does not fire.
pub struct AdaptiveChunkSource<S, C> {
    source: S,
    clock: C,
    controller: RateController,
    chunk_size: usize,
    progress_threshold: Option<u64>,
    next_progress_at: u64,
    bytes_consumed: u64,
    output: Output<ByteView>,
    ended: OnceSignal,
    progress: Signal<Progress>,
    failure_sink: Box<dyn FailureSink>,
    state: SourceState,
}

impl<S, C> fmt::Debug for AdaptiveChunkSource<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveChunkSource")
            .field("controller", &self.controller)
            .field("chunk_size", &self.chunk_size)
            .field("bytes_consumed", &self.bytes_consumed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: ChunkSource, C: Clock> AdaptiveChunkSource<S, C> {
    /// # Errors
    ///
    /// Returns the validation error of `options`.
    pub fn new(source: S, clock: C, options: &AdaptiveOptions) -> Result<Self, ConfigError> {
        let controller = RateController::from_options(options)?;
        Ok(Self {
            source,
            clock,
            controller,
            chunk_size: options.chunk_size,
            progress_threshold: options.progress_threshold,
            next_progress_at: options.progress_threshold.unwrap_or(0),
            bytes_consumed: 0,
            output: Output::new(),
            ended: OnceSignal::new(),
            progress: Signal::new(),
            failure_sink: Box::new(TracingSink),
            state: SourceState::Running,
        })
    }

    /// Send failure reports to `sink` instead of the log.
    #[must_use]
    pub fn with_failure_sink(mut self, sink: impl FailureSink + 'static) -> Self {
        self.failure_sink = Box::new(sink);
        self
    }

    pub fn connect_output(&mut self, acceptor: impl FnMut(ByteView) + 'static) {
        self.output.connect(acceptor);
    }

    pub fn on_ended(&mut self, listener: impl FnOnce() + 'static) {
        self.ended.subscribe(listener);
    }

    pub fn on_progress(&mut self, listener: impl FnMut(&Progress) + 'static) {
        self.progress.subscribe(listener);
    }

    #[must_use]
    pub fn controller(&self) -> &RateController {
        &self.controller
    }

    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Whether the source has ended or failed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state != SourceState::Running
    }

    /// Run one cycle: read and push the next chunk, then return the idle gap
    /// the controller asks for. Returns `Step::Done` once the source is
    /// exhausted or has failed.
    pub fn cycle(&mut self) -> Step {
        let start = self.clock.now();
        self.cycle_from(start)
    }

    fn cycle_from(&mut self, start: Duration) -> Step {
        if self.state != SourceState::Running {
            return Step::Done;
        }
        match self.source.read_chunk(self.chunk_size) {
            Ok(Some(chunk)) => {
                self.bytes_consumed += chunk.len() as u64;
                if !chunk.is_empty() {
                    self.output.emit(chunk);
                }
            }
            Ok(None) => {
                self.end();
                return Step::Done;
            }
            Err(err) => {
                self.fail(err);
                return Step::Done;
            }
        }

        let run_time = self.clock.now().saturating_sub(start);
        let gap = self.controller.record(start, run_time);

        let due = match self.progress_threshold {
            None => true,
            Some(threshold) if self.bytes_consumed >= self.next_progress_at => {
                self.next_progress_at = (self.bytes_consumed / threshold + 1) * threshold;
                true
            }
            Some(_) => false,
        };
        if due {
            self.report_progress();
        }
        Step::Reschedule(gap)
    }

    fn report_progress(&mut self) {
        let progress = Progress {
            bytes_consumed: self.bytes_consumed,
            total: self.source.size_hint(),
            cycles: self.controller.cycles(),
            usage: self.controller.usage(),
        };
        self.progress.fire(&progress);
    }

    fn end(&mut self) {
        self.state = SourceState::Ended;
        tracing::info!(
            bytes = self.bytes_consumed,
            cycles = self.controller.cycles(),
            usage = self.controller.usage(),
            "chunk source ended"
        );
        self.ended.fire();
    }

    fn fail(&mut self, err: SourceError) {
        self.state = SourceState::Failed;
        self.failure_sink.report(FailureReport {
            origin: "AdaptiveChunkSource::cycle",
            error: PipelineError::Source(err),
        });
    }
}

impl<S: ChunkSource, C: Clock> Task for AdaptiveChunkSource<S, C> {
    fn run(&mut self, now: Duration) -> Step {
        self.cycle_from(now)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, string::ToString, vec, vec::Vec};
    use core::cell::RefCell;

    use super::*;
    use crate::{CollectingSink, ManualClock, Scheduler};

    struct FailingSource {
        chunks_before_failure: usize,
    }

    impl ChunkSource for FailingSource {
        fn read_chunk(&mut self, _max: usize) -> Result<Option<ByteView>, SourceError> {
            if self.chunks_before_failure == 0 {
                return Err(SourceError::Other("disk on fire".to_string()));
            }
            self.chunks_before_failure -= 1;
            Ok(Some(ByteView::from_static(b"ok")))
        }
    }

    fn options(chunk_size: usize) -> AdaptiveOptions {
        AdaptiveOptions {
            chunk_size,
            ..AdaptiveOptions::default()
        }
    }

    #[test]
    fn slice_source_chunks_alias_buffer() {
        let data = ByteView::from_static(b"abcdefg");
        let mut source = SliceSource::new(data.clone());
        let first = source.read_chunk(3).unwrap().unwrap();
        assert_eq!(first.as_bytes(), b"abc");
        assert_eq!(first.buffer().as_ptr(), data.buffer().as_ptr());
        assert_eq!(source.read_chunk(3).unwrap().unwrap().as_bytes(), b"def");
        assert_eq!(source.read_chunk(3).unwrap().unwrap().as_bytes(), b"g");
        assert_eq!(source.read_chunk(3).unwrap(), None);
        assert_eq!(source.size_hint(), Some(7));
    }

    #[test]
    fn pushes_all_chunks_then_ends_once() {
        let clock = ManualClock::new();
        let mut source =
            AdaptiveChunkSource::new(SliceSource::new(b"hello world".to_vec()), clock.clone(), &options(4))
                .unwrap();
        let chunks = Rc::new(RefCell::new(Vec::new()));
        let ended = Rc::new(RefCell::new(0));
        {
            let chunks = Rc::clone(&chunks);
            source.connect_output(move |c: ByteView| chunks.borrow_mut().push(c.as_bytes().to_vec()));
            let ended = Rc::clone(&ended);
            source.on_ended(move || *ended.borrow_mut() += 1);
        }

        let mut scheduler = Scheduler::new(clock);
        scheduler.spawn(source);
        assert_eq!(scheduler.run_until_idle(), 4);

        assert_eq!(
            *chunks.borrow(),
            vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]
        );
        assert_eq!(*ended.borrow(), 1);
    }

    #[test]
    fn progress_threshold_limits_reports() {
        let mut source = AdaptiveChunkSource::new(
            SliceSource::new(vec![b'x'; 100]),
            ManualClock::new(),
            &AdaptiveOptions {
                chunk_size: 10,
                progress_threshold: Some(25),
                ..AdaptiveOptions::default()
            },
        )
        .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            source.on_progress(move |p: &Progress| seen.borrow_mut().push(p.bytes_consumed));
        }
        while source.cycle() != Step::Done {}
        assert_eq!(*seen.borrow(), vec![30, 50, 80, 100]);
    }

    #[test]
    fn remainder_below_threshold_is_not_reported() {
        let mut source = AdaptiveChunkSource::new(
            SliceSource::new(vec![b'x'; 95]),
            ManualClock::new(),
            &AdaptiveOptions {
                chunk_size: 10,
                progress_threshold: Some(25),
                ..AdaptiveOptions::default()
            },
        )
        .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            source.on_progress(move |p: &Progress| seen.borrow_mut().push(p.bytes_consumed));
        }
        while source.cycle() != Step::Done {}
        // 90 and 95 share the 75..100 bucket with 80.
        assert_eq!(*seen.borrow(), vec![30, 50, 80]);
        assert_eq!(source.bytes_consumed(), 95);
        assert!(source.is_finished());
    }

    #[test]
    fn progress_without_threshold_fires_per_chunk() {
        let mut source = AdaptiveChunkSource::new(
            SliceSource::new(vec![0u8; 9]),
            ManualClock::new(),
            &options(4),
        )
        .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            source.on_progress(move |p: &Progress| seen.borrow_mut().push((p.bytes_consumed, p.total)));
        }
        while source.cycle() != Step::Done {}
        assert_eq!(*seen.borrow(), vec![(4, Some(9)), (8, Some(9)), (9, Some(9))]);
    }

    #[test]
    fn paces_to_target_usage() {
        let clock = ManualClock::new();
        let mut source = AdaptiveChunkSource::new(
            SliceSource::new(vec![0u8; 64 * 40]),
            clock.clone(),
            &AdaptiveOptions {
                target_usage_fraction: 0.25,
                chunk_size: 64,
                ..AdaptiveOptions::default()
            },
        )
        .unwrap();
        // Each chunk costs 3ms downstream.
        let work = clock.clone();
        source.connect_output(move |_| work.advance(Duration::from_millis(3)));
        let usage = Rc::new(RefCell::new(Vec::new()));
        {
            let usage = Rc::clone(&usage);
            source.on_progress(move |p: &Progress| usage.borrow_mut().push(p.usage));
        }

        let mut scheduler = Scheduler::new(clock.clone());
        scheduler.spawn(source);
        scheduler.run_until_idle();

        let usage = usage.borrow();
        assert_eq!(usage.len(), 40);
        let settled = usage[25].unwrap();
        assert!((settled - 0.25).abs() / 0.25 < 0.05, "usage {settled}");
        // 40 chunks of 3ms at 25% usage take about 480ms.
        let elapsed = clock.now().as_millis();
        assert!((450..=500).contains(&elapsed), "elapsed {elapsed}ms");
    }

    #[test]
    fn read_failure_is_reported_and_stops() {
        let sink = CollectingSink::new();
        let mut source = AdaptiveChunkSource::new(
            FailingSource {
                chunks_before_failure: 2,
            },
            ManualClock::new(),
            &options(8),
        )
        .unwrap()
        .with_failure_sink(sink.clone());
        let ended = Rc::new(RefCell::new(false));
        {
            let ended = Rc::clone(&ended);
            source.on_ended(move || *ended.borrow_mut() = true);
        }

        let mut scheduler = Scheduler::new(ManualClock::new());
        scheduler.spawn(source);
        assert_eq!(scheduler.run_until_idle(), 3);

        assert!(!*ended.borrow());
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].origin, "AdaptiveChunkSource::cycle");
        assert_eq!(
            reports[0].error,
            PipelineError::Source(SourceError::Other("disk on fire".to_string()))
        );
    }

    #[test]
    fn invalid_options_are_rejected() {
        let err = AdaptiveChunkSource::new(SliceSource::new(Vec::<u8>::new()), ManualClock::new(), &options(0))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroChunkSize);
    }
}
