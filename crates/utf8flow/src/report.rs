use alloc::{rc::Rc, vec::Vec};
use core::cell::RefCell;

use crate::PipelineError;

/// A failure that aborted a pipeline or one of its stages.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    /// The operation that failed, e.g. `"TranscodePipeline::new"`.
    pub origin: &'static str,
    pub error: PipelineError,
}

/// Receiver of structured failure reports.
///
/// Components never recover from what they report; the report accompanies
/// an error returned to the caller or the end of a scheduled task.
pub trait FailureSink {
    fn report(&mut self, report: FailureReport);
}

impl<S: FailureSink + ?Sized> FailureSink for alloc::boxed::Box<S> {
    fn report(&mut self, report: FailureReport) {
        (**self).report(report);
    }
}

/// Logs each report at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&mut self, report: FailureReport) {
        tracing::error!(origin = report.origin, error = %report.error, "pipeline failure");
    }
}

/// Keeps every report; clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    reports: Rc<RefCell<Vec<FailureReport>>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.borrow().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl FailureSink for CollectingSink {
    fn report(&mut self, report: FailureReport) {
        tracing::error!(origin = report.origin, error = %report.error, "pipeline failure");
        self.reports.borrow_mut().push(report);
    }
}

/// Report the error of `result`, if any, and pass it on.
pub(crate) fn reported<T, E>(
    sink: &mut dyn FailureSink,
    origin: &'static str,
    result: Result<T, E>,
) -> Result<T, PipelineError>
where
    E: Into<PipelineError>,
{
    result.map_err(|err| {
        let error = err.into();
        sink.report(FailureReport {
            origin,
            error: error.clone(),
        });
        error
    })
}
