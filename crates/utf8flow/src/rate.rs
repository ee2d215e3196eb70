use core::time::Duration;

use crate::{AdaptiveOptions, ConfigError};

fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn ema(average: Option<f64>, sample: f64, alpha: f64) -> f64 {
    match average {
        Some(avg) => avg * (1.0 - alpha) + sample * alpha,
        None => sample,
    }
}

/// Feedback controller that spaces out work to hit a target usage fraction.
///
/// After each cycle the controller is told when the cycle started and how
/// long it ran. It keeps exponential moving averages of the run time and of
/// the realized start-to-start interval, and answers with the idle gap to
/// leave before the next cycle:
///
/// ```text
/// next_gap = avg_run / target - avg_run
/// ```
///
/// so that run time makes up `target` of each run + idle period. The ratio
/// `avg_run / avg_interval` is the realized usage.
#[derive(Debug, Clone, PartialEq)]
pub struct RateController {
    average_run_time: Option<f64>,
    average_interval: Option<f64>,
    smoothing_factor: f64,
    target_usage_fraction: f64,
    last_cycle_start: Option<Duration>,
    cycles: u64,
}

impl RateController {
    /// # Errors
    ///
    /// If either fraction is outside `(0, 1]`.
    pub fn new(target_usage_fraction: f64, smoothing_factor: f64) -> Result<Self, ConfigError> {
        Self::from_options(&AdaptiveOptions {
            target_usage_fraction,
            smoothing_factor,
            ..AdaptiveOptions::default()
        })
    }

    /// # Errors
    ///
    /// Returns the validation error of `options`.
    pub fn from_options(options: &AdaptiveOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            average_run_time: None,
            average_interval: None,
            smoothing_factor: options.smoothing_factor,
            target_usage_fraction: options.target_usage_fraction,
            last_cycle_start: None,
            cycles: 0,
        })
    }

    /// Record a finished cycle and return the idle gap before the next one.
    pub fn record(&mut self, start: Duration, run_time: Duration) -> Duration {
        let alpha = self.smoothing_factor;
        let run_ms = as_millis_f64(run_time);
        let average_run = ema(self.average_run_time, run_ms, alpha);
        self.average_run_time = Some(average_run);

        if let Some(last) = self.last_cycle_start {
            let interval_ms = as_millis_f64(start.saturating_sub(last));
            self.average_interval = Some(ema(self.average_interval, interval_ms, alpha));
        }
        self.last_cycle_start = Some(start);
        self.cycles += 1;

        let next_ms = (average_run / self.target_usage_fraction - average_run).max(0.0);
        tracing::debug!(
            cycle = self.cycles,
            run_ms,
            average_run_ms = average_run,
            average_interval_ms = self.average_interval,
            next_ms,
            "rate controller cycle"
        );
        // Fails only on overflow.
        Duration::try_from_secs_f64(next_ms / 1000.0).unwrap_or(Duration::MAX)
    }

    /// Smoothed run time per cycle, in milliseconds.
    #[must_use]
    pub fn average_run_time(&self) -> Option<f64> {
        self.average_run_time
    }

    /// Smoothed start-to-start interval, in milliseconds. Needs two cycles.
    #[must_use]
    pub fn average_interval(&self) -> Option<f64> {
        self.average_interval
    }

    /// Realized usage fraction, `average_run_time / average_interval`.
    #[must_use]
    pub fn usage(&self) -> Option<f64> {
        let interval = self.average_interval?;
        let run = self.average_run_time?;
        (interval > 0.0).then(|| run / interval)
    }

    #[must_use]
    pub fn target_usage_fraction(&self) -> f64 {
        self.target_usage_fraction
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
