/// Pacing options of an [`AdaptiveChunkSource`](crate::AdaptiveChunkSource).
///
/// # Examples
///
/// ```rust
/// use utf8flow::AdaptiveOptions;
///
/// let options = AdaptiveOptions {
///     target_usage_fraction: 0.25,
///     progress_threshold: Some(1 << 20),
///     ..Default::default()
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdaptiveOptions {
    /// Fraction of wall-clock time the source may spend producing chunks
    /// (including everything downstream of it).
    ///
    /// # Default
    ///
    /// `0.5`
    pub target_usage_fraction: f64,

    /// Weight of the newest sample in the run-time and interval moving
    /// averages. `1.0` disables smoothing.
    ///
    /// # Default
    ///
    /// `0.25`
    pub smoothing_factor: f64,

    /// Report progress at most once per this many consumed bytes instead of
    /// once per chunk.
    ///
    /// # Default
    ///
    /// `None`
    pub progress_threshold: Option<u64>,

    /// Maximum number of bytes read per cycle.
    ///
    /// # Default
    ///
    /// `65536`
    pub chunk_size: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            target_usage_fraction: 0.5,
            smoothing_factor: 0.25,
            progress_threshold: None,
            chunk_size: 64 * 1024,
        }
    }
}

impl AdaptiveOptions {
    /// # Errors
    ///
    /// Returns the first field that is out of range.
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        use crate::ConfigError;

        if !(self.target_usage_fraction > 0.0 && self.target_usage_fraction <= 1.0) {
            return Err(ConfigError::TargetUsageOutOfRange(
                self.target_usage_fraction,
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(ConfigError::SmoothingOutOfRange(self.smoothing_factor));
        }
        if self.progress_threshold == Some(0) {
            return Err(ConfigError::ZeroProgressThreshold);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}

/// Options of a [`Utf8Encoder`](crate::Utf8Encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncoderOptions {
    /// Size of every emitted output chunk except the last.
    ///
    /// # Default
    ///
    /// `4096`
    pub output_capacity: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            output_capacity: 4096,
        }
    }
}

impl EncoderOptions {
    /// # Errors
    ///
    /// [`ConfigError::ZeroOutputCapacity`](crate::ConfigError::ZeroOutputCapacity)
    /// if the capacity is zero.
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        if self.output_capacity == 0 {
            return Err(crate::ConfigError::ZeroOutputCapacity);
        }
        Ok(())
    }
}

/// Options of a whole [`TranscodePipeline`](crate::TranscodePipeline).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineOptions {
    /// Pacing of the input side.
    pub source: AdaptiveOptions,
    /// Output chunking.
    pub encoder: EncoderOptions,
}

impl PipelineOptions {
    /// # Errors
    ///
    /// Returns the first invalid field of either component.
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        self.source.validate()?;
        self.encoder.validate()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::ConfigError;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(PipelineOptions::default().validate(), Ok(()));
    }

    #[rstest]
    #[case(AdaptiveOptions { target_usage_fraction: 0.0, ..Default::default() }, ConfigError::TargetUsageOutOfRange(0.0))]
    #[case(AdaptiveOptions { target_usage_fraction: 1.5, ..Default::default() }, ConfigError::TargetUsageOutOfRange(1.5))]
    #[case(AdaptiveOptions { smoothing_factor: 0.0, ..Default::default() }, ConfigError::SmoothingOutOfRange(0.0))]
    #[case(AdaptiveOptions { progress_threshold: Some(0), ..Default::default() }, ConfigError::ZeroProgressThreshold)]
    #[case(AdaptiveOptions { chunk_size: 0, ..Default::default() }, ConfigError::ZeroChunkSize)]
    fn invalid_adaptive_options(#[case] options: AdaptiveOptions, #[case] expected: ConfigError) {
        assert_eq!(options.validate(), Err(expected));
    }

    #[test]
    fn nan_is_rejected() {
        let options = AdaptiveOptions {
            smoothing_factor: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::SmoothingOutOfRange(_))
        ));
    }

    #[test]
    fn full_usage_is_allowed() {
        let options = AdaptiveOptions {
            target_usage_fraction: 1.0,
            smoothing_factor: 1.0,
            ..Default::default()
        };
        assert_eq!(options.validate(), Ok(()));
    }
}
