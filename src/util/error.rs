//! Error types for glyphtrigger.

use thiserror::Error;

/// Result alias for glyphtrigger operations.
pub type TriggerResult<T> = std::result::Result<T, TriggerError>;

/// Errors that can occur while normalizing, matching, capturing or acting.
///
/// Variants carry plain data so they can be compared in tests; device and
/// platform errors are flattened to their display text.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TriggerError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A width or height is zero or overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A buffer does not hold exactly `width * height` samples.
    #[error("buffer length mismatch: needed {needed}, got {got}")]
    BufferLength { needed: usize, got: usize },
    /// A matrix taking part in a match call is empty.
    #[error("empty {0} matrix")]
    EmptyInput(&'static str),
    /// The template does not fit inside the source.
    #[error(
        "template {template_width}x{template_height} larger than source {source_width}x{source_height}"
    )]
    TemplateTooLarge {
        template_width: usize,
        template_height: usize,
        source_width: usize,
        source_height: usize,
    },
    /// The similarity threshold lies outside `[0, 1]`.
    #[error("threshold {0} outside [0, 1]")]
    InvalidThreshold(f32),
    /// No compute adapter is visible at all.
    #[error("no compute adapter available")]
    NoAdapter,
    /// Adapters exist but none of the accepted classes produced a device.
    #[error("no adapter of the requested classes could bind a device")]
    NoDevice,
    /// The match kernel failed to compile; `log` holds the compiler output.
    #[error("kernel build failed: {log}")]
    KernelBuild { log: String },
    /// An upload exceeds the device's storage binding limit.
    #[error("buffer of {size} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge { size: u64, limit: u64 },
    /// Submission or execution of the match kernel failed.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
    /// The result slot could not be read back.
    #[error("result readback failed: {0}")]
    Readback(String),
    /// The requested monitor does not exist.
    #[error("monitor {index} out of range ({count} available)")]
    MonitorOutOfRange { index: usize, count: usize },
    /// The capture rectangle lies entirely outside the monitor.
    #[error("capture region outside monitor bounds")]
    RegionOutOfBounds,
    /// The screen-capture primitive failed.
    #[error("capture failed: {0}")]
    Capture(String),
    /// The input-injection primitive failed.
    #[error("input injection failed: {0}")]
    Action(String),
    /// Loading or decoding an image failed.
    #[error("image io failed: {reason}")]
    ImageIo { reason: String },
    /// The detection worker thread could not be started or panicked.
    #[error("worker thread failed: {0}")]
    Worker(String),
}
