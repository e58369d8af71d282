//! glyphtrigger watches a screen region for a small reference glyph and fires
//! a click/keystroke sequence once it appears.
//!
//! The core is a brute-force first-match template search that runs one
//! work-item per candidate offset on a compute device (through `wgpu`), with
//! per-row pruning and cooperative early exit once a match is published. A
//! host reference matcher implements the same semantics on the CPU,
//! optionally parallelized with the `rayon` feature.
//!
//! Around it sits a polling [`DetectionLoop`] that re-captures the watched
//! region until every stage of a [`DetectionPlan`] has matched, then invokes
//! an [`ActionTrigger`]. Screen capture and input injection are traits; the
//! `desktop` feature provides `xcap` and `enigo` backed implementations.
//!
//! ```no_run
//! use glyphtrigger::{GpuMatcher, GrayscaleMatrix, MatchParams, TemplateMatcher};
//!
//! let source = GrayscaleMatrix::filled(100, 100, 0.0)?;
//! let template = GrayscaleMatrix::filled(10, 10, 0.0)?;
//! let mut matcher = GpuMatcher::default();
//! let result = matcher.try_find_first_match(&source, &template, &MatchParams::default())?;
//! println!("{result:?}");
//! # Ok::<(), glyphtrigger::TriggerError>(())
//! ```

mod trace;

pub mod action;
pub mod capture;
pub mod detect;
pub mod geometry;
pub mod gpu;
pub mod image;
pub mod kernel;
pub mod search;
pub mod util;

pub use action::{input_sequence, ActionTrigger, InputStep};
pub use capture::{crop_region, ScreenCapture};
pub use detect::{
    DetectionLoop, DetectionOutcome, DetectionPlan, DetectionWorker, LoopLimits, LoopState,
    Stage, StopHandle,
};
pub use geometry::{Point, Rectangle};
pub use gpu::{DeviceManager, DevicePreference, GpuMatcher};
pub use crate::image::io::{load_image, load_template};
pub use crate::image::{normalize, GrayscaleMatrix};
pub use kernel::CpuMatcher;
pub use search::{
    validate_inputs, MatchParams, MatchResult, SearchGrid, TemplateMatcher, TieBreak,
    DEFAULT_THRESHOLD, PIXEL_TOLERANCE,
};
pub use util::{TriggerError, TriggerResult};

#[cfg(feature = "desktop")]
pub use action::EnigoTrigger;
#[cfg(feature = "desktop")]
pub use capture::XcapCapture;
