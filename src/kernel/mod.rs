//! Host reference kernels for first-match search.
//!
//! These kernels mirror the device kernel pixel for pixel: the same
//! tolerance test, the same per-row pruning bound and the same tie-break
//! policies. They are the authoritative reference the device path is
//! validated against, and the backend of last resort when no compute adapter
//! exists.

use crate::image::GrayscaleMatrix;
use crate::search::{validate_inputs, MatchParams, MatchResult, TemplateMatcher};
use crate::trace::{trace_event, trace_span};
use crate::util::TriggerResult;
use std::time::Instant;

pub mod scalar;

#[cfg(feature = "rayon")]
pub mod rayon;

/// Scores the window whose top-left corner is `(x, y)`.
///
/// Returns the similarity when it reaches `params.threshold`, or `None` as
/// soon as the remaining rows can no longer lift it above the threshold.
/// `abandon` is polled after every row; returning `true` stops the window
/// early, which is how parallel scans cancel work once the search is decided.
pub fn window_similarity<F>(
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    x: usize,
    y: usize,
    params: &MatchParams,
    mut abandon: F,
) -> Option<f32>
where
    F: FnMut() -> bool,
{
    let tpl_width = template.width();
    let tpl_height = template.height();
    let total = (tpl_width * tpl_height) as f32;
    let src = source.as_slice();
    let tpl = template.as_slice();
    let src_width = source.width();

    let mut matches = 0usize;
    for ty in 0..tpl_height {
        let src_row = &src[(y + ty) * src_width + x..][..tpl_width];
        let tpl_row = &tpl[ty * tpl_width..][..tpl_width];
        matches += src_row
            .iter()
            .zip(tpl_row)
            .filter(|(s, t)| (**s - **t).abs() < params.tolerance)
            .count();

        if abandon() {
            return None;
        }
        let remaining = (tpl_height - ty - 1) * tpl_width;
        if ((matches + remaining) as f32) / total < params.threshold {
            return None;
        }
    }

    let similarity = matches as f32 / total;
    (similarity >= params.threshold).then_some(similarity)
}

/// Host matcher running the reference kernels.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuMatcher {
    parallel: bool,
}

impl CpuMatcher {
    /// Creates a sequential matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the work-stealing scan when the `rayon` feature is compiled in.
    ///
    /// Without the feature the flag is ignored and scans stay sequential.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel && cfg!(feature = "rayon")
    }
}

impl TemplateMatcher for CpuMatcher {
    fn name(&self) -> &'static str {
        if self.is_parallel() {
            "cpu-parallel"
        } else {
            "cpu"
        }
    }

    fn try_find_first_match(
        &mut self,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &MatchParams,
    ) -> TriggerResult<MatchResult> {
        let grid = validate_inputs(source, template, params)?;
        let _span = trace_span!("cpu_search", candidates = grid.len()).entered();
        let started = Instant::now();

        #[cfg(feature = "rayon")]
        let result = if self.parallel {
            self::rayon::scan_first_match_par(source, template, grid, params)
        } else {
            scalar::scan_first_match(source, template, grid, params)
        };
        #[cfg(not(feature = "rayon"))]
        let result = scalar::scan_first_match(source, template, grid, params);

        trace_event!(
            "cpu_search_done",
            found = result.is_found(),
            elapsed_us = started.elapsed().as_micros() as u64
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::window_similarity;
    use crate::image::GrayscaleMatrix;
    use crate::search::MatchParams;

    fn source_with_block() -> GrayscaleMatrix {
        let mut data = vec![0.0f32; 20 * 20];
        for y in 5..9 {
            for x in 3..7 {
                data[y * 20 + x] = 1.0;
            }
        }
        GrayscaleMatrix::new(data, 20, 20).unwrap()
    }

    #[test]
    fn exact_window_scores_one() {
        let source = source_with_block();
        let template = GrayscaleMatrix::filled(4, 4, 1.0).unwrap();
        let params = MatchParams::with_threshold(1.0);
        let score = window_similarity(&source, &template, 3, 5, &params, || false);
        assert_eq!(score, Some(1.0));
    }

    #[test]
    fn shifted_window_is_pruned() {
        let source = source_with_block();
        let template = GrayscaleMatrix::filled(4, 4, 1.0).unwrap();
        let params = MatchParams::with_threshold(0.9);
        assert_eq!(
            window_similarity(&source, &template, 4, 5, &params, || false),
            None
        );
    }

    #[test]
    fn pruning_stops_after_first_hopeless_row() {
        let source = GrayscaleMatrix::filled(10, 10, 0.0).unwrap();
        let template = GrayscaleMatrix::filled(4, 4, 1.0).unwrap();
        let params = MatchParams::with_threshold(0.9);
        let mut rows_seen = 0;
        let score = window_similarity(&source, &template, 0, 0, &params, || {
            rows_seen += 1;
            false
        });
        assert_eq!(score, None);
        assert_eq!(rows_seen, 1);
    }

    #[test]
    fn abandon_flag_cancels_window() {
        let source = source_with_block();
        let template = GrayscaleMatrix::filled(4, 4, 1.0).unwrap();
        let params = MatchParams::with_threshold(1.0);
        assert_eq!(
            window_similarity(&source, &template, 3, 5, &params, || true),
            None
        );
    }

    #[test]
    fn tolerance_accepts_near_samples() {
        let source = GrayscaleMatrix::filled(4, 4, 0.52).unwrap();
        let template = GrayscaleMatrix::filled(4, 4, 0.5).unwrap();
        let params = MatchParams::with_threshold(1.0);
        assert_eq!(
            window_similarity(&source, &template, 0, 0, &params, || false),
            Some(1.0)
        );
    }
}
