//! First-match template search.
//!
//! A search slides the template over every top-left offset at which it fits
//! entirely inside the source and reports at most one offset whose similarity
//! reaches the threshold. Similarity is the fraction of template pixels whose
//! absolute difference from the aligned source pixel is below the tolerance.
//!
//! Backends implement [`TemplateMatcher`]: the device kernel in
//! [`crate::gpu`] and the host reference in [`crate::kernel`].

use crate::geometry::Point;
use crate::image::GrayscaleMatrix;
use crate::trace::trace_warn;
use crate::util::{TriggerError, TriggerResult};

/// Per-pixel absolute difference below which two samples count as equal.
pub const PIXEL_TOLERANCE: f32 = 0.03;

/// Default similarity threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Policy deciding which offset wins when several reach the threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Whichever work-item publishes first wins. Not reproducible.
    FirstFound,
    /// The smallest row-major offset wins (lowest y, then lowest x).
    #[default]
    RowMajor,
}

/// Parameters of a single search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchParams {
    /// Minimum similarity in `[0, 1]`.
    pub threshold: f32,
    /// Per-pixel equality tolerance on normalized samples.
    pub tolerance: f32,
    /// Winner selection among qualifying offsets.
    pub tie_break: TieBreak,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            tolerance: PIXEL_TOLERANCE,
            tie_break: TieBreak::RowMajor,
        }
    }
}

impl MatchParams {
    /// Default parameters with a custom threshold.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

/// Outcome of one search call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    NotFound,
    /// Top-left offset of the matching window, in source pixels.
    FoundAt(Point),
}

impl MatchResult {
    pub fn is_found(&self) -> bool {
        matches!(self, MatchResult::FoundAt(_))
    }

    pub fn point(&self) -> Option<Point> {
        match self {
            MatchResult::FoundAt(point) => Some(*point),
            MatchResult::NotFound => None,
        }
    }
}

/// Range of candidate top-left offsets for one source/template pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchGrid {
    /// Number of candidate columns (`source.width - template.width + 1`).
    pub width: usize,
    /// Number of candidate rows (`source.height - template.height + 1`).
    pub height: usize,
}

impl SearchGrid {
    /// Total number of candidate offsets.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts a row-major candidate index to its offset.
    pub fn offset(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }
}

/// Checks the call contract and returns the candidate grid.
///
/// Both matrices must be non-empty, the template must fit inside the source
/// in both axes and the threshold must lie in `[0, 1]`.
pub fn validate_inputs(
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    params: &MatchParams,
) -> TriggerResult<SearchGrid> {
    if source.is_empty() {
        return Err(TriggerError::EmptyInput("source"));
    }
    if template.is_empty() {
        return Err(TriggerError::EmptyInput("template"));
    }
    if !(0.0..=1.0).contains(&params.threshold) {
        return Err(TriggerError::InvalidThreshold(params.threshold));
    }
    if !(params.tolerance > 0.0) {
        return Err(TriggerError::InvalidInput("tolerance must be positive"));
    }
    if template.width() > source.width() || template.height() > source.height() {
        return Err(TriggerError::TemplateTooLarge {
            template_width: template.width(),
            template_height: template.height(),
            source_width: source.width(),
            source_height: source.height(),
        });
    }
    Ok(SearchGrid {
        width: source.width() - template.width() + 1,
        height: source.height() - template.height() + 1,
    })
}

/// A backend able to locate the first template occurrence in a source.
///
/// Calls take `&mut self`: a matcher serves one search at a time and owns any
/// device state it needs.
pub trait TemplateMatcher {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Runs one search, reporting contract and device failures as errors.
    fn try_find_first_match(
        &mut self,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &MatchParams,
    ) -> TriggerResult<MatchResult>;

    /// Runs one search, degrading every failure to `NotFound`.
    ///
    /// The failure is logged as a warning; callers that need to tell a
    /// failure from a genuine miss use [`try_find_first_match`].
    ///
    /// [`try_find_first_match`]: TemplateMatcher::try_find_first_match
    fn find_first_match(
        &mut self,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &MatchParams,
    ) -> MatchResult {
        match self.try_find_first_match(source, template, params) {
            Ok(result) => result,
            Err(err) => {
                trace_warn!("{} search failed: {}", self.name(), err);
                MatchResult::NotFound
            }
        }
    }
}

impl<M: TemplateMatcher + ?Sized> TemplateMatcher for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn try_find_first_match(
        &mut self,
        source: &GrayscaleMatrix,
        template: &GrayscaleMatrix,
        params: &MatchParams,
    ) -> TriggerResult<MatchResult> {
        (**self).try_find_first_match(source, template, params)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_inputs, MatchParams, SearchGrid};
    use crate::image::GrayscaleMatrix;
    use crate::util::TriggerError;

    #[test]
    fn grid_counts_every_fitting_offset() {
        let source = GrayscaleMatrix::filled(100, 80, 0.0).unwrap();
        let template = GrayscaleMatrix::filled(10, 20, 0.0).unwrap();
        let grid = validate_inputs(&source, &template, &MatchParams::default()).unwrap();
        assert_eq!(grid, SearchGrid { width: 91, height: 61 });
        assert_eq!(grid.offset(91 + 5), (5, 1));
    }

    #[test]
    fn equal_sizes_have_one_candidate() {
        let source = GrayscaleMatrix::filled(8, 8, 0.5).unwrap();
        let grid = validate_inputs(&source, &source, &MatchParams::default()).unwrap();
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn rejects_contract_violations() {
        let source = GrayscaleMatrix::filled(8, 8, 0.0).unwrap();
        let wide = GrayscaleMatrix::filled(9, 2, 0.0).unwrap();
        let params = MatchParams::default();

        assert_eq!(
            validate_inputs(&source, &wide, &params).unwrap_err(),
            TriggerError::TemplateTooLarge {
                template_width: 9,
                template_height: 2,
                source_width: 8,
                source_height: 8,
            }
        );
        assert_eq!(
            validate_inputs(&GrayscaleMatrix::empty(), &source, &params).unwrap_err(),
            TriggerError::EmptyInput("source")
        );
        assert_eq!(
            validate_inputs(&source, &GrayscaleMatrix::empty(), &params).unwrap_err(),
            TriggerError::EmptyInput("template")
        );
        assert_eq!(
            validate_inputs(&source, &source, &MatchParams::with_threshold(1.5)).unwrap_err(),
            TriggerError::InvalidThreshold(1.5)
        );
    }
}
