//! Sequential reference scan.

use crate::geometry::Point;
use crate::image::GrayscaleMatrix;
use crate::kernel::window_similarity;
use crate::search::{MatchParams, MatchResult, SearchGrid};

/// Scans candidates in row-major order and stops at the first qualifying one.
///
/// A sequential scan satisfies both tie-break policies: the first offset
/// found is also the smallest row-major offset.
pub fn scan_first_match(
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    grid: SearchGrid,
    params: &MatchParams,
) -> MatchResult {
    for y in 0..grid.height {
        for x in 0..grid.width {
            if window_similarity(source, template, x, y, params, || false).is_some() {
                return MatchResult::FoundAt(Point::new(x as i32, y as i32));
            }
        }
    }
    MatchResult::NotFound
}

/// Returns every qualifying offset in row-major order.
///
/// Used to check first-match results against the full set of valid answers.
pub fn scan_all_matches(
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    grid: SearchGrid,
    params: &MatchParams,
) -> Vec<Point> {
    let mut hits = Vec::new();
    for y in 0..grid.height {
        for x in 0..grid.width {
            if window_similarity(source, template, x, y, params, || false).is_some() {
                hits.push(Point::new(x as i32, y as i32));
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::{scan_all_matches, scan_first_match};
    use crate::geometry::Point;
    use crate::image::GrayscaleMatrix;
    use crate::search::{validate_inputs, MatchParams, MatchResult};

    #[test]
    fn finds_block_at_last_offset() {
        let mut data = vec![0.0f32; 12 * 9];
        for y in 6..9 {
            for x in 9..12 {
                data[y * 12 + x] = 1.0;
            }
        }
        let source = GrayscaleMatrix::new(data, 12, 9).unwrap();
        let template = GrayscaleMatrix::filled(3, 3, 1.0).unwrap();
        let params = MatchParams::with_threshold(1.0);
        let grid = validate_inputs(&source, &template, &params).unwrap();
        assert_eq!(
            scan_first_match(&source, &template, grid, &params),
            MatchResult::FoundAt(Point::new(9, 6))
        );
    }

    #[test]
    fn all_matches_on_uniform_source_cover_grid() {
        let source = GrayscaleMatrix::filled(5, 4, 0.25).unwrap();
        let template = GrayscaleMatrix::filled(2, 2, 0.25).unwrap();
        let params = MatchParams::with_threshold(1.0);
        let grid = validate_inputs(&source, &template, &params).unwrap();
        let hits = scan_all_matches(&source, &template, grid, &params);
        assert_eq!(hits.len(), grid.len());
        assert_eq!(hits[0], Point::new(0, 0));
        assert_eq!(hits[hits.len() - 1], Point::new(3, 2));
    }
}
