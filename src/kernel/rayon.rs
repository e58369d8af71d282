//! Rayon-parallel first-match scan (feature-gated).
//!
//! Candidates are spread over the thread pool the way the device kernel
//! spreads them over work-items. `find_first` and `find_any` give the two
//! tie-break policies; both stop scheduling new candidates once the answer is
//! settled, and windows already in flight poll the shared flag after every
//! row.

use crate::geometry::Point;
use crate::image::GrayscaleMatrix;
use crate::kernel::window_similarity;
use crate::search::{MatchParams, MatchResult, SearchGrid, TieBreak};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Parallel counterpart of [`crate::kernel::scalar::scan_first_match`].
pub fn scan_first_match_par(
    source: &GrayscaleMatrix,
    template: &GrayscaleMatrix,
    grid: SearchGrid,
    params: &MatchParams,
) -> MatchResult {
    let index = match params.tie_break {
        TieBreak::FirstFound => {
            let found = AtomicBool::new(false);
            (0..grid.len()).into_par_iter().find_any(|&idx| {
                let (x, y) = grid.offset(idx);
                let hit = window_similarity(source, template, x, y, params, || {
                    found.load(Ordering::Relaxed)
                })
                .is_some();
                if hit {
                    found.store(true, Ordering::Relaxed);
                }
                hit
            })
        }
        TieBreak::RowMajor => {
            let best = AtomicUsize::new(usize::MAX);
            (0..grid.len()).into_par_iter().find_first(|&idx| {
                let (x, y) = grid.offset(idx);
                let hit = window_similarity(source, template, x, y, params, || {
                    best.load(Ordering::Relaxed) < idx
                })
                .is_some();
                if hit {
                    best.fetch_min(idx, Ordering::Relaxed);
                }
                hit
            })
        }
    };

    match index {
        Some(idx) => {
            let (x, y) = grid.offset(idx);
            MatchResult::FoundAt(Point::new(x as i32, y as i32))
        }
        None => MatchResult::NotFound,
    }
}
