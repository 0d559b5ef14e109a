//! Vertical shift oracles.
//!
//! An oracle compares a previous and a current luma image and reports how far
//! the content moved up, how sure it is, and a row in the current image where
//! the two images can be joined. Callers apply their own confidence threshold
//! and treat `None` as "no match".

mod block;
mod rows;

use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::{OracleConfig, OracleKind};

pub use block::BlockMatchEstimator;
pub use rows::RowSignatureEstimator;

/// Shifts within this many rows of the best candidate are not counted as
/// competing matches when judging ambiguity.
pub(crate) const NEIGHBOURHOOD_ROWS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapResult {
    /// Rows the content moved up between `prev` and `curr`.
    pub shift: i32,
    /// Self-reported certainty in `[0, 1]`.
    pub confidence: f32,
    /// Row in `curr` at which `curr` continues `prev`; the matching row in
    /// `prev` is `match_anchor_y + shift`.
    pub match_anchor_y: u32,
}

pub trait ShiftEstimator: Send + Sync {
    fn estimate(&self, prev: &GrayImage, curr: &GrayImage) -> Option<OverlapResult>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Build the oracle described by `config`.
pub fn from_config(config: &OracleConfig) -> Arc<dyn ShiftEstimator> {
    match config.kind {
        OracleKind::Rows => Arc::new(RowSignatureEstimator::from_config(config)),
        OracleKind::Block => Arc::new(BlockMatchEstimator::from_config(config)),
    }
}

/// Candidate score bookkeeping shared by the estimators: lower error is better.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub shift: i64,
    pub error: f32,
}

/// Best candidate and the best one not adjacent to it.
pub(crate) fn best_and_runner_up(candidates: &[Candidate]) -> Option<(Candidate, Option<Candidate>)> {
    let best = candidates
        .iter()
        .copied()
        .min_by(|a, b| a.error.total_cmp(&b.error))?;
    let runner_up = candidates
        .iter()
        .copied()
        .filter(|c| (c.shift - best.shift).abs() > NEIGHBOURHOOD_ROWS)
        .min_by(|a, b| a.error.total_cmp(&b.error));
    Some((best, runner_up))
}

/// How much better the best candidate is than its runner-up, in `[0, 1]`.
/// Zero when nothing else was tried or every candidate fits perfectly.
pub(crate) fn distinctness(best: Candidate, runner_up: Option<Candidate>) -> f32 {
    match runner_up {
        Some(r) if r.error > f32::EPSILON => (1.0 - best.error / r.error).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use image::GrayImage;

    /// Deterministic texture in which every row is distinct.
    pub fn page(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let h = (y.wrapping_mul(2_654_435_761) ^ (x / 4).wrapping_mul(40_503)).rotate_left(13);
            image::Luma([(h.wrapping_mul(97) >> 24) as u8])
        })
    }

    pub fn rows(src: &GrayImage, top: u32, height: u32) -> GrayImage {
        image::imageops::crop_imm(src, 0, top, src.width(), height).to_image()
    }
}
