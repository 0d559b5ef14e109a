use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use longshot_common::config::DebtPolicy;
use longshot_common::shift::ShiftEstimator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StitchError;
use crate::range::Range;

/// Why a seam was left at full height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCause {
    /// The oracle returned nothing.
    OracleUnavailable,
    /// The oracle was not confident enough.
    LowConfidence,
    /// The reported cut does not fall inside the chunks it joins.
    OutOfBounds,
}

/// A seam between chunk `pair` and chunk `pair + 1` that needs manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedPair {
    pub pair: usize,
    pub cause: RejectCause,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// One range per chunk, in capture order.
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub flagged: Vec<FlaggedPair>,
    /// Redundant rows no earlier chunk could absorb.
    #[serde(default)]
    pub dropped_debt: i64,
    /// Height of every chunk the ranges were resolved for.
    #[serde(default)]
    pub chunk_heights: Vec<u32>,
}

impl Resolution {
    /// Whether these ranges were resolved for exactly `images`, judged by
    /// chunk count and heights.
    pub fn fits(&self, images: &[RgbaImage]) -> bool {
        self.ranges.len() == images.len()
            && self.chunk_heights.len() == images.len()
            && self.chunk_heights.iter().zip(images).all(|(h, image)| *h == image.height())
    }
}

/// Accepted cut between two consecutive chunks.
#[derive(Debug, Clone, Copy)]
struct Cut {
    /// First row of the lower chunk that is kept.
    top: i64,
    /// Row of the upper chunk at which it stops.
    bottom: i64,
}

/// Computes the retained row range of every chunk.
///
/// Pass 1 asks the oracle about each consecutive pair and moves the seam to
/// the reported match. A rejected pair keeps both chunks whole: a duplicated
/// seam is preferred over a guessed one, and the pair is flagged for review.
///
/// Pass 2 walks the chunks in order. A chunk whose range went negative is
/// entirely covered by its neighbours; it collapses to zero height and the
/// overshoot is taken out of earlier chunks, nearest first.
#[derive(Clone)]
pub struct RangeResolver {
    estimator: Arc<dyn ShiftEstimator>,
    accept_confidence: f32,
    debt_policy: DebtPolicy,
}

impl RangeResolver {
    pub fn new(estimator: Arc<dyn ShiftEstimator>, accept_confidence: f32, debt_policy: DebtPolicy) -> Self {
        Self {
            estimator,
            accept_confidence,
            debt_policy,
        }
    }

    pub fn calculate_ranges(&self, images: &[RgbaImage]) -> Result<Resolution, StitchError> {
        let ranges = images.iter().map(|image| Range::full(image.height())).collect();
        self.resolve_from(images, ranges)
    }

    /// Run both passes starting from `ranges` instead of full heights.
    pub fn resolve_from(&self, images: &[RgbaImage], mut ranges: Vec<Range>) -> Result<Resolution, StitchError> {
        if images.is_empty() {
            return Err(StitchError::InsufficientContent("no chunks to resolve".into()));
        }
        if images.len() != ranges.len() {
            return Err(StitchError::RangeCountMismatch {
                images: images.len(),
                ranges: ranges.len(),
            });
        }

        let luma: Vec<GrayImage> = images.iter().map(|image| image::imageops::grayscale(image)).collect();
        let mut flagged = Vec::new();
        for (pair, window) in luma.windows(2).enumerate() {
            match self.detect_cut(&window[0], &window[1]) {
                Ok(cut) => {
                    debug!(pair, top = cut.top, bottom = cut.bottom, "seam accepted");
                    ranges[pair].end = cut.bottom;
                    ranges[pair + 1].start = cut.top;
                }
                Err(cause) => {
                    warn!(pair, ?cause, oracle = self.estimator.name(), "seam kept at full height");
                    flagged.push(FlaggedPair { pair, cause });
                }
            }
        }

        let dropped_debt = propagate_debt(&mut ranges, self.debt_policy)?;
        info!(
            chunks = images.len(),
            flagged = flagged.len(),
            dropped_debt,
            retained = ranges.iter().map(Range::retained).sum::<i64>(),
            "ranges resolved"
        );
        Ok(Resolution {
            ranges,
            flagged,
            dropped_debt,
            chunk_heights: images.iter().map(|image| image.height()).collect(),
        })
    }

    fn detect_cut(&self, upper: &GrayImage, lower: &GrayImage) -> Result<Cut, RejectCause> {
        let Some(result) = self.estimator.estimate(upper, lower) else {
            return Err(RejectCause::OracleUnavailable);
        };
        if result.confidence <= self.accept_confidence {
            debug!(
                confidence = result.confidence,
                accept = self.accept_confidence,
                "oracle below acceptance"
            );
            return Err(RejectCause::LowConfidence);
        }

        // `top` is a row of the lower chunk and `top + shift` the matching
        // row of the upper one; both must land inside their chunk.
        let height = upper.height() as i64;
        let top = result.match_anchor_y as i64;
        let shift = result.shift as i64;
        if top >= height || top + shift <= 0 || top > lower.height() as i64 {
            debug!(shift, top, height, lower_height = lower.height(), "cut outside chunk bounds");
            return Err(RejectCause::OutOfBounds);
        }
        Ok(Cut {
            top,
            bottom: (top + shift).min(height),
        })
    }
}

/// Collapse eclipsed ranges and charge their overshoot to earlier ranges.
///
/// Returns the number of rows that could not be absorbed when `policy` is
/// [`DebtPolicy::Drop`]. Afterwards no range has negative height.
pub fn propagate_debt(ranges: &mut [Range], policy: DebtPolicy) -> Result<i64, StitchError> {
    let mut dropped = 0;
    for index in 1..ranges.len() {
        let Range { start, end } = ranges[index];
        if end >= start {
            continue;
        }
        let mut debt = start - end;
        ranges[index] = Range::new(end, end);
        debug!(index, debt, "chunk eclipsed by neighbours");

        for p in (0..index).rev() {
            let h = ranges[p].retained();
            if h > debt {
                ranges[p].end -= debt;
                debt = 0;
                break;
            }
            ranges[p].end = ranges[p].start;
            debt -= h;
            if debt == 0 {
                break;
            }
        }

        if debt > 0 {
            match policy {
                DebtPolicy::Drop => {
                    warn!(index, debt, "redundant rows exceed earlier chunks, dropping remainder");
                    dropped += debt;
                }
                DebtPolicy::Fail => return Err(StitchError::UnabsorbedDebt { index, debt }),
            }
        }
    }
    Ok(dropped)
}
