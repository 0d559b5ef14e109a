use image::GrayImage;
use tracing::debug;

use super::{best_and_runner_up, distinctness, Candidate, OverlapResult, ShiftEstimator};
use crate::config::OracleConfig;

/// Mean signature difference (in luma levels) at which a fit stops counting.
const MAX_ROW_ERROR: f32 = 12.0;

/// Row-signature correlation.
///
/// Each row is reduced to the mean luma of `strips` vertical strips. Every
/// candidate shift within `max_shift_ratio` of the previous height is scored
/// by the mean absolute signature difference over the rows both images share,
/// and the best one wins. Confidence combines how well the best shift fits with
/// how clearly it beats the next best non-adjacent shift, so flat or repetitive
/// content reports low confidence instead of a guess.
///
/// Thorough but O(height * candidates); meant for the offline stitch path.
#[derive(Debug, Clone)]
pub struct RowSignatureEstimator {
    strips: u32,
    ignore_right_px: u32,
    max_shift_ratio: f32,
    min_overlap_rows: u32,
}

impl RowSignatureEstimator {
    pub fn new(strips: u32, ignore_right_px: u32, max_shift_ratio: f32, min_overlap_rows: u32) -> Self {
        Self {
            strips: strips.max(1),
            ignore_right_px,
            max_shift_ratio,
            min_overlap_rows: min_overlap_rows.max(1),
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(
            config.strips,
            config.ignore_right_px,
            config.max_shift_ratio,
            config.min_overlap_rows,
        )
    }

    /// Per-row strip means, row-major, `strips` values per row.
    fn signatures(&self, image: &GrayImage, strips: usize) -> Vec<f32> {
        let width = image.width() as usize;
        let usable = effective_width(image.width(), self.ignore_right_px) as usize;
        let strip_width = usable / strips;
        let raw = image.as_raw();

        let mut out = Vec::with_capacity(image.height() as usize * strips);
        for row in raw.chunks_exact(width) {
            for s in 0..strips {
                let from = s * strip_width;
                let to = if s + 1 == strips { usable } else { from + strip_width };
                let sum: u32 = row[from..to].iter().map(|&p| p as u32).sum();
                out.push(sum as f32 / (to - from) as f32);
            }
        }
        out
    }
}

fn effective_width(width: u32, ignore_right_px: u32) -> u32 {
    if ignore_right_px > 0 && width > ignore_right_px {
        width - ignore_right_px
    } else {
        width
    }
}

impl ShiftEstimator for RowSignatureEstimator {
    fn estimate(&self, prev: &GrayImage, curr: &GrayImage) -> Option<OverlapResult> {
        if prev.width() != curr.width() || prev.width() == 0 {
            debug!(
                prev_width = prev.width(),
                curr_width = curr.width(),
                "row signatures need equal, non-empty widths"
            );
            return None;
        }
        let strips = self
            .strips
            .min(effective_width(prev.width(), self.ignore_right_px)) as usize;
        let sig_prev = self.signatures(prev, strips);
        let sig_curr = self.signatures(curr, strips);

        let prev_h = prev.height() as i64;
        let curr_h = curr.height() as i64;
        let max_shift = ((prev_h as f32 * self.max_shift_ratio).round() as i64).min(prev_h - 1);
        let min_overlap = self.min_overlap_rows as i64;

        let mut candidates = Vec::new();
        for shift in -max_shift..=max_shift {
            // Row y of curr lines up with row y + shift of prev.
            let first = (-shift).max(0);
            let last = curr_h.min(prev_h - shift);
            if last - first < min_overlap {
                continue;
            }
            let a = &sig_prev[(first + shift) as usize * strips..(last + shift) as usize * strips];
            let b = &sig_curr[first as usize * strips..last as usize * strips];
            let total: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
            candidates.push(Candidate {
                shift,
                error: total / a.len() as f32,
            });
        }

        let Some((best, runner_up)) = best_and_runner_up(&candidates) else {
            debug!(prev_h, curr_h, min_overlap, "no shift leaves enough overlap");
            return None;
        };
        let fit = (1.0 - best.error / MAX_ROW_ERROR).max(0.0);
        let confidence = fit * distinctness(best, runner_up);

        // Join in the middle of the shared rows, away from either edge.
        let first = (-best.shift).max(0);
        let last = curr_h.min(prev_h - best.shift);
        let match_anchor_y = (first + (last - first) / 2) as u32;

        debug!(
            shift = best.shift,
            error = format!("{:.3}", best.error),
            runner_up = ?runner_up.map(|r| r.error),
            confidence = format!("{:.3}", confidence),
            match_anchor_y,
            "row-signature estimate"
        );

        Some(OverlapResult {
            shift: best.shift as i32,
            confidence,
            match_anchor_y,
        })
    }

    fn name(&self) -> &str {
        "row-signature"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::testing::{page, rows};

    fn estimator() -> RowSignatureEstimator {
        RowSignatureEstimator::new(8, 0, 1.0, 16)
    }

    #[test]
    fn finds_scroll_offset() {
        let src = page(120, 600);
        let prev = rows(&src, 0, 200);
        let curr = rows(&src, 80, 200);
        let result = estimator().estimate(&prev, &curr).unwrap();
        assert_eq!(result.shift, 80);
        assert!(result.confidence > 0.9, "confidence {}", result.confidence);
        // Overlap is curr rows 0..120; the seam sits in its middle.
        assert_eq!(result.match_anchor_y, 60);
    }

    #[test]
    fn reports_upward_scroll_as_negative() {
        let src = page(120, 600);
        let prev = rows(&src, 100, 200);
        let curr = rows(&src, 70, 200);
        assert_eq!(estimator().estimate(&prev, &curr).unwrap().shift, -30);
    }

    #[test]
    fn identical_images_have_zero_shift() {
        let src = page(64, 150);
        let result = estimator().estimate(&src, &src).unwrap();
        assert_eq!(result.shift, 0);
    }

    #[test]
    fn flat_content_is_not_confident() {
        let blank = GrayImage::from_pixel(64, 200, image::Luma([240]));
        let result = estimator().estimate(&blank, &blank).unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn width_mismatch_is_no_match() {
        let a = page(64, 100);
        let b = page(48, 100);
        assert!(estimator().estimate(&a, &b).is_none());
    }

    #[test]
    fn too_short_for_overlap_is_no_match() {
        let a = page(64, 10);
        assert!(estimator().estimate(&a, &a).is_none());
    }

    #[test]
    fn scrollbar_columns_are_ignored() {
        let src = page(120, 400);
        let prev = rows(&src, 0, 200);
        let mut curr = rows(&src, 50, 200);
        for y in 0..curr.height() {
            for x in 110..120 {
                curr.put_pixel(x, y, image::Luma([0]));
            }
        }
        let result = RowSignatureEstimator::new(8, 10, 1.0, 16)
            .estimate(&prev, &curr)
            .unwrap();
        assert_eq!(result.shift, 50);
        assert!(result.confidence > 0.9);
    }
}
