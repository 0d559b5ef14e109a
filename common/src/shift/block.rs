use image::GrayImage;
use tracing::debug;

use super::{best_and_runner_up, distinctness, Candidate, OverlapResult, ShiftEstimator};
use crate::config::OracleConfig;

/// Every n-th column of the template window is compared.
const COLUMN_STEP: usize = 2;

/// Template block search.
///
/// A `block_height` x `block_width` window centred horizontally is cut from
/// the current image at `anchor_ratio` of its height and searched for in the
/// previous image, up to `max_shift_ratio` of the previous height in either
/// direction. Pixel differences up to `tolerance` are treated as compression
/// noise when judging the fit. Cheap enough for the live path.
#[derive(Debug, Clone)]
pub struct BlockMatchEstimator {
    block_height: u32,
    block_width: u32,
    anchor_ratio: f32,
    max_shift_ratio: f32,
    tolerance: u8,
}

impl BlockMatchEstimator {
    pub fn new(
        block_height: u32,
        block_width: u32,
        anchor_ratio: f32,
        max_shift_ratio: f32,
        tolerance: u8,
    ) -> Self {
        Self {
            block_height: block_height.max(1),
            block_width: block_width.max(1),
            anchor_ratio: anchor_ratio.clamp(0.0, 1.0),
            max_shift_ratio,
            tolerance,
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(
            config.block_height,
            config.block_width,
            config.anchor_ratio,
            config.max_shift_ratio,
            config.tolerance,
        )
    }

    /// Mean absolute difference between the template and `prev` at `prev_y`.
    fn block_error(
        prev: &GrayImage,
        curr: &GrayImage,
        prev_y: u32,
        curr_y: u32,
        height: u32,
        columns: std::ops::Range<usize>,
    ) -> f32 {
        let width = prev.width() as usize;
        let (a, b) = (prev.as_raw(), curr.as_raw());
        let mut total = 0u64;
        let mut count = 0u64;
        for h in 0..height as usize {
            let row_a = (prev_y as usize + h) * width;
            let row_b = (curr_y as usize + h) * width;
            for x in columns.clone().step_by(COLUMN_STEP) {
                total += a[row_a + x].abs_diff(b[row_b + x]) as u64;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            total as f32 / count as f32
        }
    }
}

impl ShiftEstimator for BlockMatchEstimator {
    fn estimate(&self, prev: &GrayImage, curr: &GrayImage) -> Option<OverlapResult> {
        if prev.width() != curr.width() || prev.width() == 0 {
            return None;
        }
        let width = prev.width();
        let block_h = self.block_height.min(prev.height()).min(curr.height());
        if block_h == 0 {
            return None;
        }
        let window = self.block_width.min(width);
        let x0 = ((width - window) / 2) as usize;
        let columns = x0..x0 + window as usize;

        let anchor = ((curr.height() - block_h) as f32 * self.anchor_ratio) as u32;
        let max_shift = (prev.height() as f32 * self.max_shift_ratio).round() as i64;

        let mut candidates = Vec::new();
        for prev_y in 0..=prev.height() - block_h {
            let shift = prev_y as i64 - anchor as i64;
            if shift.abs() > max_shift {
                continue;
            }
            candidates.push(Candidate {
                shift,
                error: Self::block_error(prev, curr, prev_y, anchor, block_h, columns.clone()),
            });
        }

        let (best, runner_up) = best_and_runner_up(&candidates)?;
        let fit = if self.tolerance == 0 {
            if best.error == 0.0 { 1.0 } else { 0.0 }
        } else {
            (1.0 - best.error / self.tolerance as f32).max(0.0)
        };
        let confidence = fit * distinctness(best, runner_up);

        debug!(
            shift = best.shift,
            error = format!("{:.3}", best.error),
            confidence = format!("{:.3}", confidence),
            anchor,
            "block-match estimate"
        );

        Some(OverlapResult {
            shift: best.shift as i32,
            confidence,
            match_anchor_y: anchor,
        })
    }

    fn name(&self) -> &str {
        "block-match"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::testing::{page, rows};

    fn estimator() -> BlockMatchEstimator {
        BlockMatchEstimator::new(20, 50, 0.0, 1.0 / 3.0, 10)
    }

    #[test]
    fn finds_scroll_offset_from_top_anchor() {
        let src = page(160, 800);
        let prev = rows(&src, 0, 300);
        let curr = rows(&src, 45, 300);
        let result = estimator().estimate(&prev, &curr).unwrap();
        assert_eq!(result.shift, 45);
        assert_eq!(result.match_anchor_y, 0);
        assert!(result.confidence > 0.9, "confidence {}", result.confidence);
    }

    #[test]
    fn mid_anchor_reports_anchor_row() {
        let src = page(160, 800);
        let prev = rows(&src, 0, 300);
        let curr = rows(&src, 30, 300);
        let result = BlockMatchEstimator::new(20, 50, 0.5, 1.0 / 3.0, 10)
            .estimate(&prev, &curr)
            .unwrap();
        assert_eq!(result.match_anchor_y, 140);
        assert_eq!(result.shift, 30);
    }

    #[test]
    fn static_frames_have_zero_shift() {
        let src = page(160, 300);
        assert_eq!(estimator().estimate(&src, &src).unwrap().shift, 0);
    }

    #[test]
    fn scroll_beyond_search_window_is_not_found() {
        let src = page(160, 800);
        let prev = rows(&src, 0, 300);
        let curr = rows(&src, 200, 300);
        let result = estimator().estimate(&prev, &curr).unwrap();
        assert!(result.confidence < 0.5, "confidence {}", result.confidence);
    }

    #[test]
    fn uniform_template_is_ambiguous() {
        let blank = GrayImage::from_pixel(100, 200, image::Luma([20]));
        assert_eq!(estimator().estimate(&blank, &blank).unwrap().confidence, 0.0);
    }

    #[test]
    fn width_mismatch_is_no_match() {
        assert!(estimator().estimate(&page(100, 100), &page(90, 100)).is_none());
    }
}
