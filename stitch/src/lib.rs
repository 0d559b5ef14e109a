//! Offline stitching of captured chunks into one tall image.
//!
//! [`RangeResolver`] decides which rows of each chunk survive, [`compose`]
//! paints the surviving rows onto one canvas, and [`Stitcher`] wires the two
//! together for callers that do not need to edit ranges in between.

pub mod compositor;
pub mod error;
pub mod range;
pub mod resolver;
pub mod stitcher;

pub use compositor::compose;
pub use error::StitchError;
pub use range::{Range, MIN_RETAINED_ROWS};
pub use resolver::{propagate_debt, FlaggedPair, RangeResolver, RejectCause, Resolution};
pub use stitcher::Stitcher;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use image::{GrayImage, Rgba, RgbaImage};
    use longshot_common::shift::{OverlapResult, ShiftEstimator};

    /// Grey texture in which every row is distinct.
    pub fn page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let h = (y.wrapping_mul(2_654_435_761) ^ (x / 4).wrapping_mul(40_503)).rotate_left(13);
            let v = (h.wrapping_mul(97) >> 24) as u8;
            Rgba([v, v, v, 255])
        })
    }

    pub fn rows(src: &RgbaImage, top: u32, height: u32) -> RgbaImage {
        image::imageops::crop_imm(src, 0, top, src.width(), height).to_image()
    }

    /// Every pixel of row `y` is `y as u8`, which makes row provenance easy
    /// to assert on.
    pub fn striped(width: u32, height: u32, offset: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |_, y| {
            let v = (y as u8).wrapping_add(offset);
            Rgba([v, v, v, 255])
        })
    }

    /// Replays a fixed list of answers, one per call.
    pub struct Scripted(Mutex<Vec<Option<OverlapResult>>>);

    impl Scripted {
        pub fn new(mut answers: Vec<Option<OverlapResult>>) -> Self {
            answers.reverse();
            Self(Mutex::new(answers))
        }

        pub fn always_none() -> Self {
            Self::new(Vec::new())
        }
    }

    impl ShiftEstimator for Scripted {
        fn estimate(&self, _prev: &GrayImage, _curr: &GrayImage) -> Option<OverlapResult> {
            self.0.lock().unwrap().pop().flatten()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub fn hit(shift: i32, match_anchor_y: u32, confidence: f32) -> Option<OverlapResult> {
        Some(OverlapResult {
            shift,
            confidence,
            match_anchor_y,
        })
    }
}
