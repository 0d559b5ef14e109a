use std::ops::Range;

use longshot_common::frame::Frame;
use tracing::debug;

use super::traits::DuplicateCheck;

const ROW_FRACTIONS: [f32; 3] = [0.2, 0.5, 0.8];
const COL_FRACTIONS: [f32; 3] = [0.1, 0.5, 0.9];
const SAMPLE_RUN_BYTES: usize = 16;

/// Sparse-sample duplicate test.
///
/// Compares a short run of bytes at nine fixed anchors (3x3 grid at 20/50/80 %
/// of the height and 10/50/90 % of the width) in the primary plane: luma for
/// NV12, raw pixels for packed formats. Only frames matching at every anchor
/// are duplicates.
///
/// A change that touches none of the anchors goes unnoticed. That only
/// withholds a chunk; it never affects stitching.
#[derive(Debug, Clone)]
pub struct SparseSampleComparator {
    run_bytes: usize,
}

impl Default for SparseSampleComparator {
    fn default() -> Self {
        Self {
            run_bytes: SAMPLE_RUN_BYTES,
        }
    }
}

impl SparseSampleComparator {
    pub fn new(run_bytes: usize) -> Self {
        Self {
            run_bytes: run_bytes.max(1),
        }
    }

    /// Byte ranges of the nine anchors within the primary plane.
    fn anchors(&self, frame: &Frame) -> Vec<(u32, Range<usize>)> {
        let bpp = frame.format().primary_bytes_per_pixel();
        let row_bytes = frame.row_bytes();
        let mut out = Vec::with_capacity(ROW_FRACTIONS.len() * COL_FRACTIONS.len());
        for fy in ROW_FRACTIONS {
            let y = ((frame.height() as f32 * fy) as u32).min(frame.height() - 1);
            for fx in COL_FRACTIONS {
                let x = ((frame.width() as f32 * fx) as usize).min(frame.width() as usize - 1);
                let start = x * bpp;
                out.push((y, start..(start + self.run_bytes).min(row_bytes)));
            }
        }
        out
    }
}

impl DuplicateCheck for SparseSampleComparator {
    fn is_duplicate(&self, prev: &Frame, curr: &Frame) -> bool {
        if !prev.same_geometry(curr) {
            debug!(
                prev = format!("{:?} {}x{}", prev.format(), prev.width(), prev.height()),
                curr = format!("{:?} {}x{}", curr.format(), curr.width(), curr.height()),
                "frame geometry changed, not a duplicate"
            );
            return false;
        }
        self.anchors(prev)
            .into_iter()
            .all(|(y, run)| prev.primary_row(y)[run.clone()] == curr.primary_row(y)[run])
    }

    fn name(&self) -> &str {
        "sparse-sample"
    }
}
