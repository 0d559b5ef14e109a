use serde::{Deserialize, Serialize};

/// Manual edits never shrink a chunk below this many rows.
pub const MIN_RETAINED_ROWS: i64 = 100;

/// Half-open row interval `[start, end)` of a chunk that survives into the
/// stitched image. `end < start` only occurs transiently inside the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// The whole of an image `height` rows tall.
    pub fn full(height: u32) -> Self {
        Self::new(0, height as i64)
    }

    /// Signed height; negative while the range is eclipsed by its neighbours.
    pub fn height(&self) -> i64 {
        self.end - self.start
    }

    /// Rows that end up on the canvas.
    pub fn retained(&self) -> i64 {
        self.height().max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.height() <= 0
    }

    /// Move the top edge by `delta` rows, keeping it inside the image and at
    /// least [`MIN_RETAINED_ROWS`] above the bottom edge.
    pub fn drag_start(&mut self, delta: i64) {
        self.start = (self.start + delta).min(self.end - MIN_RETAINED_ROWS).max(0);
    }

    /// Move the bottom edge by `delta` rows, keeping it within `image_height`
    /// and at least [`MIN_RETAINED_ROWS`] below the top edge.
    pub fn drag_end(&mut self, delta: i64, image_height: u32) {
        self.end = (self.end + delta)
            .min(image_height as i64)
            .max(self.start + MIN_RETAINED_ROWS);
    }
}
