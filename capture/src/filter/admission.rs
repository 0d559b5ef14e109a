use std::sync::Arc;

use image::GrayImage;
use longshot_common::config::AdmissionConfig;
use longshot_common::frame::Frame;
use longshot_common::shift::ShiftEstimator;
use tracing::debug;

use super::sparse::SparseSampleComparator;
use super::traits::DuplicateCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Recording is not active.
    NotRecording,
    /// Arrived within the throttle interval of the last kept frame.
    Throttled,
    /// Sparse samples match the last kept frame.
    Duplicate,
    /// The oracle found no match.
    NoMatch,
    /// The oracle match is below the configured confidence.
    LowConfidence,
    /// Content did not move up far enough (static, jitter or scrolling back).
    InsufficientShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Persist the frame as chunk `index`. `shift` is 0 for the first frame.
    Keep { index: u32, shift: i32 },
    Drop(DropReason),
}

/// The last kept frame: every candidate is measured against it.
struct Anchor {
    frame: Frame,
    luma: GrayImage,
}

/// Streaming keep/drop decision for a scrolling capture.
///
/// Order of checks for each frame:
///   1. no anchor yet          -> keep (bootstrap)
///   2. within throttle        -> drop
///   3. sparse-sample match    -> drop
///   4. oracle: none, unsure, or shift <= min_shift -> drop
///   5. otherwise              -> keep
///
/// The anchor only moves on keep. Measuring every candidate against the last
/// kept frame keeps per-frame estimation error from adding up into drift.
pub struct AdmissionFilter {
    config: AdmissionConfig,
    comparator: Box<dyn DuplicateCheck>,
    estimator: Arc<dyn ShiftEstimator>,
    anchor: Option<Anchor>,
    next_index: u32,
}

impl AdmissionFilter {
    pub fn new(config: AdmissionConfig, estimator: Arc<dyn ShiftEstimator>) -> Self {
        Self {
            config,
            comparator: Box::new(SparseSampleComparator::default()),
            estimator,
            anchor: None,
            next_index: 0,
        }
    }

    pub fn with_comparator(mut self, comparator: Box<dyn DuplicateCheck>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Forget the anchor and restart indices at 0.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.next_index = 0;
    }

    /// Number of frames kept since the last reset.
    pub fn kept(&self) -> u32 {
        self.next_index
    }

    /// Copy of the most recently kept frame.
    pub fn anchor_frame(&self) -> Option<&Frame> {
        self.anchor.as_ref().map(|a| &a.frame)
    }

    pub fn admit(&mut self, frame: &Frame) -> Admission {
        let Some(anchor) = &self.anchor else {
            debug!(ts = frame.captured_at_ms(), "first frame, keeping unconditionally");
            return self.keep(frame, None, 0);
        };

        let elapsed = frame.captured_at_ms() - anchor.frame.captured_at_ms();
        if elapsed < self.config.throttle_ms as i64 {
            return Admission::Drop(DropReason::Throttled);
        }

        if self.comparator.is_duplicate(&anchor.frame, frame) {
            debug!(
                ts = frame.captured_at_ms(),
                comparator = self.comparator.name(),
                "duplicate of anchor"
            );
            return Admission::Drop(DropReason::Duplicate);
        }

        let luma = frame.to_luma();
        let Some(result) = self.estimator.estimate(&anchor.luma, &luma) else {
            debug!(ts = frame.captured_at_ms(), oracle = self.estimator.name(), "no match");
            return Admission::Drop(DropReason::NoMatch);
        };

        debug!(
            ts = frame.captured_at_ms(),
            shift = result.shift,
            confidence = format!("{:.3}", result.confidence),
            min_confidence = self.config.min_confidence,
            min_shift = self.config.min_shift,
            "oracle comparison"
        );
        if result.confidence < self.config.min_confidence {
            return Admission::Drop(DropReason::LowConfidence);
        }
        if result.shift <= self.config.min_shift {
            return Admission::Drop(DropReason::InsufficientShift);
        }

        self.keep(frame, Some(luma), result.shift)
    }

    fn keep(&mut self, frame: &Frame, luma: Option<GrayImage>, shift: i32) -> Admission {
        let index = self.next_index;
        self.next_index += 1;
        let frame = frame.deep_copy();
        let luma = luma.unwrap_or_else(|| frame.to_luma());
        self.anchor = Some(Anchor { frame, luma });
        Admission::Keep { index, shift }
    }
}
