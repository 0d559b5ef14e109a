use std::sync::Arc;

use longshot_common::frame::Frame;
use longshot_common::store::ChunkStore;
use tracing::{debug, error, info, warn};

use super::persist::ChunkWriter;
use super::RecorderError;
use crate::filter::admission::{Admission, AdmissionFilter, DropReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    /// Nothing recorded yet.
    Idle,
    /// Frames are being admitted.
    Recording,
    /// Frames are ignored; the anchor and index are kept for resume.
    Paused,
    /// Stopped; chunks are complete and ready to stitch.
    Finished,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Frames admitted by the filter.
    pub kept: u32,
    /// Chunks the writer stored.
    pub saved: u32,
    /// Chunks the writer failed to store.
    pub failed: u32,
}

/// Drives one scrolling capture.
///
/// Transitions:
///   Idle | Finished --start-->  Recording   (resets the filter, clears the store)
///   Recording       --pause-->  Paused
///   Paused          --resume--> Recording
///   Recording | Paused --finish--> Finished (drains pending chunk writes)
///
/// `process_frame` is called synchronously for every delivered frame and never
/// waits on storage: kept frames are handed to a background [`ChunkWriter`].
pub struct Recorder {
    phase: RecordingPhase,
    filter: AdmissionFilter,
    store: Arc<dyn ChunkStore>,
    writer: Option<ChunkWriter>,
}

impl Recorder {
    pub fn new(filter: AdmissionFilter, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            phase: RecordingPhase::Idle,
            filter,
            store,
            writer: None,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    /// Begin a new recording. Prior chunks are removed before any frame is
    /// admitted.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if !matches!(self.phase, RecordingPhase::Idle | RecordingPhase::Finished) {
            return Err(self.invalid("start"));
        }
        self.filter.reset();
        self.store.clear()?;
        self.writer = Some(ChunkWriter::spawn(Arc::clone(&self.store))?);
        info!(from = ?self.phase, "recording started");
        self.phase = RecordingPhase::Recording;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.phase != RecordingPhase::Recording {
            return Err(self.invalid("pause"));
        }
        info!(kept = self.filter.kept(), "recording paused");
        self.phase = RecordingPhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        if self.phase != RecordingPhase::Paused {
            return Err(self.invalid("resume"));
        }
        info!(kept = self.filter.kept(), "recording resumed");
        self.phase = RecordingPhase::Recording;
        Ok(())
    }

    /// Stop admitting frames and wait for queued chunks to reach the store.
    pub async fn finish(&mut self) -> Result<RecordingSummary, RecorderError> {
        if !matches!(self.phase, RecordingPhase::Recording | RecordingPhase::Paused) {
            return Err(self.invalid("finish"));
        }
        self.phase = RecordingPhase::Finished;

        let mut summary = RecordingSummary {
            kept: self.filter.kept(),
            ..RecordingSummary::default()
        };
        if let Some(writer) = self.writer.take() {
            let stats = writer.finish().await?;
            summary.saved = stats.saved;
            summary.failed = stats.failed;
        }
        info!(
            kept = summary.kept,
            saved = summary.saved,
            failed = summary.failed,
            "recording finished"
        );
        Ok(summary)
    }

    /// Decide whether `frame` is kept and, if so, queue it for persistence.
    pub fn process_frame(&mut self, frame: &Frame) -> Admission {
        if self.phase != RecordingPhase::Recording {
            debug!(phase = ?self.phase, ts = frame.captured_at_ms(), "not recording, frame ignored");
            return Admission::Drop(DropReason::NotRecording);
        }

        let admission = self.filter.admit(frame);
        match admission {
            Admission::Keep { index, shift } => {
                info!(index, shift, ts = frame.captured_at_ms(), "frame kept");
                let Some(anchor) = self.filter.anchor_frame() else {
                    warn!(index, "kept frame has no anchor copy");
                    return admission;
                };
                // The anchor is already a private copy; cloning it only bumps
                // reference counts.
                let frame = anchor.clone();
                match &self.writer {
                    Some(writer) => {
                        if let Err(e) = writer.submit(index, shift, frame) {
                            error!(error = %e, index, "failed to queue chunk");
                        }
                    }
                    None => error!(index, "no chunk writer while recording"),
                }
            }
            Admission::Drop(reason) => {
                debug!(?reason, ts = frame.captured_at_ms(), "frame dropped");
            }
        }
        admission
    }

    fn invalid(&self, event: &'static str) -> RecorderError {
        warn!(phase = ?self.phase, event, "invalid recorder transition");
        RecorderError::InvalidTransition {
            from: self.phase,
            event,
        }
    }
}
