use std::path::{Path, PathBuf};

use longshot_capture::{Admission, Recorder, RecorderError, RecordingSummary};
use longshot_common::frame::{Frame, FrameError};
use tracing::{debug, info, warn};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to list frames in {0}: {1}")]
    ListFrames(String, std::io::Error),
    #[error("no frames found in {0}")]
    Empty(String),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

#[derive(Debug, thiserror::Error)]
enum DecodeError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// Image files in `dir`, in file-name order.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, ReplayError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ReplayError::ListFrames(dir.display().to_string(), e))?;
    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// Feed every frame in `dir` through `recorder` as if it had been delivered
/// live at `fps`, then finish the recording.
pub async fn record_directory(recorder: &mut Recorder, dir: &Path, fps: f64) -> Result<RecordingSummary, ReplayError> {
    let frames = list_frames(dir)?;
    if frames.is_empty() {
        return Err(ReplayError::Empty(dir.display().to_string()));
    }
    let interval_ms = 1000.0 / fps;
    let started_at = chrono::Utc::now().timestamp_millis();
    info!(dir = %dir.display(), frames = frames.len(), fps, "replaying captured frames");

    recorder.start()?;
    let mut dropped = 0u32;
    for (i, path) in frames.into_iter().enumerate() {
        let ts = started_at + (i as f64 * interval_ms).round() as i64;
        let frame = match decode_frame(path.clone(), ts).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable frame");
                continue;
            }
        };
        if let Admission::Drop(reason) = recorder.process_frame(&frame) {
            dropped += 1;
            debug!(path = %path.display(), ?reason, "frame not kept");
        }
    }

    let summary = recorder.finish().await?;
    info!(kept = summary.kept, dropped, "replay complete");
    Ok(summary)
}

async fn decode_frame(path: PathBuf, captured_at_ms: i64) -> Result<Frame, DecodeError> {
    tokio::task::spawn_blocking(move || -> Result<Frame, DecodeError> {
        let image = image::open(&path)?.to_rgba8();
        Ok(Frame::from_rgba(&image, captured_at_ms)?)
    })
    .await
    .map_err(|e| DecodeError::Worker(e.to_string()))?
}
