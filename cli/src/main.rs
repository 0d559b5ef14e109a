mod ranges;
mod replay;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use longshot_capture::{AdmissionFilter, Recorder};
use longshot_common::config::Config;
use longshot_common::shift;
use longshot_common::store::{ChunkStore, DirChunkStore, StoreError};
use longshot_stitch::{StitchError, Stitcher};
use ranges::RangesFileError;
use replay::ReplayError;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Stitch(#[from] StitchError),
    #[error(transparent)]
    Ranges(#[from] RangesFileError),
    #[error("failed to write {0}: {1}")]
    Output(String, image::ImageError),
    #[error("stitch worker failed: {0}")]
    Worker(String),
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("longshot.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        chunk_dir = config.store.chunk_dir,
        frames_dir = ?config.capture.frames_dir,
        live_oracle = ?config.live_oracle.kind,
        stitch_oracle = ?config.stitch_oracle.kind,
        throttle_ms = config.admission.throttle_ms,
        debt_policy = ?config.stitch.debt_policy,
        output = config.stitch.output,
        "starting longshot"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "longshot failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), RunError> {
    let store: Arc<dyn ChunkStore> = Arc::new(DirChunkStore::new(config.store.chunk_dir.clone()));
    store.open()?;

    if let Some(frames_dir) = &config.capture.frames_dir {
        let filter = AdmissionFilter::new(config.admission.clone(), shift::from_config(&config.live_oracle));
        let mut recorder = Recorder::new(filter, Arc::clone(&store));
        let summary = replay::record_directory(&mut recorder, Path::new(frames_dir), config.capture.fps).await?;
        if summary.failed > 0 {
            warn!(failed = summary.failed, "some kept frames were not stored");
        }
    }

    let images: Vec<RgbaImage> = store.load_all_chunks()?.into_iter().map(|chunk| chunk.image).collect();
    info!(chunks = images.len(), "chunks loaded");

    let stitcher = Stitcher::from_config(&config.stitch, &config.stitch_oracle);
    let ranges_file = config.stitch.ranges_file.clone().map(PathBuf::from);
    let image = tokio::task::spawn_blocking(move || stitch_images(&stitcher, &images, ranges_file.as_deref()))
        .await
        .map_err(|e| RunError::Worker(e.to_string()))??;

    let output = Path::new(&config.stitch.output);
    image
        .save(output)
        .map_err(|e| RunError::Output(output.display().to_string(), e))?;
    info!(
        path = %output.display(),
        width = image.width(),
        height = image.height(),
        "long image written"
    );

    store.close()?;
    Ok(())
}

/// Compose with hand-edited ranges when `ranges_file` holds ranges for these
/// chunks; otherwise resolve, write the ranges out for editing if a path is
/// configured, and compose.
fn stitch_images(stitcher: &Stitcher, images: &[RgbaImage], ranges_file: Option<&Path>) -> Result<RgbaImage, RunError> {
    if let Some(path) = ranges_file.filter(|p| p.exists()) {
        let resolution = ranges::read_resolution(path)?;
        if resolution.fits(images) {
            info!(path = %path.display(), "composing with edited ranges");
            return Ok(stitcher.compose(images, &resolution.ranges)?);
        }
        warn!(
            path = %path.display(),
            ranges = resolution.ranges.len(),
            chunks = images.len(),
            "ranges file belongs to other chunks, resolving again"
        );
    }

    let resolution = stitcher.calculate_ranges(images)?;
    if let Some(path) = ranges_file {
        ranges::write_resolution(path, &resolution)?;
        info!(path = %path.display(), flagged = resolution.flagged.len(), "ranges written for review");
    }
    Ok(stitcher.compose(images, &resolution.ranges)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use longshot_common::config::{OracleConfig, OracleKind, StitchConfig};
    use longshot_stitch::Range;

    fn striped(height: u32, offset: u8) -> RgbaImage {
        RgbaImage::from_fn(8, height, |_, y| {
            let v = (y as u8).wrapping_add(offset);
            image::Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn resolved_ranges_are_written_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranges.json");
        // A flat chunk gives the row oracle nothing to lock on to.
        let images = vec![RgbaImage::from_pixel(8, 150, image::Rgba([9, 9, 9, 255])), striped(150, 0)];
        let stitcher = Stitcher::from_config(&StitchConfig::default(), &OracleConfig::new(OracleKind::Rows));

        let first = stitch_images(&stitcher, &images, Some(path.as_path())).unwrap();
        assert_eq!(first.height(), 300);
        let written = ranges::read_resolution(&path).unwrap();
        assert_eq!(written.ranges, vec![Range::full(150), Range::full(150)]);
        assert_eq!(written.flagged.len(), 1);

        let mut edited = written;
        edited.ranges[1].drag_start(30);
        ranges::write_resolution(&path, &edited).unwrap();

        let second = stitch_images(&stitcher, &images, Some(path.as_path())).unwrap();
        assert_eq!(second.height(), 270);
        assert_eq!(second.get_pixel(0, 150).0[0], 30);
    }

    #[test]
    fn stale_ranges_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranges.json");
        let stitcher = Stitcher::from_config(&StitchConfig::default(), &OracleConfig::new(OracleKind::Rows));
        let flat = |h| RgbaImage::from_pixel(8, h, image::Rgba([9, 9, 9, 255]));

        // Edited ranges from an earlier recording with the same chunk count.
        let earlier = vec![flat(150), striped(150, 0)];
        stitch_images(&stitcher, &earlier, Some(path.as_path())).unwrap();
        let mut edited = ranges::read_resolution(&path).unwrap();
        edited.ranges[1].drag_start(30);
        ranges::write_resolution(&path, &edited).unwrap();

        let current = vec![flat(150), striped(200, 0)];
        let out = stitch_images(&stitcher, &current, Some(path.as_path())).unwrap();
        assert_eq!(out.height(), 350);
        let rewritten = ranges::read_resolution(&path).unwrap();
        assert_eq!(rewritten.chunk_heights, vec![150, 200]);
        assert_eq!(rewritten.ranges[1], Range::full(200));
    }
}
