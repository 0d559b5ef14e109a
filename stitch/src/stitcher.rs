use image::RgbaImage;
use longshot_common::config::{OracleConfig, StitchConfig};
use longshot_common::shift;
use tracing::info;

use crate::compositor;
use crate::error::StitchError;
use crate::range::Range;
use crate::resolver::{RangeResolver, Resolution};

/// End-to-end stitching, plus the two-step variant for callers that adjust
/// ranges between resolving and compositing.
#[derive(Clone)]
pub struct Stitcher {
    resolver: RangeResolver,
}

impl Stitcher {
    pub fn new(resolver: RangeResolver) -> Self {
        Self { resolver }
    }

    pub fn from_config(stitch: &StitchConfig, oracle: &OracleConfig) -> Self {
        Self::new(RangeResolver::new(
            shift::from_config(oracle),
            stitch.accept_confidence,
            stitch.debt_policy,
        ))
    }

    pub fn resolver(&self) -> &RangeResolver {
        &self.resolver
    }

    pub fn calculate_ranges(&self, images: &[RgbaImage]) -> Result<Resolution, StitchError> {
        self.resolver.calculate_ranges(images)
    }

    pub fn compose(&self, images: &[RgbaImage], ranges: &[Range]) -> Result<RgbaImage, StitchError> {
        compositor::compose(images, ranges)
    }

    pub fn stitch(&self, images: &[RgbaImage]) -> Result<RgbaImage, StitchError> {
        match images {
            [] => Err(StitchError::InsufficientContent("no chunks to stitch".into())),
            [only] => Ok(only.clone()),
            _ => {
                let resolution = self.calculate_ranges(images)?;
                let image = self.compose(images, &resolution.ranges)?;
                info!(
                    chunks = images.len(),
                    flagged = resolution.flagged.len(),
                    width = image.width(),
                    height = image.height(),
                    "stitched"
                );
                Ok(image)
            }
        }
    }

    /// Run [`Stitcher::stitch`] on the blocking pool.
    pub async fn spawn_stitch(&self, images: Vec<RgbaImage>) -> Result<RgbaImage, StitchError> {
        let stitcher = self.clone();
        tokio::task::spawn_blocking(move || stitcher.stitch(&images))
            .await
            .map_err(|e| StitchError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{page, rows, striped, Scripted};
    use longshot_common::config::{DebtPolicy, OracleKind};

    fn rejecting() -> Stitcher {
        Stitcher::new(RangeResolver::new(
            Arc::new(Scripted::always_none()),
            0.5,
            DebtPolicy::Drop,
        ))
    }

    #[test]
    fn rejected_seams_concatenate_chunks() {
        let images = vec![striped(6, 40, 0), striped(6, 25, 100), striped(6, 30, 200)];
        let out = rejecting().stitch(&images).unwrap();
        assert_eq!(out.height(), 95);
        for (y, expected) in [(0, 0u8), (39, 39), (40, 100), (64, 124), (65, 200), (94, 229)] {
            assert_eq!(out.get_pixel(2, y).0[0], expected, "row {y}");
        }
    }

    #[test]
    fn single_chunk_is_returned_unchanged() {
        let only = striped(7, 33, 5);
        assert_eq!(rejecting().stitch(std::slice::from_ref(&only)).unwrap(), only);
    }

    #[test]
    fn no_chunks_is_insufficient_content() {
        assert!(matches!(
            rejecting().stitch(&[]),
            Err(StitchError::InsufficientContent(_))
        ));
    }

    #[test]
    fn configured_stitcher_rebuilds_the_page() {
        let content = page(64, 360);
        let images = vec![rows(&content, 0, 200), rows(&content, 80, 200), rows(&content, 160, 200)];
        let stitch = StitchConfig {
            accept_confidence: 0.5,
            debt_policy: DebtPolicy::Drop,
            output: "unused.png".into(),
            ranges_file: None,
        };
        let mut oracle = OracleConfig::new(OracleKind::Rows);
        oracle.max_shift_ratio = 1.0;
        oracle.min_overlap_rows = 16;
        let out = Stitcher::from_config(&stitch, &oracle).stitch(&images).unwrap();
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn stitches_on_the_blocking_pool() {
        let images = vec![striped(6, 40, 0), striped(6, 40, 40)];
        let out = rejecting().spawn_stitch(images).await.unwrap();
        assert_eq!(out.dimensions(), (6, 80));
        assert_eq!(out.get_pixel(0, 79).0[0], 79);
    }
}
