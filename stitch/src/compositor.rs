use image::imageops;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::StitchError;
use crate::range::Range;

/// Paint the retained rows of every chunk onto one canvas, top to bottom.
///
/// The canvas is as wide as the first chunk. Chunks of another width are
/// neither scaled nor blended: narrower ones are left-aligned, wider ones are
/// clipped. A range that does not fit inside its own chunk is skipped with a
/// warning instead of failing the whole image.
pub fn compose(images: &[RgbaImage], ranges: &[Range]) -> Result<RgbaImage, StitchError> {
    let Some(first) = images.first() else {
        return Err(StitchError::InsufficientContent("no chunks to compose".into()));
    };
    if images.len() != ranges.len() {
        return Err(StitchError::RangeCountMismatch {
            images: images.len(),
            ranges: ranges.len(),
        });
    }

    let mut parts = Vec::with_capacity(images.len());
    for (index, (image, range)) in images.iter().zip(ranges).enumerate() {
        if range.is_empty() {
            continue;
        }
        if range.start < 0 || range.end > image.height() as i64 {
            warn!(
                index,
                start = range.start,
                end = range.end,
                chunk_height = image.height(),
                "range outside its chunk, skipping"
            );
            continue;
        }
        parts.push((image, *range));
    }

    let total: i64 = parts.iter().map(|(_, range)| range.height()).sum();
    if total <= 0 {
        return Err(StitchError::InsufficientContent("resolved ranges retain no rows".into()));
    }
    let height = u32::try_from(total).map_err(|_| StitchError::CanvasTooLarge(total as u64))?;
    let width = first.width();

    let mut canvas = RgbaImage::new(width, height);
    let mut cursor = 0i64;
    for (image, range) in &parts {
        let crop = imageops::crop_imm(*image, 0, range.start as u32, image.width(), range.height() as u32).to_image();
        imageops::replace(&mut canvas, &crop, 0, cursor);
        cursor += range.height();
    }

    debug!(width, height, drawn = parts.len(), chunks = images.len(), "composited");
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::striped;

    #[test]
    fn rows_are_stacked_in_order() {
        let images = vec![striped(4, 50, 0), striped(4, 50, 100)];
        let ranges = vec![Range::new(0, 30), Range::new(10, 50)];
        let out = compose(&images, &ranges).unwrap();
        assert_eq!(out.dimensions(), (4, 70));
        assert_eq!(out.get_pixel(0, 29).0[0], 29);
        assert_eq!(out.get_pixel(0, 30).0[0], 110);
        assert_eq!(out.get_pixel(3, 69).0[0], 149);
    }

    #[test]
    fn width_comes_from_the_first_chunk() {
        let images = vec![striped(10, 20, 0), striped(20, 20, 50), striped(5, 20, 100)];
        let ranges: Vec<Range> = images.iter().map(|i| Range::full(i.height())).collect();
        let out = compose(&images, &ranges).unwrap();
        assert_eq!(out.dimensions(), (10, 60));
        // Wider chunk clipped, narrower chunk left-aligned over a clear background.
        assert_eq!(out.get_pixel(9, 20).0[0], 50);
        assert_eq!(out.get_pixel(4, 40).0, [100, 100, 100, 255]);
        assert_eq!(out.get_pixel(5, 40).0, [0, 0, 0, 0]);
    }

    #[test]
    fn malformed_ranges_are_skipped() {
        let images = vec![striped(4, 50, 0), striped(4, 50, 0), striped(4, 50, 0)];
        let ranges = vec![Range::new(0, 20), Range::new(30, 80), Range::new(-5, 10)];
        let out = compose(&images, &ranges).unwrap();
        assert_eq!(out.height(), 20);
    }

    #[test]
    fn empty_output_is_insufficient_content() {
        assert!(matches!(compose(&[], &[]), Err(StitchError::InsufficientContent(_))));
        let images = vec![striped(4, 50, 0); 2];
        let ranges = vec![Range::new(10, 10), Range::new(40, 30)];
        assert!(matches!(
            compose(&images, &ranges),
            Err(StitchError::InsufficientContent(_))
        ));
    }

    #[test]
    fn range_count_must_match() {
        let images = vec![striped(4, 50, 0); 2];
        assert!(matches!(
            compose(&images, &[Range::full(50)]),
            Err(StitchError::RangeCountMismatch { images: 2, ranges: 1 })
        ));
    }
}
