use bytes::Bytes;
use image::{GrayImage, RgbaImage};

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit B, G, R, A (the usual screen-capture layout).
    Bgra8,
    /// Packed 8-bit R, G, B, A.
    Rgba8,
    /// Planar 4:2:0: a full-resolution luma plane followed by an interleaved
    /// half-resolution CbCr plane. Full-range BT.601.
    Nv12,
}

impl PixelFormat {
    pub fn is_planar(self) -> bool {
        matches!(self, PixelFormat::Nv12)
    }

    /// Bytes per pixel in the primary plane (luma for planar formats).
    pub fn primary_bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Nv12 => 1,
        }
    }
}

/// A raw captured frame.
///
/// Plane layout:
///
///   primary  `height` rows of `stride` bytes. Packed pixels, or luma for NV12.
///   chroma   NV12 only: `ceil(height / 2)` rows of `stride` bytes, each row
///            holding `ceil(width / 2)` interleaved Cb, Cr pairs.
///
/// Planes are `Bytes`, so clones share the backing buffer. Use
/// [`Frame::deep_copy`] before holding on to a frame whose buffer the capture
/// side may recycle.
#[derive(Debug, Clone)]
///
/// Fields are only reachable through accessors, so a frame that passed
/// validation stays valid and row access never runs past a plane.
pub struct Frame {
    format: PixelFormat,
    width: u32,
    height: u32,
    /// Bytes per row of every plane.
    stride: usize,
    primary: Bytes,
    chroma: Option<Bytes>,
    /// Unix millis at which the frame was delivered.
    captured_at_ms: i64,
}

impl Frame {
    /// Wrap a packed (BGRA or RGBA) buffer.
    pub fn packed(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: usize,
        data: impl Into<Bytes>,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        if format.is_planar() {
            return Err(FrameError::WrongLayout(format));
        }
        let frame = Self {
            format,
            width,
            height,
            stride,
            primary: data.into(),
            chroma: None,
            captured_at_ms,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Wrap NV12 luma and chroma planes sharing one stride.
    pub fn nv12(
        width: u32,
        height: u32,
        stride: usize,
        luma: impl Into<Bytes>,
        chroma: impl Into<Bytes>,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        let frame = Self {
            format: PixelFormat::Nv12,
            width,
            height,
            stride,
            primary: luma.into(),
            chroma: Some(chroma.into()),
            captured_at_ms,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Build a tightly packed RGBA frame from a decoded image.
    pub fn from_rgba(image: &RgbaImage, captured_at_ms: i64) -> Result<Self, FrameError> {
        Self::packed(
            PixelFormat::Rgba8,
            image.width(),
            image.height(),
            image.width() as usize * 4,
            Bytes::copy_from_slice(image.as_raw()),
            captured_at_ms,
        )
    }

    fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        let min_stride = self.row_bytes();
        if self.stride < min_stride {
            return Err(FrameError::StrideTooSmall {
                stride: self.stride,
                min: min_stride,
            });
        }
        let expected = self.stride * self.height as usize;
        if self.primary.len() < expected {
            return Err(FrameError::BufferTooShort {
                plane: "primary",
                got: self.primary.len(),
                expected,
            });
        }
        if self.format.is_planar() {
            let chroma = self.chroma.as_ref().ok_or(FrameError::MissingChroma)?;
            let expected = self.stride * self.height.div_ceil(2) as usize;
            if chroma.len() < expected {
                return Err(FrameError::BufferTooShort {
                    plane: "chroma",
                    got: chroma.len(),
                    expected,
                });
            }
        }
        Ok(())
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Packed pixels, or luma for NV12.
    pub fn primary(&self) -> &Bytes {
        &self.primary
    }

    pub fn chroma(&self) -> Option<&Bytes> {
        self.chroma.as_ref()
    }

    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at_ms
    }

    /// Visible bytes per row of the primary plane (excludes stride padding).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.primary_bytes_per_pixel()
    }

    /// Visible bytes of row `y` in the primary plane.
    pub fn primary_row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.primary[start..start + self.row_bytes()]
    }

    /// Whether two frames can be compared byte for byte.
    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.format == other.format
            && self.width == other.width
            && self.height == other.height
            && self.stride == other.stride
    }

    /// Copy every plane into freshly allocated storage.
    pub fn deep_copy(&self) -> Frame {
        Frame {
            primary: Bytes::copy_from_slice(&self.primary),
            chroma: self.chroma.as_ref().map(|c| Bytes::copy_from_slice(c)),
            ..self.clone()
        }
    }

    /// 8-bit luma of the frame, as consumed by shift oracles.
    pub fn to_luma(&self) -> GrayImage {
        let (w, h) = (self.width, self.height);
        let mut out = Vec::with_capacity(w as usize * h as usize);
        for y in 0..h {
            let row = self.primary_row(y);
            match self.format {
                PixelFormat::Nv12 => out.extend_from_slice(row),
                PixelFormat::Bgra8 => out.extend(row.chunks_exact(4).map(|p| luma(p[2], p[1], p[0]))),
                PixelFormat::Rgba8 => out.extend(row.chunks_exact(4).map(|p| luma(p[0], p[1], p[2]))),
            }
        }
        GrayImage::from_raw(w, h, out).unwrap_or_else(|| GrayImage::new(w, h))
    }

    /// Opaque RGBA rendition of the frame, as persisted in chunks.
    pub fn to_rgba(&self) -> RgbaImage {
        let (w, h) = (self.width, self.height);
        let mut out = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            let row = self.primary_row(y);
            match self.format {
                PixelFormat::Rgba8 => out.extend_from_slice(row),
                PixelFormat::Bgra8 => {
                    for p in row.chunks_exact(4) {
                        out.extend_from_slice(&[p[2], p[1], p[0], p[3]]);
                    }
                }
                PixelFormat::Nv12 => {
                    let chroma = self.chroma.as_deref().unwrap_or_default();
                    let chroma_row = (y / 2) as usize * self.stride;
                    for (x, &luma) in row.iter().enumerate() {
                        let at = chroma_row + (x / 2) * 2;
                        let (cb, cr) = match chroma.get(at..at + 2) {
                            Some(pair) => (pair[0], pair[1]),
                            None => (128, 128),
                        };
                        let [r, g, b] = ycbcr_to_rgb(luma, cb, cr);
                        out.extend_from_slice(&[r, g, b, 255]);
                    }
                }
            }
        }
        RgbaImage::from_raw(w, h, out).unwrap_or_else(|| RgbaImage::new(w, h))
    }
}

/// BT.601 luma with 8-bit fixed-point weights.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let clamp = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    [
        clamp(y + 1.402 * cr),
        clamp(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp(y + 1.772 * cb),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("row stride {stride} is smaller than the visible row ({min} bytes)")]
    StrideTooSmall { stride: usize, min: usize },
    #[error("{plane} plane too short: got {got} bytes, expected at least {expected}")]
    BufferTooShort {
        plane: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("planar frame is missing its chroma plane")]
    MissingChroma,
    #[error("{0:?} frames must be built with their planar constructor")]
    WrongLayout(PixelFormat),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_is_swizzled_to_rgba() {
        let frame = Frame::packed(PixelFormat::Bgra8, 1, 1, 4, vec![10, 20, 30, 255], 0).unwrap();
        assert_eq!(frame.to_rgba().get_pixel(0, 0).0, [30, 20, 10, 255]);
    }

    #[test]
    fn stride_padding_is_skipped() {
        // 2x2 RGBA with 4 bytes of padding per row.
        let mut data = vec![0u8; 12 * 2];
        data[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let frame = Frame::packed(PixelFormat::Rgba8, 2, 2, 12, data, 0).unwrap();
        let rgba = frame.to_rgba();
        assert_eq!(rgba.get_pixel(0, 1).0, [1, 2, 3, 4]);
        assert_eq!(frame.primary_row(1).len(), 8);
    }

    #[test]
    fn accessors_expose_the_validated_layout() {
        let image = RgbaImage::from_pixel(3, 5, image::Rgba([9, 8, 7, 255]));
        let frame = Frame::from_rgba(&image, 42).unwrap();
        assert_eq!(frame.format(), PixelFormat::Rgba8);
        assert_eq!((frame.width(), frame.height(), frame.stride()), (3, 5, 12));
        assert_eq!(frame.primary().len(), 60);
        assert!(frame.chroma().is_none());
        assert_eq!(frame.captured_at_ms(), 42);
        assert_eq!(frame.primary_row(frame.height() - 1), &[9u8, 8, 7, 255].repeat(3)[..]);
    }

    #[test]
    fn white_and_black_luma() {
        let frame = Frame::packed(
            PixelFormat::Rgba8,
            2,
            1,
            8,
            vec![255, 255, 255, 255, 0, 0, 0, 255],
            0,
        )
        .unwrap();
        let luma = frame.to_luma();
        assert_eq!(luma.get_pixel(0, 0).0, [255]);
        assert_eq!(luma.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn nv12_neutral_chroma_is_gray() {
        let frame = Frame::nv12(2, 2, 2, vec![128; 4], vec![128, 128], 0).unwrap();
        assert_eq!(frame.to_rgba().get_pixel(1, 1).0, [128, 128, 128, 255]);
        assert_eq!(frame.to_luma().get_pixel(1, 1).0, [128]);
    }

    #[test]
    fn deep_copy_detaches_from_source() {
        let frame = Frame::packed(PixelFormat::Rgba8, 1, 1, 4, vec![1, 2, 3, 4], 7).unwrap();
        let copy = frame.deep_copy();
        assert_ne!(frame.primary.as_ptr(), copy.primary.as_ptr());
        assert_eq!(frame.primary, copy.primary);
        assert_eq!(copy.captured_at_ms, 7);
    }

    #[test]
    fn short_buffer_rejected() {
        let err = Frame::packed(PixelFormat::Bgra8, 4, 4, 16, vec![0; 10], 0).unwrap_err();
        assert!(matches!(err, FrameError::BufferTooShort { expected: 64, .. }));
    }

    #[test]
    fn nv12_requires_chroma_rows() {
        let err = Frame::nv12(2, 4, 2, vec![0; 8], vec![0; 2], 0).unwrap_err();
        assert!(matches!(err, FrameError::BufferTooShort { plane: "chroma", .. }));
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(matches!(
            Frame::packed(PixelFormat::Rgba8, 0, 4, 0, Vec::<u8>::new(), 0),
            Err(FrameError::Empty { .. })
        ));
    }
}
