use image::{Rgb, RgbImage};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Rgb888,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid row stride {row_stride} for a {width} pixel wide {format:?} frame")]
    InvalidRowStride {
        row_stride: usize,
        width: u32,
        format: PixelFormat,
    },
    #[error("Frame buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// A single camera image.
///
/// The frame owns its pixel buffer; handing it to
/// [`ImageClassifierHelper::classify`](crate::ImageClassifierHelper::classify)
/// moves it in and the buffer is released before that call returns.
#[derive(Debug)]
pub struct Frame<B = Vec<u8>> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes between the start of two consecutive rows.
    pub row_stride: usize,
    pub rotation_degrees: i32,
    pub buffer: B,
}

impl<B: AsRef<[u8]>> Frame<B> {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        rotation_degrees: i32,
        buffer: B,
    ) -> Self {
        Self {
            width,
            height,
            format,
            row_stride: width as usize * format.bytes_per_pixel(),
            rotation_degrees,
            buffer,
        }
    }

    pub fn with_row_stride(mut self, row_stride: usize) -> Self {
        self.row_stride = row_stride;
        self
    }

    /// Copies the pixel buffer into a dense RGB image, dropping alpha and
    /// any row padding.
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let bpp = self.format.bytes_per_pixel();
        let row_len = self.width as usize * bpp;
        if self.row_stride < row_len {
            return Err(FrameError::InvalidRowStride {
                row_stride: self.row_stride,
                width: self.width,
                format: self.format,
            });
        }

        let data = self.buffer.as_ref();
        let expected = self
            .row_stride
            .checked_mul(self.height as usize - 1)
            .and_then(|len| len.checked_add(row_len))
            .ok_or(FrameError::InvalidRowStride {
                row_stride: self.row_stride,
                width: self.width,
                format: self.format,
            })?;
        if data.len() < expected {
            return Err(FrameError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }

        let row_stride = self.row_stride;
        let format = self.format;
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            let offset = y as usize * row_stride + x as usize * bpp;
            match format {
                PixelFormat::Rgba8888 | PixelFormat::Rgb888 => {
                    Rgb([data[offset], data[offset + 1], data[offset + 2]])
                }
                PixelFormat::Gray8 => Rgb([data[offset]; 3]),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_frame_drops_alpha() {
        let buffer = vec![
            255, 0, 0, 255, //
            0, 255, 0, 128, //
            0, 0, 255, 0, //
            10, 20, 30, 40,
        ];
        let frame = Frame::new(2, 2, PixelFormat::Rgba8888, 0, buffer);

        let image = frame.to_rgb_image().unwrap();

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0, 255, 0]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([0, 0, 255]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_row_padding_is_skipped() {
        // 2x2 RGB with 2 padding bytes per row
        let buffer = vec![
            1, 2, 3, 4, 5, 6, 0xEE, 0xEE, //
            7, 8, 9, 10, 11, 12,
        ];
        let frame = Frame::new(2, 2, PixelFormat::Rgb888, 0, buffer).with_row_stride(8);

        let image = frame.to_rgb_image().unwrap();

        assert_eq!(image.get_pixel(1, 0), &Rgb([4, 5, 6]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([7, 8, 9]));
    }

    #[test]
    fn test_gray_frame_is_replicated() {
        let frame = Frame::new(1, 1, PixelFormat::Gray8, 90, vec![77u8]);

        let image = frame.to_rgb_image().unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgb([77, 77, 77]));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let frame = Frame::new(4, 4, PixelFormat::Rgba8888, 0, vec![0u8; 10]);

        assert_eq!(
            frame.to_rgb_image(),
            Err(FrameError::BufferTooSmall {
                expected: 64,
                actual: 10
            })
        );
    }

    #[test]
    fn test_overflowing_row_stride_is_rejected() {
        let frame = Frame::new(2, 3, PixelFormat::Rgb888, 0, vec![0u8; 18])
            .with_row_stride(usize::MAX / 2 + 1);

        assert_eq!(
            frame.to_rgb_image(),
            Err(FrameError::InvalidRowStride {
                row_stride: usize::MAX / 2 + 1,
                width: 2,
                format: PixelFormat::Rgb888
            })
        );
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let frame = Frame::new(0, 4, PixelFormat::Rgb888, 0, Vec::new());

        assert!(matches!(
            frame.to_rgb_image(),
            Err(FrameError::InvalidDimensions { .. })
        ));
    }
}
