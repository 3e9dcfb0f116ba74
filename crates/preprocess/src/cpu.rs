use crate::{Preprocess, PreprocessError};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use schema::{INPUT_HEIGHT, INPUT_WIDTH, PixelFormat, RawFrame, TensorBuffer};

pub struct CpuPreProcessor {
    rgb_buffer: Vec<u8>,
    resizer: Resizer,
}

impl CpuPreProcessor {
    pub fn new() -> Self {
        Self {
            rgb_buffer: Vec::with_capacity(1920 * 1080 * 3),
            resizer: Resizer::new(),
        }
    }

    fn validate(frame: &RawFrame) -> Result<(), PreprocessError> {
        if frame.is_empty() {
            return Err(PreprocessError::ZeroDimensions {
                width: frame.width,
                height: frame.height,
            });
        }

        if matches!(frame.pixel_format, PixelFormat::Gray8 | PixelFormat::Yuyv) {
            return Err(PreprocessError::UnsupportedFormat(frame.pixel_format));
        }

        let expected = frame.expected_len();
        if frame.pixels.len() != expected {
            return Err(PreprocessError::SizeMismatch {
                expected,
                actual: frame.pixels.len(),
            });
        }

        Ok(())
    }

    /// Pack the frame as RGB into the scratch buffer, reordering BGR(A) and
    /// dropping alpha.
    fn copy_rgb_pixels(&mut self, frame: &RawFrame) -> Result<(), PreprocessError> {
        let _s = span!("copy_rgb_pixels");

        self.rgb_buffer.clear();

        match frame.pixel_format {
            PixelFormat::Rgb8 => self.rgb_buffer.extend_from_slice(&frame.pixels),
            PixelFormat::Bgr8 => {
                for px in frame.pixels.chunks_exact(3) {
                    self.rgb_buffer.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            PixelFormat::Rgba8 => {
                for px in frame.pixels.chunks_exact(4) {
                    self.rgb_buffer.extend_from_slice(&px[..3]);
                }
            }
            PixelFormat::Bgra8 => {
                for px in frame.pixels.chunks_exact(4) {
                    self.rgb_buffer.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            PixelFormat::Gray8 | PixelFormat::Yuyv => {
                return Err(PreprocessError::UnsupportedFormat(frame.pixel_format));
            }
        }

        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<Image<'static>, PreprocessError> {
        let _s = span!("resize");

        let src = ImageRef::new(width, height, &self.rgb_buffer, PixelType::U8x3)
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;

        let mut resized = Image::new(INPUT_WIDTH as u32, INPUT_HEIGHT as u32, PixelType::U8x3);

        self.resizer
            .resize(
                &src,
                &mut resized,
                &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
            )
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;

        Ok(resized)
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocess for CpuPreProcessor {
    /// Output values stay in the full `u8` range, RGB order, NHWC layout.
    #[tracing::instrument(skip_all, fields(frame = frame.frame_number))]
    fn preprocess(&mut self, frame: &RawFrame) -> Result<TensorBuffer, PreprocessError> {
        tracing::trace!(
            width = frame.width,
            height = frame.height,
            format = ?frame.pixel_format,
            pixel_bytes = frame.pixels.len(),
            "Preprocessing frame"
        );

        Self::validate(frame)?;
        self.copy_rgb_pixels(frame)?;
        let resized = self.resize(frame.width, frame.height)?;

        Ok(TensorBuffer::from_rgb(resized.into_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> RawFrame {
        let pixels = pixel.repeat((width * height) as usize);
        RawFrame::new(1, width, height, format, pixels)
    }

    fn assert_close(actual: u8, expected: u8) {
        assert!(
            actual.abs_diff(expected) <= 1,
            "expected ~{}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_rgb_frame_resizes_to_model_input() {
        let frame = solid_frame(640, 480, PixelFormat::Rgb8, &[10, 20, 30]);
        let mut preprocessor = CpuPreProcessor::new();

        let tensor = preprocessor.preprocess(&frame).unwrap();

        assert_eq!(tensor.shape(), &[1, 128, 128, 3]);
        assert_close(tensor.pixel(64, 64, 0), 10);
        assert_close(tensor.pixel(64, 64, 1), 20);
        assert_close(tensor.pixel(64, 64, 2), 30);
    }

    #[test]
    fn test_small_frame_is_upscaled() {
        let frame = solid_frame(2, 2, PixelFormat::Rgb8, &[200, 100, 50]);
        let tensor = CpuPreProcessor::new().preprocess(&frame).unwrap();

        assert_eq!(tensor.shape(), &[1, 128, 128, 3]);
        assert_close(tensor.pixel(0, 0, 0), 200);
        assert_close(tensor.pixel(127, 127, 2), 50);
    }

    #[test]
    fn test_bgr_channels_are_reordered() {
        let frame = solid_frame(64, 64, PixelFormat::Bgr8, &[255, 0, 0]);
        let tensor = CpuPreProcessor::new().preprocess(&frame).unwrap();

        // Blue in BGR lands in the last RGB channel
        assert_close(tensor.pixel(10, 10, 0), 0);
        assert_close(tensor.pixel(10, 10, 2), 255);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let rgba = solid_frame(32, 32, PixelFormat::Rgba8, &[1, 2, 3, 255]);
        let bgra = solid_frame(32, 32, PixelFormat::Bgra8, &[3, 2, 1, 0]);
        let mut preprocessor = CpuPreProcessor::new();

        let from_rgba = preprocessor.preprocess(&rgba).unwrap();
        let from_bgra = preprocessor.preprocess(&bgra).unwrap();

        assert_eq!(from_rgba, from_bgra);
        assert_close(from_rgba.pixel(5, 5, 0), 1);
        assert_close(from_rgba.pixel(5, 5, 2), 3);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let frame = RawFrame::new(1, 0, 480, PixelFormat::Rgb8, vec![]);
        let err = CpuPreProcessor::new().preprocess(&frame).unwrap_err();

        assert!(matches!(
            err,
            PreprocessError::ZeroDimensions {
                width: 0,
                height: 480
            }
        ));
    }

    #[test]
    fn test_unsupported_formats_rejected() {
        let mut preprocessor = CpuPreProcessor::new();

        for format in [PixelFormat::Gray8, PixelFormat::Yuyv] {
            let frame = RawFrame::new(1, 4, 4, format, vec![0; 4 * 4 * format.bytes_per_pixel()]);
            let err = preprocessor.preprocess(&frame).unwrap_err();
            assert!(matches!(err, PreprocessError::UnsupportedFormat(f) if f == format));
        }
    }

    #[test]
    fn test_buffer_size_mismatch_detection() {
        let frame = RawFrame::new(1, 10, 10, PixelFormat::Rgb8, vec![0u8; 200]);
        let err = CpuPreProcessor::new().preprocess(&frame).unwrap_err();

        assert!(
            err.to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let mut pixels = Vec::with_capacity(300 * 200 * 3);
        for i in 0..300 * 200 {
            pixels.extend_from_slice(&[(i % 251) as u8, (i % 13) as u8, (i % 97) as u8]);
        }
        let frame = RawFrame::new(1, 300, 200, PixelFormat::Rgb8, pixels);

        let a = CpuPreProcessor::new().preprocess(&frame).unwrap();
        let b = CpuPreProcessor::new().preprocess(&frame).unwrap();
        assert_eq!(a, b);
    }
}
