use crate::errors::DecodeError;
use common::span;

/// Decodes raw camera buffers to packed RGB (3 bytes per pixel).
pub trait FrameDecoder: Send {
    /// Returns a view into the decoder's internal buffer, valid until the next
    /// call.
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<&[u8], DecodeError>;
}

/// YUYV (YUV 4:2:2) decoder.
///
/// YUYV packs 2 pixels in 4 bytes: [Y0, U, Y1, V]
pub struct YuyvDecoder {
    rgb_buffer: Vec<u8>,
}

impl Default for YuyvDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl YuyvDecoder {
    pub fn new() -> Self {
        Self {
            rgb_buffer: Vec::with_capacity(1920 * 1080 * 3),
        }
    }
}

impl FrameDecoder for YuyvDecoder {
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<&[u8], DecodeError> {
        let _s = span!("decode_yuyv");

        if width == 0 || height == 0 || width % 2 != 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }

        let bytes_per_row = width as usize * 2;
        let expected = bytes_per_row * height as usize;
        if raw.len() < expected {
            return Err(DecodeError::BufferTooSmall {
                expected,
                actual: raw.len(),
            });
        }

        // Drivers may pad rows
        let stride = raw.len() / height as usize;

        self.rgb_buffer.clear();
        for row in 0..height as usize {
            let row_start = row * stride;
            let row_data = &raw[row_start..row_start + bytes_per_row];

            for chunk in row_data.chunks_exact(4) {
                let y0 = chunk[0] as i32;
                let u = chunk[1] as i32 - 128;
                let y1 = chunk[2] as i32;
                let v = chunk[3] as i32 - 128;

                // BT.601 fixed-point coefficients (8-bit fraction)
                let rv = (359 * v) >> 8;
                let gu = (88 * u + 183 * v) >> 8;
                let bu = (454 * u) >> 8;

                for y in [y0, y1] {
                    self.rgb_buffer.extend_from_slice(&[
                        (y + rv).clamp(0, 255) as u8,
                        (y - gu).clamp(0, 255) as u8,
                        (y + bu).clamp(0, 255) as u8,
                    ]);
                }
            }
        }

        Ok(&self.rgb_buffer)
    }
}

/// MJPEG decoder using turbojpeg (libjpeg-turbo)
#[cfg(feature = "v4l-camera")]
pub struct MjpegDecoder {
    decompressor: turbojpeg::Decompressor,
    rgb_buffer: Vec<u8>,
}

#[cfg(feature = "v4l-camera")]
impl MjpegDecoder {
    pub fn new() -> Result<Self, DecodeError> {
        let decompressor =
            turbojpeg::Decompressor::new().map_err(|e| DecodeError::Jpeg(e.to_string()))?;

        Ok(Self {
            decompressor,
            rgb_buffer: vec![0u8; 1920 * 1080 * 3],
        })
    }
}

#[cfg(feature = "v4l-camera")]
impl FrameDecoder for MjpegDecoder {
    /// Dimensions come from the JPEG header; the arguments are only checked
    /// against it.
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<&[u8], DecodeError> {
        let _s = span!("decode_mjpeg");

        let header = self
            .decompressor
            .read_header(raw)
            .map_err(|e| DecodeError::Jpeg(e.to_string()))?;

        if header.width != width as usize || header.height != height as usize {
            tracing::debug!(
                header_width = header.width,
                header_height = header.height,
                width,
                height,
                "MJPEG frame size differs from negotiated format"
            );
            return Err(DecodeError::InvalidDimensions {
                width: header.width as u32,
                height: header.height as u32,
            });
        }

        let rgb_size = header.width * header.height * 3;
        if self.rgb_buffer.len() < rgb_size {
            self.rgb_buffer.resize(rgb_size, 0);
        }

        let output = turbojpeg::Image {
            pixels: &mut self.rgb_buffer[..rgb_size],
            width: header.width,
            pitch: header.width * 3,
            height: header.height,
            format: turbojpeg::PixelFormat::RGB,
        };

        self.decompressor
            .decompress(raw, output)
            .map_err(|e| DecodeError::Jpeg(e.to_string()))?;

        Ok(&self.rgb_buffer[..rgb_size])
    }
}
