/// Pixel layout of a camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Gray8,
    /// Packed YUV 4:2:2, two pixels per four bytes.
    Yuyv,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
            PixelFormat::Yuyv => 2,
        }
    }
}

/// One image as delivered by the camera collaborator.
///
/// Frames are handed to the preprocessor once and then dropped.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    pub fn new(
        frame_number: u64,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            frame_number,
            width,
            height,
            pixel_format,
            pixels,
        }
    }

    /// Byte length implied by the dimensions and pixel format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_follows_pixel_format() {
        let frame = RawFrame::new(0, 4, 2, PixelFormat::Bgra8, vec![]);
        assert_eq!(frame.expected_len(), 32);

        let frame = RawFrame::new(0, 4, 2, PixelFormat::Yuyv, vec![]);
        assert_eq!(frame.expected_len(), 16);
    }

    #[test]
    fn zero_dimension_frame_is_empty() {
        assert!(RawFrame::new(0, 0, 10, PixelFormat::Rgb8, vec![]).is_empty());
        assert!(RawFrame::new(0, 10, 0, PixelFormat::Rgb8, vec![]).is_empty());
        assert!(!RawFrame::new(0, 1, 1, PixelFormat::Rgb8, vec![0; 3]).is_empty());
    }
}
