use crate::FrameSource;
use crate::errors::CaptureError;
use schema::{PixelFormat, RawFrame};
use std::path::{Path, PathBuf};

/// Frame source backed by a single decoded image.
///
/// `capture` returns the image every time. `next_frame` yields it once and
/// then reports the stream as finished.
pub struct StillImageSource {
    frame: RawFrame,
    next_frame_number: u64,
    streamed: bool,
}

impl StillImageSource {
    /// Decode an image file (JPEG or PNG) to RGB.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| CaptureError::Image {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        tracing::debug!(path = %path.display(), width, height, "Loaded still image");

        Ok(Self::from_frame(RawFrame::new(
            0,
            width,
            height,
            PixelFormat::Rgb8,
            rgb.into_raw(),
        )))
    }

    pub fn from_frame(frame: RawFrame) -> Self {
        Self {
            next_frame_number: frame.frame_number,
            frame,
            streamed: false,
        }
    }

    fn emit(&mut self) -> RawFrame {
        let mut frame = self.frame.clone();
        frame.frame_number = self.next_frame_number;
        self.next_frame_number += 1;
        frame
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        if self.streamed {
            return Ok(None);
        }
        self.streamed = true;
        Ok(Some(self.emit()))
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        Ok(self.emit())
    }
}
