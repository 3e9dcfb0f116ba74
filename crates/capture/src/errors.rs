use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("jpeg decode failed: {0}")]
    Jpeg(String),
}

/// No usable camera after the bounded retry ran out. Terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no usable camera after {attempts} attempts: {last_error}")]
pub struct NoDeviceError {
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no video capture devices found")]
    NoDevicesFound,

    #[error(transparent)]
    NoDevice(#[from] NoDeviceError),

    #[error("device selection cancelled")]
    Cancelled,

    #[error("camera device error: {0}")]
    Device(String),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to read image {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("frame source has no more frames")]
    Exhausted,
}
