#[cfg(feature = "v4l-camera")]
pub mod camera;
pub mod decoder;
pub mod device;
pub mod errors;
pub mod still;

#[cfg(feature = "v4l-camera")]
pub use camera::{V4lCamera, V4lEnumerator, V4lStream};
pub use decoder::{FrameDecoder, YuyvDecoder};
#[cfg(feature = "v4l-camera")]
pub use decoder::MjpegDecoder;
pub use device::{DeviceEnumerator, DeviceInfo, DeviceRetryPolicy, DeviceSelector, Facing};
pub use errors::{CaptureError, DecodeError, NoDeviceError};
pub use still::StillImageSource;

use schema::RawFrame;

/// Camera collaborator contract.
pub trait FrameSource {
    /// Next frame of the continuous stream, `None` once the source has ended.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError>;

    /// Take a single photo for discrete analysis.
    fn capture(&mut self) -> Result<RawFrame, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        (**self).next_frame()
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        (**self).capture()
    }
}
