use crate::FrameSource;
use crate::decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
use crate::device::{DeviceEnumerator, DeviceInfo, Facing};
use crate::errors::CaptureError;
use schema::{PixelFormat, RawFrame};
use v4l::{
    Device, FourCC,
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
    video::Capture,
};

const BUFFER_COUNT: u32 = 4;

/// Frames discarded before a one-shot capture so the photo is fresh.
const FLUSH_FRAME_COUNT: usize = 4;

const FOURCC_YUYV: FourCC = FourCC { repr: *b"YUYV" };
const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Yuyv,
    Mjpeg,
}

fn device_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Device(e.to_string())
}

/// Enumerates V4L2 nodes that can capture video.
#[derive(Debug, Default, Clone, Copy)]
pub struct V4lEnumerator;

impl DeviceEnumerator for V4lEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let devices = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let caps = Device::with_path(node.path())
                    .and_then(|d| d.query_caps())
                    .ok()?;
                if !caps
                    .capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                {
                    return None;
                }
                Some(DeviceInfo {
                    index: node.index() as u32,
                    facing: Facing::from_names(&caps.card, &caps.bus),
                    name: caps.card,
                })
            })
            .collect();

        Ok(devices)
    }
}

/// Select best pixel format: prefer YUYV (faster decode), fallback to MJPEG
fn select_format(device: &Device) -> Result<WireFormat, CaptureError> {
    let formats = device.enum_formats().map_err(device_error)?;

    for fmt in &formats {
        tracing::debug!("  {:?}: {}", fmt.fourcc, fmt.description);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_YUYV) {
        return Ok(WireFormat::Yuyv);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Ok(WireFormat::Mjpeg);
    }

    Err(CaptureError::Device(format!(
        "camera supports neither YUYV nor MJPEG, available: {:?}",
        formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
    )))
}

/// An opened V4L2 camera with its negotiated format.
pub struct V4lCamera {
    device: Device,
    width: u32,
    height: u32,
    wire_format: WireFormat,
}

impl V4lCamera {
    pub fn open(info: &DeviceInfo) -> Result<Self, CaptureError> {
        let device = Device::new(info.index as usize).map_err(device_error)?;

        let caps = device.query_caps().map_err(device_error)?;
        tracing::info!("Camera opened: {} ({})", caps.card, caps.driver);

        let wire_format = select_format(&device)?;
        let fourcc = match wire_format {
            WireFormat::Yuyv => FOURCC_YUYV,
            WireFormat::Mjpeg => FOURCC_MJPG,
        };

        let mut format = device.format().map_err(device_error)?;
        format.fourcc = fourcc;
        let format = device.set_format(&format).map_err(device_error)?;

        tracing::info!(
            "Capture format: {}x{} {:?} ({:?})",
            format.width,
            format.height,
            format.fourcc,
            wire_format
        );

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            wire_format,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Start streaming. The returned source borrows the camera.
    pub fn stream(&self) -> Result<V4lStream<'_>, CaptureError> {
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(device_error)?;

        let decoder: Box<dyn FrameDecoder> = match self.wire_format {
            WireFormat::Yuyv => Box::new(YuyvDecoder::new()),
            WireFormat::Mjpeg => Box::new(MjpegDecoder::new()?),
        };

        Ok(V4lStream {
            stream,
            decoder,
            width: self.width,
            height: self.height,
            frame_count: 0,
        })
    }
}

pub struct V4lStream<'a> {
    stream: Stream<'a>,
    decoder: Box<dyn FrameDecoder>,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl V4lStream<'_> {
    /// Discard buffered frames so the next one reflects the current scene.
    fn flush(&mut self) -> usize {
        (0..FLUSH_FRAME_COUNT)
            .take_while(|_| self.stream.next().is_ok())
            .count()
    }

    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        let (buf, _meta) = self.stream.next().map_err(device_error)?;
        let rgb = self.decoder.decode(buf, self.width, self.height)?;

        let frame = RawFrame::new(
            self.frame_count,
            self.width,
            self.height,
            PixelFormat::Rgb8,
            rgb.to_vec(),
        );
        self.frame_count += 1;
        Ok(frame)
    }
}

impl FrameSource for V4lStream<'_> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        self.read_frame().map(Some)
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        let flushed = self.flush();
        if flushed > 0 {
            tracing::debug!("Flushed {} stale frames before capture", flushed);
        }
        self.read_frame()
    }
}
