use std::io::ErrorKind;

use crate::shared::frame::Frame;
use crate::video::domain::capture_source::{CaptureError, CaptureSource};

// POSIX errno values; identical on Linux, macOS and the MSVC CRT.
const ENXIO: i32 = 6;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;

/// Which libavdevice input to open and how.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// libavdevice demuxer name (`v4l2`, `avfoundation`, `dshow`).
    pub input_format: String,
    /// Device URL understood by `input_format` (`/dev/video0`, `0`, `video=…`).
    pub device: String,
    pub framerate: Option<u32>,
    /// Requested capture size such as `1280x720`; the device may ignore it.
    pub video_size: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        let (input_format, device) = ("avfoundation", "0");
        #[cfg(target_os = "windows")]
        let (input_format, device) = ("dshow", "video=Integrated Camera");
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let (input_format, device) = ("v4l2", "/dev/video0");

        Self {
            input_format: input_format.to_string(),
            device: device.to_string(),
            framerate: Some(30),
            video_size: None,
        }
    }
}

/// Live camera input via libavdevice, decoded to RGB24 frames.
///
/// A change in the decoder's output size (e.g. after a device renegotiates
/// its mode) rebuilds the scaler, so subsequent frames carry the new size.
pub struct FfmpegCameraSource {
    config: CameraConfig,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ScalerState>,
    video_stream_index: usize,
    frame_index: usize,
}

struct ScalerState {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegCameraSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            input_ctx: None,
            decoder: None,
            scaler: None,
            video_stream_index: 0,
            frame_index: 0,
        }
    }

    fn find_input_format(&self) -> Result<ffmpeg_next::format::Input, CaptureError> {
        ffmpeg_next::device::input::video()
            .find(|f| f.name() == self.config.input_format)
            .ok_or_else(|| {
                CaptureError::NoDevice(format!(
                    "capture backend '{}' is not available in this ffmpeg build",
                    self.config.input_format
                ))
            })
    }

    fn options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut options = ffmpeg_next::Dictionary::new();
        if let Some(fps) = self.config.framerate {
            options.set("framerate", &fps.to_string());
        }
        if let Some(ref size) = self.config.video_size {
            options.set("video_size", size);
        }
        options
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<Frame, CaptureError> {
        let (width, height, format) = (decoded.width(), decoded.height(), decoded.format());

        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.width != width || s.height != height || s.format != format);
        if stale {
            if self.scaler.is_some() {
                log::info!("Camera resolution changed to {width}x{height}");
            }
            let context = ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
            self.scaler = Some(ScalerState {
                context,
                format,
                width,
                height,
            });
        }

        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("scaler unavailable".into()))?;
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler
            .context
            .run(decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }
}

impl CaptureSource for FfmpegCameraSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::Stream(e.to_string()))?;

        let input_format = self.find_input_format()?;
        let format = ffmpeg_next::format::format::Format::Input(input_format);
        let ctx = ffmpeg_next::format::open_with(&self.config.device, &format, self.options())
            .map_err(|e| classify_open_error(e, &self.config.device))?;

        let ictx = match ctx {
            ffmpeg_next::format::context::Context::Input(ictx) => ictx,
            ffmpeg_next::format::context::Context::Output(_) => {
                return Err(CaptureError::Stream("device opened as output".into()))
            }
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::NoDevice(self.config.device.clone()))?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        log::info!(
            "Opened camera {} ({}) at {}x{}",
            self.config.device,
            self.config.input_format,
            decoder.width(),
            decoder.height()
        );

        self.video_stream_index = video_stream_index;
        self.decoder = Some(decoder);
        self.input_ctx = Some(ictx);
        self.scaler = None;
        self.frame_index = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            let (Some(ictx), Some(decoder)) = (self.input_ctx.as_mut(), self.decoder.as_mut())
            else {
                return Ok(None);
            };

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    log::info!("Camera stream ended");
                    return Ok(None);
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if std::io::Error::from_raw_os_error(errno).kind() == ErrorKind::WouldBlock =>
                {
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    continue;
                }
                Err(e) => {
                    // Unplugged or revoked devices surface as read errors.
                    log::warn!("Camera read failed, treating as end of stream: {e}");
                    return Ok(None);
                }
            }

            if packet.stream() != self.video_stream_index {
                continue;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable camera packet: {e}");
            }
        }
    }

    fn close(&mut self) {
        if self.input_ctx.take().is_some() {
            log::info!("Closed camera {}", self.config.device);
        }
        self.decoder = None;
        self.scaler = None;
    }
}

/// Maps libavdevice open failures onto the capture error taxonomy.
fn classify_open_error(err: ffmpeg_next::Error, device: &str) -> CaptureError {
    match err {
        ffmpeg_next::Error::Other { errno } => {
            match std::io::Error::from_raw_os_error(errno).kind() {
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                ErrorKind::NotFound => CaptureError::NoDevice(device.to_string()),
                _ if errno == EBUSY => CaptureError::DeviceBusy,
                _ if errno == ENODEV || errno == ENXIO => CaptureError::NoDevice(device.to_string()),
                _ => CaptureError::Stream(err.to_string()),
            }
        }
        other => CaptureError::Stream(other.to_string()),
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::eacces(13, CaptureError::PermissionDenied)]
    #[case::eperm(1, CaptureError::PermissionDenied)]
    #[case::ebusy(EBUSY, CaptureError::DeviceBusy)]
    #[case::enoent(2, CaptureError::NoDevice("/dev/video9".into()))]
    #[case::enodev(ENODEV, CaptureError::NoDevice("/dev/video9".into()))]
    fn test_classify_open_error(#[case] errno: i32, #[case] expected: CaptureError) {
        let err = ffmpeg_next::Error::Other { errno };
        assert_eq!(classify_open_error(err, "/dev/video9"), expected);
    }

    #[test]
    fn test_classify_other_errors_as_stream() {
        let err = classify_open_error(ffmpeg_next::Error::InvalidData, "/dev/video0");
        assert!(matches!(err, CaptureError::Stream(_)));
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let mut source = FfmpegCameraSource::new(CameraConfig {
            device: "/nonexistent/camera/device".into(),
            ..CameraConfig::default()
        });
        let err = source.open().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::NoDevice(_) | CaptureError::Stream(_)
        ));
    }

    #[test]
    fn test_next_frame_before_open_is_end_of_stream() {
        let mut source = FfmpegCameraSource::new(CameraConfig::default());
        assert!(source.next_frame().unwrap().is_none());
        source.close();
    }

    #[test]
    fn test_default_config_requests_30fps() {
        assert_eq!(CameraConfig::default().framerate, Some(30));
    }
}
