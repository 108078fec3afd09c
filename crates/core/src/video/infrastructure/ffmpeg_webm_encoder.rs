use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use tempfile::TempDir;

use crate::shared::frame::{Frame, FrameSize};
use crate::video::domain::chunk_encoder::{ChunkEncoder, EncoderError};

/// Video codec carried in the WebM container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WebmCodec {
    #[default]
    Vp9,
    Vp8,
}

impl WebmCodec {
    fn encoder_name(self) -> &'static str {
        match self {
            WebmCodec::Vp9 => "libvpx-vp9",
            WebmCodec::Vp8 => "libvpx",
        }
    }
}

impl std::str::FromStr for WebmCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vp9" => Ok(WebmCodec::Vp9),
            "vp8" => Ok(WebmCodec::Vp8),
            other => Err(format!("unknown codec '{other}' (expected vp9 or vp8)")),
        }
    }
}

/// Encodes RGB frames to a live-mode WebM stream via ffmpeg-next.
///
/// The muxer writes into a scratch file with per-packet flushing; after
/// each packet the newly appended bytes are read back and returned as a
/// chunk. Live mode keeps the muxer from seeking back, so the chunks
/// concatenate to exactly the bytes of the finished file.
pub struct FfmpegWebmEncoder {
    codec: WebmCodec,
    scratch: Option<Scratch>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    size: FrameSize,
    fps: i32,
    frame_count: i64,
}

struct Scratch {
    _dir: TempDir,
    path: PathBuf,
    offset: u64,
}

impl Scratch {
    /// Returns everything appended since the previous call.
    fn drain(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
        let mut file = File::open(&self.path).map_err(io_failed)?;
        file.seek(SeekFrom::Start(self.offset)).map_err(io_failed)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_failed)?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        self.offset += bytes.len() as u64;
        Ok(vec![bytes])
    }
}

// Safety: FfmpegWebmEncoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWebmEncoder {}

impl FfmpegWebmEncoder {
    pub fn new(codec: WebmCodec) -> Self {
        Self {
            codec,
            scratch: None,
            octx: None,
            encoder: None,
            scaler: None,
            size: FrameSize::new(0, 0),
            fps: 30,
            frame_count: 0,
        }
    }

    fn open_inner(&mut self, size: FrameSize, fps: u32) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recording.webm");

        let mut octx = ffmpeg_next::format::output_as(&path, "webm")?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name(self.codec.encoder_name())
            .ok_or("encoder vanished after probe")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let fps_i = i32::try_from(fps).unwrap_or(30).max(1);

        encoder_ctx.set_width(size.width);
        encoder_ctx.set_height(size.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps_i));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps_i, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut codec_opts = ffmpeg_next::Dictionary::new();
        codec_opts.set("deadline", "realtime");
        codec_opts.set("cpu-used", "8");
        codec_opts.set("lag-in-frames", "0");
        let encoder = encoder_ctx.open_with(codec_opts)?;
        ost.set_parameters(&encoder);

        let mut mux_opts = ffmpeg_next::Dictionary::new();
        mux_opts.set("live", "1");
        mux_opts.set("flush_packets", "1");
        octx.write_header_with(mux_opts)?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            size.width,
            size.height,
            ffmpeg_next::format::Pixel::YUV420P,
            size.width,
            size.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.scratch = Some(Scratch {
            _dir: dir,
            path,
            offset: 0,
        });
        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.size = size;
        self.fps = fps_i;
        self.frame_count = 0;
        Ok(())
    }

    fn encode_inner(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let encoder = self.encoder.as_mut().ok_or("FfmpegWebmEncoder: not opened")?;
        let scaler = self.scaler.as_mut().ok_or("FfmpegWebmEncoder: not opened")?;
        let octx = self.octx.as_mut().ok_or("FfmpegWebmEncoder: not opened")?;

        if frame.size() != self.size || frame.channels() != 3 {
            return Err(format!(
                "frame {} does not match encoder size {}",
                frame.size(),
                self.size
            )
            .into());
        }

        let (width, height) = (self.size.width, self.size.height);
        let mut rgb_frame =
            ffmpeg_next::util::frame::video::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);

        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        let src = frame.data();
        let row_bytes = width as usize * 3;
        for row in 0..height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count));

        encoder.send_frame(&yuv_frame)?;
        write_pending_packets(encoder, octx, self.fps)?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish_inner(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) {
            encoder.send_eof()?;
            write_pending_packets(encoder, octx, self.fps)?;
            octx.write_trailer()?;
        }
        self.encoder = None;
        self.scaler = None;
        // Dropping the context closes the AVIO handle and flushes its buffer.
        self.octx = None;
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
        match self.scratch.as_mut() {
            Some(scratch) => scratch.drain(),
            None => Ok(Vec::new()),
        }
    }
}

impl ChunkEncoder for FfmpegWebmEncoder {
    fn open(&mut self, size: FrameSize, fps: u32) -> Result<(), EncoderError> {
        ffmpeg_next::init().map_err(|e| EncoderError::Unsupported(e.to_string()))?;

        if size.is_empty() {
            return Err(EncoderError::Failed(format!("cannot record at {size}")));
        }
        if ffmpeg_next::encoder::find_by_name(self.codec.encoder_name()).is_none() {
            return Err(EncoderError::Unsupported(format!(
                "{} encoder not available",
                self.codec.encoder_name()
            )));
        }

        self.open_inner(size, fps).map_err(|e| {
            self.reset();
            EncoderError::Failed(e.to_string())
        })?;

        log::info!(
            "Recording {} at {size}, {} fps",
            self.codec.encoder_name(),
            self.fps
        );
        Ok(())
    }

    fn encode(&mut self, frame: &Frame) -> Result<Vec<Vec<u8>>, EncoderError> {
        self.encode_inner(frame)
            .map_err(|e| EncoderError::Failed(e.to_string()))?;
        self.drain()
    }

    fn finish(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
        self.finish_inner()
            .map_err(|e| EncoderError::Failed(e.to_string()))?;
        let chunks = self.drain();
        log::debug!("Encoded {} frames", self.frame_count);
        self.scratch = None;
        chunks
    }
}

impl FfmpegWebmEncoder {
    fn reset(&mut self) {
        self.octx = None;
        self.encoder = None;
        self.scaler = None;
        self.scratch = None;
    }
}

fn write_pending_packets(
    encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    fps: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ost_time_base = octx.stream(0).ok_or("output stream missing")?.time_base();
    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(0);
        encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

fn io_failed(e: std::io::Error) -> EncoderError {
    EncoderError::Failed(e.to_string())
}
