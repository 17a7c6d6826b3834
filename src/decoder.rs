use crate::source::Frame;
use crate::terminal::TerminalSize;
use crate::{PlayerError, Result};
use ffmpeg_next as ffmpeg;
use log::{debug, info};
use std::path::Path;

/// Fallback when a stream does not declare its frame rate
const FALLBACK_FPS: f64 = 25.0;

/// Stream properties reported by [`VideoDecoder`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
    pub has_audio: bool,
}

/// Video decoder that extracts frames from video files
pub struct VideoDecoder {
    input_context: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    time_base: ffmpeg::Rational,
    frame_count: u64,
    eof_sent: bool,
    info: VideoInfo,
}

impl VideoDecoder {
    /// Create a new VideoDecoder from a file path
    pub fn new(path: &Path) -> Result<Self> {
        if let Err(e) = ffmpeg::init() {
            debug!("FFmpeg init error: {:?}", e);
        }
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);

        debug!("Attempting to open video file: {}", path.display());
        let input_context = ffmpeg::format::input(&path)?;

        let stream = input_context
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| {
                PlayerError::Decode(format!("No video stream found in file '{}'", path.display()))
            })?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        info!("Found video stream {} in file '{}'", stream_index, path.display());

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            FALLBACK_FPS
        };

        let duration = if stream.duration() != ffmpeg::ffi::AV_NOPTS_VALUE && stream.duration() > 0 {
            stream.duration() as f64 * f64::from(time_base)
        } else if input_context.duration() > 0 {
            input_context.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let has_audio = input_context
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .is_some();

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            duration,
            has_audio,
        };
        debug!("Video info: {:?}", info);

        Ok(Self {
            input_context,
            stream_index,
            decoder,
            time_base,
            frame_count: 0,
            eof_sent: false,
            info,
        })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// Decoded frames so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Decode the next frame in native format and size
    pub fn next_frame(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    self.frame_count += 1;
                    return Ok(Some(decoded));
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }

            if self.eof_sent {
                return Ok(None);
            }

            match self.next_packet() {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        for (stream, packet) in self.input_context.packets() {
            if stream.index() == stream_index {
                return Some(packet);
            }
        }
        None
    }

    /// Presentation time of a decoded frame in seconds
    pub fn timestamp_of(&self, frame: &ffmpeg::frame::Video) -> f64 {
        match frame.timestamp() {
            Some(ts) if ts != ffmpeg::ffi::AV_NOPTS_VALUE => ts as f64 * f64::from(self.time_base),
            _ => self.frame_count.saturating_sub(1) as f64 / self.info.fps,
        }
    }
}

/// Keeps at most one frame per `1 / fps` seconds of presentation time.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: f64,
    next_due: Option<f64>,
}

impl FrameSampler {
    pub fn new(fps: f64) -> Self {
        Self {
            interval: 1.0 / fps,
            next_due: None,
        }
    }

    /// Whether the frame at `timestamp` should be kept
    pub fn accept(&mut self, timestamp: f64) -> bool {
        const EPSILON: f64 = 1e-6;

        match self.next_due {
            None => {
                self.next_due = Some(timestamp + self.interval);
                true
            }
            Some(due) if timestamp + EPSILON >= due => {
                let mut next = due + self.interval;
                while next <= timestamp + EPSILON {
                    next += self.interval;
                }
                self.next_due = Some(next);
                true
            }
            Some(_) => false,
        }
    }
}

/// Single-pass sequence of sampled video frames scaled to the session grid
pub struct VideoFrames {
    decoder: VideoDecoder,
    sampler: FrameSampler,
    size: TerminalSize,
    scaler: Option<(ffmpeg::software::scaling::Context, ffmpeg::format::Pixel, u32, u32)>,
    finished: bool,
}

impl VideoFrames {
    /// Open `path` and sample it at `sample_fps` (capped at the native rate)
    pub fn open(path: &Path, size: TerminalSize, sample_fps: f64) -> Result<Self> {
        let decoder = VideoDecoder::new(path)?;
        let fps = sample_fps.min(decoder.info().fps);
        info!(
            "Sampling '{}' at {:.2} FPS into {}x{} pixels",
            path.display(),
            fps,
            size.pixel_dimensions().0,
            size.pixel_dimensions().1
        );

        Ok(Self {
            decoder,
            sampler: FrameSampler::new(fps),
            size,
            scaler: None,
            finished: false,
        })
    }

    /// Get the underlying decoder reference
    pub fn decoder(&self) -> &VideoDecoder {
        &self.decoder
    }

    fn scale(&mut self, frame: &ffmpeg::frame::Video) -> Result<Frame> {
        let (width, height) = self.size.pixel_dimensions();
        let input = (frame.format(), frame.width(), frame.height());

        let stale = match &self.scaler {
            Some((_, format, w, h)) => (*format, *w, *h) != input,
            None => true,
        };
        if stale {
            let context = ffmpeg::software::scaling::Context::get(
                input.0,
                input.1,
                input.2,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some((context, input.0, input.1, input.2));
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Some((scaler, ..)) = self.scaler.as_mut() {
            scaler.run(frame, &mut rgb_frame)?;
        }

        let stride = rgb_frame.stride(0);
        let row_bytes = width as usize * 3;
        let data = rgb_frame.data(0);
        if height == 0 || data.len() < stride * (height as usize - 1) + row_bytes {
            return Err(PlayerError::Decode(format!(
                "Scaled frame is smaller than {}x{}",
                width, height
            )));
        }

        // Rows may be padded to the stride; copy them out tightly packed.
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        Frame::from_raw(width, height, pixels)
            .ok_or_else(|| PlayerError::Decode("Scaled frame has unexpected size".to_string()))
    }
}

impl Iterator for VideoFrames {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => {
                    let timestamp = self.decoder.timestamp_of(&frame);
                    if !self.sampler.accept(timestamp) {
                        continue;
                    }
                    debug!(
                        "Sampled frame {} at {:.3}s",
                        self.decoder.frame_count(),
                        timestamp
                    );
                    let scaled = self.scale(&frame);
                    if scaled.is_err() {
                        self.finished = true;
                    }
                    return Some(scaled);
                }
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba, RgbaImage};
    use std::path::PathBuf;

    #[test]
    fn test_invalid_file() {
        let invalid_path = PathBuf::from("nonexistent.mp4");
        let result = VideoDecoder::new(&invalid_path);
        assert!(result.is_err(), "Should fail for nonexistent file");
    }

    #[test]
    fn test_sampler_downsamples() {
        let mut sampler = FrameSampler::new(2.0);
        let kept: Vec<bool> = (0..12).map(|i| sampler.accept(i as f64 / 6.0)).collect();
        // 6 FPS input sampled at 2 FPS keeps every third frame
        assert_eq!(
            kept,
            vec![true, false, false, true, false, false, true, false, false, true, false, false]
        );
    }

    #[test]
    fn test_sampler_keeps_everything_below_rate() {
        let mut sampler = FrameSampler::new(10.0);
        assert!((0..5).all(|i| sampler.accept(i as f64)));
    }

    #[test]
    fn test_sampler_skips_gaps_without_bursting() {
        let mut sampler = FrameSampler::new(2.0);
        assert!(sampler.accept(0.0));
        assert!(sampler.accept(3.0));
        // The next slot is after 3.0, not a backlog of missed slots
        assert!(!sampler.accept(3.1));
        assert!(sampler.accept(3.5));
    }

    #[test]
    fn test_animated_gif_decodes_as_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        {
            let mut encoder = GifEncoder::new(std::fs::File::create(&path).unwrap());
            for shade in [0u8, 60, 120, 180] {
                let buffer = RgbaImage::from_pixel(16, 16, Rgba([shade, 255 - shade, 0, 255]));
                encoder
                    .encode_frame(image::Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1)))
                    .unwrap();
            }
        }

        let size = TerminalSize::new(5, 3).unwrap();
        let frames: Vec<Frame> = VideoFrames::open(&path, size, 100.0)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert!(!frames.is_empty());
        assert!(frames.len() <= 4);
        for frame in frames {
            assert_eq!(frame.dimensions(), (5, 6));
        }
    }
}
