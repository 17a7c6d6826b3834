use crate::terminal::TerminalSize;
use crate::{Result, DEFAULT_ANIMATION_FPS};
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbImage};
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// A resized, opaque RGB frame: `columns` wide and `rows * 2` pixels tall
pub type Frame = RgbImage;

/// What a media file turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Something the image decoders recognise (possibly animated)
    Image(ImageFormat),
    /// Anything else is handed to the video decoder
    Video,
}

/// Classify a file by its leading magic bytes rather than its name, so staged
/// temporary files without an extension are handled too.
pub fn probe_media(path: &Path) -> Result<MediaKind> {
    let mut header = Vec::with_capacity(64);
    File::open(path)?.take(64).read_to_end(&mut header)?;

    let kind = match image::guess_format(&header) {
        Ok(format) => MediaKind::Image(format),
        Err(_) => MediaKind::Video,
    };
    debug!("Probed '{}' as {:?}", path.display(), kind);
    Ok(kind)
}

/// Resize to exactly the session's pixel grid, ignoring the source aspect ratio.
/// Any alpha channel is dropped.
pub fn resize_frame(image: &DynamicImage, size: TerminalSize) -> Frame {
    let (width, height) = size.pixel_dimensions();
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (width, height) {
        return rgb;
    }
    image::imageops::resize(&rgb, width, height, FilterType::CatmullRom)
}

/// Composed frames of an animated image, or `None` for a still
fn decode_animation(path: &Path, format: ImageFormat) -> Result<Option<Vec<image::Frame>>> {
    let reader = || -> Result<BufReader<File>> { Ok(BufReader::new(File::open(path)?)) };

    let frames = match format {
        ImageFormat::Gif => GifDecoder::new(reader()?)?.into_frames().collect_frames()?,
        ImageFormat::Png => {
            let decoder = PngDecoder::new(reader()?)?;
            if !decoder.is_apng() {
                return Ok(None);
            }
            decoder.apng().into_frames().collect_frames()?
        }
        // Still WebP files either fail here or come back as a single frame
        ImageFormat::WebP => match WebPDecoder::new(reader()?)?.into_frames().collect_frames() {
            Ok(frames) => frames,
            Err(e) => {
                debug!("'{}' is not an animated WebP: {}", path.display(), e);
                return Ok(None);
            }
        },
        _ => return Ok(None),
    };

    // Single-frame results go through the still decoder instead
    Ok((frames.len() > 1).then_some(frames))
}

/// Frames decoded from a still or animated image, already resized
pub struct ImageSource {
    frames: Vec<Frame>,
    delays: Vec<Duration>,
    source_dimensions: (u32, u32),
}

impl ImageSource {
    /// Decode every frame of an image file and resize it to `size`.
    ///
    /// Animated GIF, APNG and WebP files yield one frame per embedded frame;
    /// everything else is decoded as a single still.
    pub fn open(path: &Path, format: ImageFormat, size: TerminalSize) -> Result<Self> {
        if let Some(raw_frames) = decode_animation(path, format)? {
            let source_dimensions = raw_frames
                .first()
                .map(|frame| frame.buffer().dimensions())
                .unwrap_or((0, 0));

            let mut frames = Vec::with_capacity(raw_frames.len());
            let mut delays = Vec::with_capacity(raw_frames.len());
            for frame in raw_frames {
                let (numer, denom) = frame.delay().numer_denom_ms();
                delays.push(Duration::from_secs_f64(numer as f64 / denom.max(1) as f64 / 1000.0));
                frames.push(resize_frame(&DynamicImage::ImageRgba8(frame.into_buffer()), size));
            }

            info!(
                "Decoded {} frame(s) from '{}' ({}x{})",
                frames.len(),
                path.display(),
                source_dimensions.0,
                source_dimensions.1
            );
            return Ok(Self {
                frames,
                delays,
                source_dimensions,
            });
        }

        let image = image::io::Reader::open(path)?
            .with_guessed_format()?
            .decode()?;
        let source_dimensions = (image.width(), image.height());
        info!(
            "Decoded still image '{}' ({}x{})",
            path.display(),
            source_dimensions.0,
            source_dimensions.1
        );

        Ok(Self {
            frames: vec![resize_frame(&image, size)],
            delays: vec![Duration::ZERO],
            source_dimensions,
        })
    }

    /// Build a source from frames already in memory
    pub fn from_frames(frames: Vec<Frame>, delay: Duration) -> Self {
        let source_dimensions = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let delays = vec![delay; frames.len()];
        Self {
            frames,
            delays,
            source_dimensions,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Dimensions of the image before resizing
    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    /// Playback rate taken from the first frame's delay
    pub fn frame_rate(&self) -> f64 {
        match self.delays.first() {
            Some(delay) if !delay.is_zero() => 1.0 / delay.as_secs_f64(),
            _ => DEFAULT_ANIMATION_FPS,
        }
    }

    /// Consume the source as a frame sequence, optionally repeating forever
    pub fn into_frames(self, looping: bool) -> Box<dyn Iterator<Item = Result<Frame>> + Send> {
        if looping && !self.frames.is_empty() {
            Box::new(self.frames.into_iter().cycle().map(Ok))
        } else {
            Box::new(self.frames.into_iter().map(Ok))
        }
    }
}
