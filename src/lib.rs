//! ANSI Player - a truecolor half-block video and image player for the terminal
//!
//! Frames are decoded, resized to the terminal's character grid (two pixel rows
//! per character row) and printed as `▀` glyphs whose foreground and background
//! colors carry the top and bottom pixel. Video playback runs a decoder thread
//! and a paced output loop connected by a bounded buffer, with the audio track
//! handed to an external player once the buffer is primed.

pub mod ansi;
pub mod audio;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod media;
pub mod playback;
pub mod renderer;
pub mod source;
pub mod terminal;

pub use ansi::{rgb_to_ansi, AnsiCache, ColorPair, Rgb};
pub use audio::{AudioTrack, ExternalAudio, Silent};
pub use buffer::{FrameBuffer, Readiness};
pub use cli::Cli;
pub use config::{AudioPlayer, PlayerSettings};
pub use decoder::{FrameSampler, VideoDecoder, VideoFrames, VideoInfo};
pub use media::StagedMedia;
pub use playback::{
    frame_interval, try_frame_interval, CancelHandle, PlaybackEvent, PlaybackReport,
    PlaybackSession, PlaybackState, RenderedFrame, SessionConfig,
};
pub use renderer::{render_frame, FrameRenderer, CURSOR_HOME, HALF_BLOCK, RESET};
pub use source::{probe_media, resize_frame, Frame, ImageSource, MediaKind};
pub use terminal::{TerminalGuard, TerminalSize};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Package description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Frames that must be buffered before timed output (and audio) starts
pub const DEFAULT_BUFSIZE: usize = 20;

/// Rate at which video frames are sampled for rendering
pub const DEFAULT_SAMPLE_FPS: f64 = 2.0;

/// Frame rate used for animations that do not declare a frame delay
pub const DEFAULT_ANIMATION_FPS: f64 = 10.0;

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Video decoding error: {0}")]
    VideoDecoding(#[from] ffmpeg_next::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid target dimensions: {columns}x{rows} characters")]
    InvalidDimensions { columns: u32, rows: u32 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration file error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Frame producer panicked")]
    ProducerPanicked,

    #[error("Interrupted")]
    Interrupted,
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds.max(0.0) as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

pub mod prelude;
