//! Prelude module for convenient imports
pub use crate::ansi::{rgb_to_ansi, AnsiCache, ColorPair};
pub use crate::audio::{AudioTrack, ExternalAudio, Silent};
pub use crate::buffer::FrameBuffer;
pub use crate::config::PlayerSettings;
pub use crate::playback::{
    frame_interval, try_frame_interval, CancelHandle, PlaybackEvent, PlaybackReport,
    PlaybackSession, PlaybackState, RenderedFrame, SessionConfig,
};
pub use crate::renderer::{render_frame, FrameRenderer, CURSOR_HOME, HALF_BLOCK, RESET};
pub use crate::source::{probe_media, resize_frame, Frame, ImageSource, MediaKind};
pub use crate::terminal::TerminalSize;
pub use crate::utils::*;
pub use crate::{PlayerError, Result, DEFAULT_BUFSIZE};
