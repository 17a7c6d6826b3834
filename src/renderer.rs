use crate::ansi::{AnsiCache, ColorPair, DEFAULT_CACHE_CAPACITY};
use crate::source::Frame;
use log::trace;

/// Moves the cursor to the top-left corner so each frame overwrites the last
pub const CURSOR_HOME: &str = "\x1b[H";

/// Resets all colors and attributes
pub const RESET: &str = "\x1b[0m";

/// Upper half block: foreground paints the top pixel, background the bottom one
pub const HALF_BLOCK: char = '▀';

/// Turns resized RGB frames into printable half-block text.
///
/// Each printed row covers two pixel rows. Adjacent cells sharing the same
/// color pair reuse the escape code already emitted for the run.
pub struct FrameRenderer {
    cache: AnsiCache,
}

impl FrameRenderer {
    /// Create a renderer whose color cache holds at most `cache_capacity` codes
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: AnsiCache::new(cache_capacity),
        }
    }

    /// Render one frame.
    ///
    /// The frame height must be even; odd trailing rows are ignored.
    pub fn render(&mut self, frame: &Frame) -> String {
        let (width, height) = frame.dimensions();
        let rows = height / 2;

        let mut output = String::with_capacity(
            CURSOR_HOME.len() + RESET.len() + rows as usize * (width as usize * 4 + 1),
        );
        output.push_str(CURSOR_HOME);

        let mut codes_emitted = 0usize;
        for row in 0..rows {
            if row > 0 {
                output.push('\n');
            }

            let mut previous: Option<ColorPair> = None;
            for x in 0..width {
                let top = frame.get_pixel(x, row * 2);
                let bottom = frame.get_pixel(x, row * 2 + 1);
                let pair = ColorPair::new(
                    (top[0], top[1], top[2]),
                    (bottom[0], bottom[1], bottom[2]),
                );

                if previous != Some(pair) {
                    output.push_str(self.cache.get(pair));
                    previous = Some(pair);
                    codes_emitted += 1;
                }
                output.push(HALF_BLOCK);
            }
        }

        output.push_str(RESET);

        trace!(
            "Rendered {}x{} frame: {} escape codes, {} bytes",
            width,
            height,
            codes_emitted,
            output.len()
        );
        output
    }

    /// Access the color cache (for statistics)
    pub fn cache(&self) -> &AnsiCache {
        &self.cache
    }
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Convenience function to render a single frame with a fresh cache
pub fn render_frame(frame: &Frame) -> String {
    FrameRenderer::default().render(frame)
}
