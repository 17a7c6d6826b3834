use crate::{PlayerError, Result};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    style::ResetColor,
    terminal::{Clear, ClearType},
};
use log::{debug, warn};
use std::io::{stdout, Write};

/// Size used when standard output is not a terminal and nothing was overridden
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Usable character grid for one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: u32,
    pub rows: u32,
}

impl TerminalSize {
    /// Build a size, rejecting empty grids
    pub fn new(columns: u32, rows: u32) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(PlayerError::InvalidDimensions { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    /// Query the terminal once, applying per-axis overrides.
    ///
    /// One column and one row are held back from a queried size so the last
    /// printed line never wraps or scrolls the screen. The fallback used off a
    /// terminal is taken as is.
    pub fn detect(width: Option<u16>, height: Option<u16>) -> Result<Self> {
        let queried = if width.is_some() && height.is_some() {
            None
        } else {
            query_terminal()
        };
        Self::resolve(queried, width, height)
    }

    /// Combine a queried terminal size (`None` when there is no terminal)
    /// with per-axis overrides
    fn resolve(queried: Option<(u16, u16)>, width: Option<u16>, height: Option<u16>) -> Result<Self> {
        let (avail_w, avail_h) = match queried {
            Some((w, h)) => (w.saturating_sub(1), h.saturating_sub(1)),
            None => FALLBACK_SIZE,
        };
        let columns = u32::from(width.unwrap_or(avail_w));
        let rows = u32::from(height.unwrap_or(avail_h));

        debug!("Target grid: {}x{} characters", columns, rows);
        Self::new(columns, rows)
    }

    /// Pixel size frames must be resized to: two pixel rows per character row
    pub fn pixel_dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows * 2)
    }
}

fn query_terminal() -> Option<(u16, u16)> {
    if !atty::is(atty::Stream::Stdout) {
        debug!("Standard output is not a terminal, assuming {:?}", FALLBACK_SIZE);
        return None;
    }

    match crossterm::terminal::size() {
        Ok(size) => Some(size),
        Err(e) => {
            warn!("Could not query terminal size ({}), assuming {:?}", e, FALLBACK_SIZE);
            None
        }
    }
}

/// Hides the cursor for the duration of playback and restores the terminal
/// on drop, whichever way the session ends.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    /// Prepare the terminal. Does nothing when standard output is not a terminal.
    pub fn enter() -> Result<Self> {
        let active = atty::is(atty::Stream::Stdout);
        if active {
            execute!(stdout(), Hide, Clear(ClearType::All))?;
            debug!("Terminal initialized for rendering");
        }
        Ok(Self { active })
    }

    /// Restore terminal to normal state
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut out = stdout();
        execute!(out, ResetColor, Show)?;
        writeln!(out)?;
        debug!("Terminal restored to normal state");
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
