use crate::ansi::DEFAULT_CACHE_CAPACITY;
use crate::audio::AudioTrack;
use crate::buffer::{FrameBuffer, Readiness};
use crate::renderer::FrameRenderer;
use crate::source::{resize_frame, Frame};
use crate::terminal::TerminalSize;
use crate::{PlayerError, Result};
use image::DynamicImage;
use log::{debug, info, warn};
use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Target spacing between frame writes for a given frame rate.
///
/// Rates too low for their interval to fit in a `Duration` are rejected.
pub fn try_frame_interval(fps: f64) -> Result<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(PlayerError::InvalidConfig(format!("Invalid frame rate: {}", fps)));
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|_| PlayerError::InvalidConfig(format!("Frame rate too low: {}", fps)))
}

/// Like [`try_frame_interval`], with zero for invalid rates and `Duration::MAX`
/// for rates too low to represent
pub fn frame_interval(fps: f64) -> Duration {
    match try_frame_interval(fps) {
        Ok(interval) => interval,
        Err(_) if fps.is_finite() && fps > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// Fixed parameters of one playback session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Output rate; frames are written every `1 / target_fps` seconds
    pub target_fps: f64,
    pub columns: u32,
    pub rows: u32,
    /// Priming threshold and buffer capacity
    pub bufsize: usize,
    pub cache_capacity: usize,
}

impl SessionConfig {
    pub fn new(target_fps: f64, size: TerminalSize, bufsize: usize) -> Self {
        Self {
            target_fps,
            columns: size.columns,
            rows: size.rows,
            bufsize,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// The character grid, validated
    pub fn size(&self) -> Result<TerminalSize> {
        TerminalSize::new(self.columns, self.rows)
    }

    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.target_fps)
    }

    pub fn validate(&self) -> Result<()> {
        self.size()?;
        if self.bufsize == 0 {
            return Err(PlayerError::InvalidConfig(
                "Buffer size must be greater than 0".to_string(),
            ));
        }
        try_frame_interval(self.target_fps)?;
        Ok(())
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Decoding into the buffer; nothing shown yet
    Priming,
    /// Paced output while the producer keeps up
    Playing,
    /// Producer finished; emptying what is left
    Draining,
    /// Producer finished and buffer empty
    Terminal,
    /// Interrupted from outside
    Cancelled,
}

/// Progress notifications for the surrounding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    State(PlaybackState),
    AudioStarted,
    /// A frame was written; `buffered` frames were still waiting
    Frame { index: u64, buffered: usize },
}

/// Summary of a finished session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    pub frames_produced: u64,
    pub frames_shown: u64,
    pub audio_started: bool,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// A frame already turned into terminal output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub index: u64,
    pub text: String,
}

/// Stops a running session from another thread or task
#[derive(Clone)]
pub struct CancelHandle {
    buffer: Arc<FrameBuffer<RenderedFrame>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        debug!("Playback cancellation requested");
        self.buffer.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.buffer.is_cancelled()
    }
}

struct Consumed {
    shown: u64,
    audio_started: bool,
    cancelled: bool,
}

// Marks the producer finished however it exits, so the consumer never waits
// on a producer that is gone.
struct FinishOnDrop<'a, T>(&'a FrameBuffer<T>);

impl<T> Drop for FinishOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// One playback: a decode/render producer thread feeding a bounded buffer,
/// a paced consumer writing frames out, and an audio track started when the
/// buffer is first primed.
pub struct PlaybackSession<A: AudioTrack> {
    config: SessionConfig,
    audio: A,
    buffer: Arc<FrameBuffer<RenderedFrame>>,
    events: Option<Sender<PlaybackEvent>>,
}

impl<A: AudioTrack> PlaybackSession<A> {
    pub fn new(config: SessionConfig, audio: A) -> Self {
        Self {
            config,
            audio,
            buffer: Arc::new(FrameBuffer::new(config.bufsize)),
            events: None,
        }
    }

    /// Send progress events to `events` while running
    pub fn with_events(mut self, events: Sender<PlaybackEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            buffer: Arc::clone(&self.buffer),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session to completion, writing frames to `out`.
    ///
    /// `open` runs on the producer thread and yields the frame sequence, so
    /// decoders need not be `Send`. A producer failure ends the session after
    /// the frames already buffered are shown, and is then returned as the error.
    pub fn run<F, I, W>(mut self, open: F, out: &mut W) -> Result<PlaybackReport>
    where
        F: FnOnce() -> Result<I> + Send,
        I: Iterator<Item = Result<Frame>>,
        W: Write,
    {
        self.config.validate()?;
        let started = Instant::now();
        let buffer = Arc::clone(&self.buffer);
        let cache_capacity = self.config.cache_capacity;
        let size = self.config.size()?;

        let (produced, consumed) = thread::scope(|scope| {
            let buffer_ref: &FrameBuffer<RenderedFrame> = &buffer;
            let producer =
                scope.spawn(move || produce(open, size, FrameRenderer::new(cache_capacity), buffer_ref));

            let consumed = self.consume(out);
            // Whatever ended the consumer, the producer must not keep waiting for room.
            buffer.cancel();
            (producer.join(), consumed)
        });

        let (frames_produced, produced) = match produced {
            Ok(result) => result,
            Err(_) => (0, Err(PlayerError::ProducerPanicked)),
        };

        let consumed = match consumed {
            Ok(consumed) => consumed,
            Err(e) => {
                self.audio.stop();
                return Err(e);
            }
        };

        if consumed.cancelled {
            self.audio.stop();
            self.emit(PlaybackEvent::State(PlaybackState::Cancelled));
        } else if let Err(e) = produced {
            warn!("Playback aborted: {}", e);
            self.audio.stop();
            return Err(e);
        }

        let report = PlaybackReport {
            frames_produced,
            frames_shown: consumed.shown,
            audio_started: consumed.audio_started,
            cancelled: consumed.cancelled,
            elapsed: started.elapsed(),
        };
        info!(
            "Playback {}: {} of {} frame(s) shown in {:.2}s",
            if report.cancelled { "cancelled" } else { "finished" },
            report.frames_shown,
            report.frames_produced,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    fn consume<W: Write>(&mut self, out: &mut W) -> Result<Consumed> {
        let bufsize = self.config.bufsize;
        let interval = self.config.frame_interval();
        let mut consumed = Consumed {
            shown: 0,
            audio_started: false,
            cancelled: false,
        };

        let mut state = PlaybackState::Priming;
        self.enter(state);

        loop {
            if self.buffer.wait_ready(bufsize) == Readiness::Cancelled {
                consumed.cancelled = true;
                return Ok(consumed);
            }

            if state == PlaybackState::Priming && !self.buffer.is_empty() {
                state = PlaybackState::Playing;
                self.enter(state);
                consumed.audio_started = self.start_audio();
            }

            while let Some((frame, producer_done)) = self.buffer.pop_ready(bufsize) {
                if producer_done && state == PlaybackState::Playing {
                    state = PlaybackState::Draining;
                    self.enter(state);
                }

                let write_started = Instant::now();
                out.write_all(frame.text.as_bytes())?;
                out.flush()?;
                let render_time = write_started.elapsed();

                consumed.shown += 1;
                self.emit(PlaybackEvent::Frame {
                    index: frame.index,
                    buffered: self.buffer.len(),
                });

                // Slow writes eat into the interval; playback never runs faster than the source.
                if self.buffer.sleep_unless_cancelled(interval.saturating_sub(render_time)) {
                    consumed.cancelled = true;
                    return Ok(consumed);
                }
            }

            if self.buffer.is_cancelled() {
                consumed.cancelled = true;
                return Ok(consumed);
            }
            if self.buffer.is_drained() {
                self.enter(PlaybackState::Terminal);
                return Ok(consumed);
            }
        }
    }

    fn start_audio(&mut self) -> bool {
        match self.audio.start() {
            Ok(()) => {
                self.emit(PlaybackEvent::AudioStarted);
                true
            }
            Err(e) => {
                warn!("Audio playback unavailable, continuing without sound: {}", e);
                false
            }
        }
    }

    fn enter(&self, state: PlaybackState) {
        debug!("Playback state: {:?} ({} buffered)", state, self.buffer.len());
        self.emit(PlaybackEvent::State(state));
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

fn produce<F, I>(
    open: F,
    size: TerminalSize,
    mut renderer: FrameRenderer,
    buffer: &FrameBuffer<RenderedFrame>,
) -> (u64, Result<()>)
where
    F: FnOnce() -> Result<I>,
    I: Iterator<Item = Result<Frame>>,
{
    let _finish = FinishOnDrop(buffer);
    let mut produced = 0u64;

    let frames = match open() {
        Ok(frames) => frames,
        Err(e) => return (produced, Err(e)),
    };

    for frame in frames {
        let mut frame = match frame {
            Ok(frame) => frame,
            Err(e) => return (produced, Err(e)),
        };
        if frame.dimensions() != size.pixel_dimensions() {
            debug!(
                "Frame {} is {:?}, resizing to the {}x{} grid",
                produced,
                frame.dimensions(),
                size.columns,
                size.rows
            );
            frame = resize_frame(&DynamicImage::ImageRgb8(frame), size);
        }

        let text = renderer.render(&frame);
        if buffer
            .push(RenderedFrame {
                index: produced,
                text,
            })
            .is_err()
        {
            debug!("Producer stopped after {} frame(s): session cancelled", produced);
            break;
        }
        produced += 1;
    }

    let (hits, misses) = renderer.cache().stats();
    debug!(
        "Producer finished: {} frame(s), color cache {} hits / {} misses",
        produced, hits, misses
    );
    (produced, Ok(()))
}
