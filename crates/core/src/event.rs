// Event records delivered by the engine to observers

use crate::error::Error;
use std::fmt;

/// Engine playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No source prepared, or playback failed
    Idle,
    /// Waiting for data
    Buffering,
    /// Able to play from the current position
    Ready,
    /// Played to the end of the timeline
    Ended,
    /// A code this crate does not know about
    Unknown(i32),
}

impl PlaybackState {
    /// Map the engine's numeric state code (1 = idle ... 4 = ended).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PlaybackState::Idle,
            2 => PlaybackState::Buffering,
            3 => PlaybackState::Ready,
            4 => PlaybackState::Ended,
            other => PlaybackState::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PlaybackState::Idle => 1,
            PlaybackState::Buffering => 2,
            PlaybackState::Ready => 3,
            PlaybackState::Ended => 4,
            PlaybackState::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Buffering => "Buffering",
            PlaybackState::Ready => "Ready",
            PlaybackState::Ended => "Ended",
            PlaybackState::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Running decoder statistics, snapshotted when a renderer is enabled or disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderCounters {
    pub decoder_init_count: u32,
    pub decoder_release_count: u32,
    pub input_buffer_count: u64,
    pub rendered_output_buffer_count: u64,
    pub skipped_output_buffer_count: u64,
    pub dropped_buffer_count: u64,
}

/// Description of a decoded stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Format {
    pub sample_mime_type: Option<String>,
    pub codec: Option<String>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Opaque handle to a native rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSurface(pub u64);

/// A failure the engine hit after `prepare`, reported through the error observer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackError {
    pub error: Error,
    /// Window the engine was playing when it failed
    pub window_index: u32,
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (window {})", self.error, self.window_index)
    }
}
