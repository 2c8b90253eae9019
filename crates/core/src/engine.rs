// The contract a media engine must satisfy to be driven by a session

use crate::error::Result;
use crate::event::{PlaybackState, VideoSurface};
use crate::media_source::MediaSource;
use crate::observer::{AudioRendererEventListener, EventListener, VideoRendererEventListener};
use crate::rate::PlaybackParameters;
use std::sync::Arc;
use std::time::Duration;

/// Media engine
/// Fetching, demuxing, decoding and rendering all happen behind this trait.
/// Listener callbacks may arrive on engine-owned threads.
pub trait PlayerEngine: Send {
    /// Attach (or detach with `None`) the surface video is rendered to
    fn set_video_surface(&mut self, surface: Option<VideoSurface>);

    /// Whether playback proceeds as soon as the engine is ready
    fn set_play_when_ready(&mut self, play_when_ready: bool);

    fn play_when_ready(&self) -> bool;

    /// Seek to `position` within window `window_index`. Before `prepare` the
    /// request is remembered and applied once the source is loaded.
    fn seek_to(&mut self, window_index: u32, position: Duration);

    fn add_listener(&mut self, listener: Arc<dyn EventListener>);

    fn remove_listener(&mut self, listener: &Arc<dyn EventListener>);

    fn add_video_debug_listener(&mut self, listener: Arc<dyn VideoRendererEventListener>);

    fn remove_video_debug_listener(&mut self, listener: &Arc<dyn VideoRendererEventListener>);

    fn add_audio_debug_listener(&mut self, listener: Arc<dyn AudioRendererEventListener>);

    fn remove_audio_debug_listener(&mut self, listener: &Arc<dyn AudioRendererEventListener>);

    /// Start loading `source`. `reset_position` discards a pending seek and
    /// starts from the beginning; `reset_state` also drops the previous source.
    /// Failures after this returns are reported through `EventListener::on_player_error`.
    fn prepare(&mut self, source: MediaSource, reset_position: bool, reset_state: bool) -> Result<()>;

    /// Takes effect immediately; nothing is queued
    fn set_playback_parameters(&mut self, parameters: PlaybackParameters);

    fn playback_parameters(&self) -> PlaybackParameters;

    /// Position within the current window
    fn current_position(&self) -> Duration;

    fn current_window_index(&self) -> u32;

    fn playback_state(&self) -> PlaybackState;

    /// Stop all work and free resources. No listener is called after this
    /// returns. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Creates engine instances on demand
pub trait EngineFactory: Send {
    fn create(&self) -> Result<Box<dyn PlayerEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Box<dyn PlayerEngine>> + Send,
{
    fn create(&self) -> Result<Box<dyn PlayerEngine>> {
        self()
    }
}
