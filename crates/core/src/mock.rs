// Recording engine for tests: counts live instances and logs every contract call

use crate::engine::{EngineFactory, PlayerEngine};
use crate::error::{Error, Result};
use crate::event::{PlaybackState, VideoSurface};
use crate::listener::ListenerSet;
use crate::media_source::MediaSource;
use crate::observer::{AudioRendererEventListener, EventListener, VideoRendererEventListener};
use crate::rate::PlaybackParameters;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// One call made on a mock engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetVideoSurface(Option<VideoSurface>),
    SetPlayWhenReady(bool),
    SeekTo(u32, Duration),
    Prepare {
        uri: String,
        window_count: usize,
        reset_position: bool,
        reset_state: bool,
    },
    SetPlaybackParameters(PlaybackParameters),
    Release,
}

#[derive(Debug, Default)]
struct MockState {
    created: usize,
    live: usize,
    max_live: usize,
    releases: usize,
    calls: Vec<(usize, EngineCall)>,
    fail_create: bool,
    fail_prepare: bool,
    window_index: u32,
    position: Duration,
    parameters: Option<PlaybackParameters>,
    play_when_ready: bool,
}

struct Shared {
    state: Mutex<MockState>,
    listeners: ListenerSet<dyn EventListener>,
    video_listeners: ListenerSet<dyn VideoRendererEventListener>,
    audio_listeners: ListenerSet<dyn AudioRendererEventListener>,
}

/// Factory handing out `MockEngine`s. Clones share the same record.
#[derive(Clone)]
pub struct MockEngineFactory {
    shared: Arc<Shared>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState::default()),
                listeners: ListenerSet::new(),
                video_listeners: ListenerSet::new(),
                audio_listeners: ListenerSet::new(),
            }),
        }
    }

    pub fn created_count(&self) -> usize {
        self.shared.state.lock().created
    }

    pub fn live_count(&self) -> usize {
        self.shared.state.lock().live
    }

    /// Highest number of engines alive at the same time
    pub fn max_live_count(&self) -> usize {
        self.shared.state.lock().max_live
    }

    pub fn release_count(&self) -> usize {
        self.shared.state.lock().releases
    }

    pub fn calls(&self) -> Vec<(usize, EngineCall)> {
        self.shared.state.lock().calls.clone()
    }

    /// Calls made on the engine with the given creation index (1-based)
    pub fn calls_for(&self, engine_id: usize) -> Vec<EngineCall> {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|(id, _)| *id == engine_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.shared.state.lock().fail_create = fail;
    }

    pub fn set_fail_prepare(&self, fail: bool) {
        self.shared.state.lock().fail_prepare = fail;
    }

    /// Simulate playback reaching `position` in `window_index`.
    pub fn set_playhead(&self, window_index: u32, position: Duration) {
        let mut state = self.shared.state.lock();
        state.window_index = window_index;
        state.position = position;
    }

    /// Simulate the user toggling play/pause inside the engine's own UI.
    pub fn set_engine_play_when_ready(&self, play_when_ready: bool) {
        self.shared.state.lock().play_when_ready = play_when_ready;
    }

    pub fn current_parameters(&self) -> Option<PlaybackParameters> {
        self.shared.state.lock().parameters
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len() + self.shared.video_listeners.len() + self.shared.audio_listeners.len()
    }

    /// Deliver a state change to the registered state listeners.
    pub fn emit_state(&self, play_when_ready: bool, state: PlaybackState) {
        self.shared
            .listeners
            .dispatch(|l| l.on_player_state_changed(play_when_ready, state));
    }

    pub fn emit_dropped_frames(&self, count: u32, elapsed_ms: u64) {
        self.shared
            .video_listeners
            .dispatch(|l| l.on_dropped_frames(count, elapsed_ms));
    }

    pub fn emit_underrun(&self, buffer_size: usize, buffer_size_ms: u64, elapsed_ms: u64) {
        self.shared
            .audio_listeners
            .dispatch(|l| l.on_audio_sink_underrun(buffer_size, buffer_size_ms, elapsed_ms));
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self) -> Result<Box<dyn PlayerEngine>> {
        let mut state = self.shared.state.lock();
        if state.fail_create {
            return Err(Error::Initialization("mock engine refused to start".to_string()));
        }
        state.created += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.window_index = 0;
        state.position = Duration::ZERO;
        state.parameters = Some(PlaybackParameters::DEFAULT);
        state.play_when_ready = false;
        let id = state.created;
        drop(state);

        Ok(Box::new(MockEngine {
            id,
            shared: self.shared.clone(),
            released: false,
            state: PlaybackState::Idle,
        }))
    }
}

pub struct MockEngine {
    id: usize,
    shared: Arc<Shared>,
    released: bool,
    state: PlaybackState,
}

impl MockEngine {
    fn record(&self, call: EngineCall) {
        self.shared.state.lock().calls.push((self.id, call));
    }
}

impl PlayerEngine for MockEngine {
    fn set_video_surface(&mut self, surface: Option<VideoSurface>) {
        self.record(EngineCall::SetVideoSurface(surface));
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.shared.state.lock().play_when_ready = play_when_ready;
        self.record(EngineCall::SetPlayWhenReady(play_when_ready));
    }

    fn play_when_ready(&self) -> bool {
        self.shared.state.lock().play_when_ready
    }

    fn seek_to(&mut self, window_index: u32, position: Duration) {
        {
            let mut state = self.shared.state.lock();
            state.window_index = window_index;
            state.position = position;
        }
        self.record(EngineCall::SeekTo(window_index, position));
    }

    fn add_listener(&mut self, listener: Arc<dyn EventListener>) {
        self.shared.listeners.add(listener);
    }

    fn remove_listener(&mut self, listener: &Arc<dyn EventListener>) {
        self.shared.listeners.remove(listener);
    }

    fn add_video_debug_listener(&mut self, listener: Arc<dyn VideoRendererEventListener>) {
        self.shared.video_listeners.add(listener);
    }

    fn remove_video_debug_listener(&mut self, listener: &Arc<dyn VideoRendererEventListener>) {
        self.shared.video_listeners.remove(listener);
    }

    fn add_audio_debug_listener(&mut self, listener: Arc<dyn AudioRendererEventListener>) {
        self.shared.audio_listeners.add(listener);
    }

    fn remove_audio_debug_listener(&mut self, listener: &Arc<dyn AudioRendererEventListener>) {
        self.shared.audio_listeners.remove(listener);
    }

    fn prepare(&mut self, source: MediaSource, reset_position: bool, reset_state: bool) -> Result<()> {
        self.record(EngineCall::Prepare {
            uri: source.uri().to_string(),
            window_count: source.timeline().window_count(),
            reset_position,
            reset_state,
        });
        if self.shared.state.lock().fail_prepare {
            return Err(Error::UnsupportedSource("mock engine cannot prepare".to_string()));
        }
        if reset_position {
            let mut state = self.shared.state.lock();
            state.window_index = 0;
            state.position = Duration::ZERO;
        }
        self.state = PlaybackState::Buffering;
        Ok(())
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        self.shared.state.lock().parameters = Some(parameters);
        self.record(EngineCall::SetPlaybackParameters(parameters));
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.shared.state.lock().parameters.unwrap_or_default()
    }

    fn current_position(&self) -> Duration {
        self.shared.state.lock().position
    }

    fn current_window_index(&self) -> u32 {
        self.shared.state.lock().window_index
    }

    fn playback_state(&self) -> PlaybackState {
        self.state
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.state = PlaybackState::Idle;
        self.record(EngineCall::Release);
        self.shared.listeners.clear();
        self.shared.video_listeners.clear();
        self.shared.audio_listeners.clear();

        let mut state = self.shared.state.lock();
        state.live -= 1;
        state.releases += 1;
        state.parameters = None;
        Ok(())
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
