// Audio playback engine for Reel sessions
// Symphonia demux/decode, cpal output, ureq range transport

pub mod convert;
pub mod cursor;
pub mod decode;
pub mod demux;
pub mod http;
mod output;
pub mod queue;
pub mod source;
pub mod stretch;
mod worker;

use parking_lot::Mutex;
use reel_core::{
    AudioRendererEventListener, EngineFactory, Error, EventListener, ListenerSet, MediaSource,
    PlaybackParameters, PlaybackState, PlayerEngine, Result, VideoRendererEventListener,
    VideoSurface,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Engine tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Seconds of decoded audio kept ahead of the device
    pub ring_buffer_secs: u32,
    /// Audio that must be queued before Buffering turns into Ready
    pub prebuffer: Duration,
    /// Minimum gap between two underrun reports
    pub underrun_log_every: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_buffer_secs: 2,
            prebuffer: Duration::from_millis(250),
            underrun_log_every: Duration::from_secs(1),
        }
    }
}

/// State shared between the engine handle, its worker and the output callback
pub(crate) struct EngineShared {
    pub listeners: ListenerSet<dyn EventListener>,
    pub video_listeners: ListenerSet<dyn VideoRendererEventListener>,
    pub audio_listeners: ListenerSet<dyn AudioRendererEventListener>,
    play_when_ready: AtomicBool,
    parameters: Mutex<PlaybackParameters>,
    speed_bits: AtomicU32,
    pitch_bits: AtomicU32,
    state: Mutex<PlaybackState>,
    /// Mirrors `state == Ready` for the audio callback
    ready: AtomicBool,
    /// Decoding has finished; an empty queue is the end, not an underrun
    pub draining: AtomicBool,
    playhead: Mutex<(u32, Duration)>,
    pending_seek: Mutex<Option<(u32, Duration)>>,
    pub stop: AtomicBool,
    pub underruns: AtomicU64,
}

impl EngineShared {
    fn new() -> Self {
        let parameters = PlaybackParameters::DEFAULT;
        Self {
            listeners: ListenerSet::new(),
            video_listeners: ListenerSet::new(),
            audio_listeners: ListenerSet::new(),
            play_when_ready: AtomicBool::new(false),
            parameters: Mutex::new(parameters),
            speed_bits: AtomicU32::new(parameters.speed.to_bits()),
            pitch_bits: AtomicU32::new(parameters.pitch.to_bits()),
            state: Mutex::new(PlaybackState::Idle),
            ready: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            playhead: Mutex::new((0, Duration::ZERO)),
            pending_seek: Mutex::new(None),
            stop: AtomicBool::new(false),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Update the state and notify listeners if it changed.
    pub fn set_state(&self, state: PlaybackState) {
        {
            let mut current = self.state.lock();
            if *current == state {
                return;
            }
            *current = state;
            self.ready.store(state == PlaybackState::Ready, Ordering::Release);
        }
        let play_when_ready = self.play_when_ready();
        log::debug!("Engine state -> {} (playWhenReady={})", state, play_when_ready);
        self.listeners
            .dispatch(|l| l.on_player_state_changed(play_when_ready, state));
    }

    pub fn play_when_ready(&self) -> bool {
        self.play_when_ready.load(Ordering::Acquire)
    }

    /// Whether the device should be consuming queued audio right now
    pub fn is_rendering(&self) -> bool {
        self.play_when_ready() && self.ready.load(Ordering::Acquire)
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed_bits.load(Ordering::Relaxed))
    }

    pub fn pitch(&self) -> f32 {
        f32::from_bits(self.pitch_bits.load(Ordering::Relaxed))
    }

    pub fn set_playhead(&self, playhead: (u32, Duration)) {
        *self.playhead.lock() = playhead;
    }

    /// Move a pending seek target into the playhead and return it. Both
    /// happen under the pending-seek lock, so `position()` never observes
    /// the gap between them.
    pub fn apply_pending_seek(&self) -> Option<(u32, Duration)> {
        let mut pending = self.pending_seek.lock();
        let target = (*pending)?;
        *self.playhead.lock() = target;
        *pending = None;
        Some(target)
    }

    /// Pending seek target if any, else the last known playhead
    fn position(&self) -> (u32, Duration) {
        match *self.pending_seek.lock() {
            Some(target) => target,
            None => *self.playhead.lock(),
        }
    }
}

/// `PlayerEngine` that decodes with Symphonia and plays through the default
/// cpal output device. Video surfaces are accepted but nothing is rendered.
pub struct CpalEngine {
    shared: Arc<EngineShared>,
    config: EngineConfig,
    worker: Option<JoinHandle<()>>,
    video_surface: Option<VideoSurface>,
    released: bool,
}

impl CpalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(EngineShared::new()),
            config,
            worker: None,
            video_surface: None,
            released: false,
        }
    }

    pub fn video_surface(&self) -> Option<VideoSurface> {
        self.video_surface
    }

    fn stop_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        self.shared.stop.store(true, Ordering::Release);
        handle
            .join()
            .map_err(|_| Error::Other("engine worker panicked".to_string()))
    }
}

impl PlayerEngine for CpalEngine {
    fn set_video_surface(&mut self, surface: Option<VideoSurface>) {
        if surface.is_some() {
            log::debug!("Video surface {:?} attached; this engine renders audio only", surface);
        }
        self.video_surface = surface;
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let previous = self.shared.play_when_ready.swap(play_when_ready, Ordering::AcqRel);
        if previous != play_when_ready {
            let state = self.shared.state();
            self.shared
                .listeners
                .dispatch(|l| l.on_player_state_changed(play_when_ready, state));
        }
    }

    fn play_when_ready(&self) -> bool {
        self.shared.play_when_ready()
    }

    fn seek_to(&mut self, window_index: u32, position: Duration) {
        *self.shared.pending_seek.lock() = Some((window_index, position));
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

    fn prepare(&mut self, source: MediaSource, reset_position: bool, _reset_state: bool) -> Result<()> {
        if self.released {
            return Err(Error::InvalidState("engine already released".to_string()));
        }
        self.stop_worker()?;

        if reset_position {
            *self.shared.pending_seek.lock() = None;
            self.shared.set_playhead((0, Duration::ZERO));
        }
        self.shared.stop.store(false, Ordering::Release);
        self.shared.draining.store(false, Ordering::Release);
        self.shared.set_state(PlaybackState::Buffering);

        let shared = self.shared.clone();
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("reel-engine".to_string())
            .spawn(move || worker::run(shared, source, config))
            .map_err(|e| Error::Initialization(format!("Failed to spawn engine worker: {}", e)))?;
        self.worker = Some(handle);
        Ok(())
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        *self.shared.parameters.lock() = parameters;
        self.shared
            .speed_bits
            .store(parameters.speed.to_bits(), Ordering::Relaxed);
        self.shared
            .pitch_bits
            .store(parameters.pitch.to_bits(), Ordering::Relaxed);
        self.shared
            .listeners
            .dispatch(|l| l.on_playback_parameters_changed(parameters));
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        *self.shared.parameters.lock()
    }

    fn current_position(&self) -> Duration {
        self.shared.position().1
    }

    fn current_window_index(&self) -> u32 {
        self.shared.position().0
    }

    fn playback_state(&self) -> PlaybackState {
        self.shared.state()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let joined = self.stop_worker();

        self.shared.listeners.clear();
        self.shared.video_listeners.clear();
        self.shared.audio_listeners.clear();
        *self.shared.state.lock() = PlaybackState::Idle;
        self.shared.ready.store(false, Ordering::Release);
        log::info!("Engine released");
        joined
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Engine release on drop failed: {}", e);
        }
    }
}

/// Creates a fresh `CpalEngine` per session start
#[derive(Debug, Clone, Default)]
pub struct CpalEngineFactory {
    config: EngineConfig,
}

impl CpalEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for CpalEngineFactory {
    fn create(&self) -> Result<Box<dyn PlayerEngine>> {
        Ok(Box::new(CpalEngine::new(self.config.clone())))
    }
}
