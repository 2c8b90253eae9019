// Playback session controller
// Owns at most one engine, and carries the transport position across teardown

use crate::bandwidth::BandwidthMeter;
use crate::config::SessionConfig;
use crate::engine::{EngineFactory, PlayerEngine};
use crate::error::Result;
use crate::lifecycle::{ForegroundEvent, LifecycleAction};
use crate::observer::{
    AudioEventLogger, AudioRendererEventListener, EventListener, StateLogger, VideoEventLogger,
    VideoRendererEventListener,
};
use crate::rate::PlaybackRate;
use std::sync::Arc;
use std::time::Duration;

const TAG: &str = "reel::session";

/// Transport state that survives engine teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSession {
    pub position: Duration,
    pub window_index: u32,
    pub play_when_ready: bool,
}

impl PlaybackSession {
    pub fn new(play_when_ready: bool) -> Self {
        Self {
            position: Duration::ZERO,
            window_index: 0,
            play_when_ready,
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(true)
    }
}

/// The three observer roles attached to every engine
#[derive(Clone)]
pub struct Observers {
    pub state: Arc<dyn EventListener>,
    pub video: Arc<dyn VideoRendererEventListener>,
    pub audio: Arc<dyn AudioRendererEventListener>,
}

impl Default for Observers {
    fn default() -> Self {
        Self {
            state: Arc::new(StateLogger),
            video: Arc::new(VideoEventLogger),
            audio: Arc::new(AudioEventLogger),
        }
    }
}

pub struct SessionController {
    config: SessionConfig,
    factory: Box<dyn EngineFactory>,
    observers: Observers,
    bandwidth_meter: Arc<BandwidthMeter>,
    engine: Option<Box<dyn PlayerEngine>>,
    session: PlaybackSession,
}

impl SessionController {
    pub fn new(config: SessionConfig, factory: impl EngineFactory + 'static) -> Self {
        Self::with_observers(config, factory, Observers::default())
    }

    pub fn with_observers(
        config: SessionConfig,
        factory: impl EngineFactory + 'static,
        observers: Observers,
    ) -> Self {
        let session = PlaybackSession::new(config.play_when_ready);
        Self {
            config,
            factory: Box::new(factory),
            observers,
            bandwidth_meter: Arc::new(BandwidthMeter::new()),
            engine: None,
            session,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Saved transport state. Only refreshed when the engine is released.
    pub fn session(&self) -> PlaybackSession {
        self.session
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&dyn PlayerEngine> {
        self.engine.as_deref()
    }

    /// Meter shared by every metered data source this controller builds
    pub fn bandwidth_meter(&self) -> &Arc<BandwidthMeter> {
        &self.bandwidth_meter
    }

    /// Create the engine and start preparing the configured source.
    /// Does nothing when an engine already exists.
    pub fn start(&mut self) -> Result<()> {
        if self.engine.is_some() {
            log::debug!(target: TAG, "start ignored: engine already active");
            return Ok(());
        }

        let source = self.config.strategy.build(
            &self.config.media_uri,
            &self.config.user_agent(),
            &self.bandwidth_meter,
        )?;

        log::info!(
            target: TAG,
            "creating engine: {:?} uri={} window={} position={:?} playWhenReady={}",
            self.config.strategy,
            self.config.media_uri,
            self.session.window_index,
            self.session.position,
            self.session.play_when_ready
        );

        let mut engine = self.factory.create()?;
        engine.set_video_surface(self.config.video_surface);
        engine.set_play_when_ready(self.session.play_when_ready);
        engine.seek_to(self.session.window_index, self.session.position);
        engine.add_listener(self.observers.state.clone());
        engine.add_video_debug_listener(self.observers.video.clone());
        engine.add_audio_debug_listener(self.observers.audio.clone());

        // Keep the pending seek: a recreated engine resumes where the last one stopped
        if let Err(err) = engine.prepare(source, false, false) {
            log::error!(target: TAG, "prepare failed: {}", err);
            self.detach(engine.as_mut());
            if let Err(release_err) = engine.release() {
                log::warn!(target: TAG, "release after failed prepare: {}", release_err);
            }
            return Err(err);
        }

        self.engine = Some(engine);
        Ok(())
    }

    /// Save the transport state and release the engine. Does nothing when
    /// there is no engine, so calling it twice is safe.
    pub fn stop(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            log::debug!(target: TAG, "stop ignored: no engine");
            return;
        };

        self.detach(engine.as_mut());
        self.session = PlaybackSession {
            position: engine.current_position(),
            window_index: engine.current_window_index(),
            play_when_ready: engine.play_when_ready(),
        };

        if let Err(err) = engine.release() {
            log::warn!(target: TAG, "engine release failed: {}", err);
        }

        log::info!(
            target: TAG,
            "engine released at window={} position={:?} playWhenReady={}",
            self.session.window_index,
            self.session.position,
            self.session.play_when_ready
        );
    }

    /// Apply a speed preset. Ignored when no engine is active.
    pub fn set_playback_rate(&mut self, rate: PlaybackRate) {
        match self.engine.as_mut() {
            Some(engine) => {
                log::debug!(target: TAG, "playback rate -> {:?}", rate);
                engine.set_playback_parameters(rate.parameters());
            }
            None => log::debug!(target: TAG, "playback rate {:?} ignored: no engine", rate),
        }
    }

    /// UI speed buttons. Unknown identifiers are ignored.
    pub fn adjust_speed(&mut self, control_id: &str) {
        match PlaybackRate::from_control_id(control_id) {
            Some(rate) => self.set_playback_rate(rate),
            None => log::warn!(target: TAG, "unknown speed control: {}", control_id),
        }
    }

    pub fn on_foreground(&mut self, event: ForegroundEvent) -> Result<()> {
        let action = self.config.lifecycle.action(event);
        log::debug!(target: TAG, "{:?} -> {:?}", event, action);
        match action {
            LifecycleAction::Create => self.start(),
            LifecycleAction::Release => {
                self.stop();
                Ok(())
            }
            LifecycleAction::Nothing => Ok(()),
        }
    }

    fn detach(&self, engine: &mut dyn PlayerEngine) {
        engine.remove_listener(&self.observers.state);
        engine.remove_video_debug_listener(&self.observers.video);
        engine.remove_audio_debug_listener(&self.observers.audio);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceStrategy;
    use crate::event::{PlaybackState, VideoSurface};
    use crate::lifecycle::LifecyclePolicy;
    use crate::mock::{EngineCall, MockEngineFactory};
    use crate::rate::PlaybackParameters;
    use parking_lot::Mutex;

    fn controller(policy: LifecyclePolicy) -> (SessionController, MockEngineFactory) {
        let factory = MockEngineFactory::new();
        let config = SessionConfig::new("file:///media/sample.mp4").with_lifecycle(policy);
        (SessionController::new(config, factory.clone()), factory)
    }

    #[test]
    fn test_start_creates_one_engine() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        controller.start().unwrap();
        assert!(controller.is_active());
        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.live_count(), 1);
    }

    #[test]
    fn test_start_wires_engine_in_order() {
        let factory = MockEngineFactory::new();
        let config = SessionConfig::new("file:///media/sample.mp4").with_video_surface(VideoSurface(9));
        let mut controller = SessionController::new(config, factory.clone());
        controller.start().unwrap();

        assert_eq!(
            factory.calls_for(1),
            vec![
                EngineCall::SetVideoSurface(Some(VideoSurface(9))),
                EngineCall::SetPlayWhenReady(true),
                EngineCall::SeekTo(0, Duration::ZERO),
                EngineCall::Prepare {
                    uri: "file:///media/sample.mp4".to_string(),
                    window_count: 2,
                    reset_position: false,
                    reset_state: false,
                },
            ]
        );
        assert_eq!(factory.listener_count(), 3);
    }

    #[test]
    fn test_live_engines_never_exceed_one() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        let ops = [true, true, false, true, false, false, true, false, true, true, false];
        for start in ops {
            if start {
                controller.start().unwrap();
            } else {
                controller.stop();
            }
            assert!(factory.live_count() <= 1);
        }
        assert_eq!(factory.max_live_count(), 1);
        assert_eq!(factory.created_count(), factory.release_count() + factory.live_count());
    }

    #[test]
    fn test_stop_saves_engine_state_then_releases() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        factory.set_playhead(1, Duration::from_millis(7_250));
        factory.set_engine_play_when_ready(false);

        controller.stop();

        assert_eq!(
            controller.session(),
            PlaybackSession {
                position: Duration::from_millis(7_250),
                window_index: 1,
                play_when_ready: false,
            }
        );
        assert!(!controller.is_active());
        assert_eq!(factory.live_count(), 0);
        assert_eq!(factory.listener_count(), 0);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        controller.stop();
        controller.stop();
        assert_eq!(factory.release_count(), 1);

        // Never started at all
        let (mut idle, idle_factory) = super::tests::controller(LifecyclePolicy::EAGER);
        idle.stop();
        assert_eq!(idle_factory.release_count(), 0);
    }

    #[test]
    fn test_restart_resumes_saved_position() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        factory.set_playhead(1, Duration::from_secs(12));
        controller.stop();
        controller.start().unwrap();

        let second = factory.calls_for(2);
        assert!(second.contains(&EngineCall::SeekTo(1, Duration::from_secs(12))));
        assert_eq!(factory.live_count(), 1);
    }

    #[test]
    fn test_later_rate_overrides_earlier() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        controller.set_playback_rate(PlaybackRate::Half);
        controller.set_playback_rate(PlaybackRate::Normal);
        assert_eq!(factory.current_parameters(), Some(PlaybackParameters::new(1.0, 1.0)));

        controller.adjust_speed("btn_double_speed");
        assert_eq!(factory.current_parameters(), Some(PlaybackParameters::new(2.0, 1.0)));
    }

    #[test]
    fn test_rate_without_engine_is_ignored() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.set_playback_rate(PlaybackRate::Double);
        controller.adjust_speed("btn_unknown");
        assert_eq!(factory.created_count(), 0);
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn test_rate_does_not_survive_recreation() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.start().unwrap();
        controller.set_playback_rate(PlaybackRate::Double);
        controller.stop();
        controller.start().unwrap();
        assert_eq!(factory.current_parameters(), Some(PlaybackParameters::DEFAULT));
    }

    #[test]
    fn test_legacy_pause_resume_recreates_at_saved_position() {
        let (mut controller, factory) = controller(LifecyclePolicy::LEGACY);
        controller.on_foreground(ForegroundEvent::Start).unwrap();
        assert_eq!(factory.created_count(), 0);
        controller.on_foreground(ForegroundEvent::Resume).unwrap();
        assert_eq!(factory.created_count(), 1);

        factory.set_playhead(0, Duration::from_millis(3_300));
        controller.on_foreground(ForegroundEvent::Pause).unwrap();
        assert_eq!(factory.live_count(), 0);
        assert_eq!(controller.session().position, Duration::from_millis(3_300));

        controller.on_foreground(ForegroundEvent::Resume).unwrap();
        assert_eq!(factory.created_count(), 2);
        assert!(factory
            .calls_for(2)
            .contains(&EngineCall::SeekTo(0, Duration::from_millis(3_300))));

        controller.on_foreground(ForegroundEvent::Stop).unwrap();
        assert_eq!(factory.live_count(), 1);
    }

    #[test]
    fn test_eager_lifecycle_keeps_engine_while_paused() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        controller.on_foreground(ForegroundEvent::Start).unwrap();
        controller.on_foreground(ForegroundEvent::Resume).unwrap();
        controller.on_foreground(ForegroundEvent::Pause).unwrap();
        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.live_count(), 1);

        factory.set_playhead(1, Duration::from_secs(4));
        controller.on_foreground(ForegroundEvent::Stop).unwrap();
        assert_eq!(factory.live_count(), 0);

        controller.on_foreground(ForegroundEvent::Start).unwrap();
        controller.on_foreground(ForegroundEvent::Resume).unwrap();
        assert_eq!(factory.created_count(), 2);
        assert!(factory.calls_for(2).contains(&EngineCall::SeekTo(1, Duration::from_secs(4))));
    }

    #[test]
    fn test_failed_prepare_leaves_no_engine() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        factory.set_fail_prepare(true);
        assert!(controller.start().is_err());
        assert!(!controller.is_active());
        assert_eq!(factory.live_count(), 0);
        assert_eq!(factory.listener_count(), 0);

        factory.set_fail_prepare(false);
        controller.start().unwrap();
        assert!(controller.is_active());
    }

    #[test]
    fn test_failed_create_is_reported() {
        let (mut controller, factory) = controller(LifecyclePolicy::EAGER);
        factory.set_fail_create(true);
        assert!(controller.start().is_err());
        assert!(!controller.is_active());
    }

    #[test]
    fn test_invalid_strategy_creates_nothing() {
        let factory = MockEngineFactory::new();
        let config = SessionConfig::new("a.mp4").with_strategy(SourceStrategy::ClippedLoop {
            start_us: 0,
            end_us: 1_000,
            count: 0,
        });
        let mut controller = SessionController::new(config, factory.clone());
        assert!(controller.start().is_err());
        assert_eq!(factory.created_count(), 0);
    }

    #[derive(Default)]
    struct PlayingCounter {
        playing: Mutex<u32>,
        labels: Mutex<Vec<&'static str>>,
    }

    impl EventListener for PlayingCounter {
        fn on_player_state_changed(&self, play_when_ready: bool, state: PlaybackState) {
            let report = crate::observer::describe_state_change(play_when_ready, state);
            if report.actually_playing {
                *self.playing.lock() += 1;
            }
            self.labels.lock().push(report.label);
        }
    }

    #[test]
    fn test_observers_only_hear_live_engine() {
        let factory = MockEngineFactory::new();
        let counter = Arc::new(PlayingCounter::default());
        let observers = Observers {
            state: counter.clone(),
            ..Observers::default()
        };
        let mut controller =
            SessionController::with_observers(SessionConfig::default(), factory.clone(), observers);

        controller.start().unwrap();
        factory.emit_state(true, PlaybackState::Buffering);
        factory.emit_state(true, PlaybackState::Ready);
        factory.emit_state(true, PlaybackState::from_code(7));
        factory.emit_dropped_frames(2, 500);
        factory.emit_underrun(1024, 20, 40);
        assert_eq!(*counter.playing.lock(), 1);
        assert_eq!(*counter.labels.lock(), vec!["Buffering", "Ready", "Unknown"]);

        controller.stop();
        factory.emit_state(true, PlaybackState::Ready);
        assert_eq!(*counter.playing.lock(), 1);
    }

    #[test]
    fn test_closure_factory() {
        let mock = MockEngineFactory::new();
        let inner = mock.clone();
        let mut controller = SessionController::new(SessionConfig::default(), move || inner.create());
        controller.start().unwrap();
        assert_eq!(mock.live_count(), 1);
        drop(controller);
        assert_eq!(mock.live_count(), 0);
    }
}
