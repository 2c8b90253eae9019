// Observer roles for playback state and decoder events
// Implementations run on engine threads: they must return quickly and never panic

use crate::event::{DecoderCounters, Format, PlaybackError, PlaybackState, VideoSurface};
use crate::rate::PlaybackParameters;

/// Playback state observer
pub trait EventListener: Send + Sync {
    fn on_player_state_changed(&self, _play_when_ready: bool, _state: PlaybackState) {}

    fn on_player_error(&self, _error: &PlaybackError) {}

    fn on_playback_parameters_changed(&self, _parameters: PlaybackParameters) {}
}

/// Video decoder/renderer observer
pub trait VideoRendererEventListener: Send + Sync {
    fn on_video_enabled(&self, _counters: DecoderCounters) {}

    fn on_video_decoder_initialized(
        &self,
        _decoder_name: &str,
        _initialized_timestamp_ms: u64,
        _initialization_duration_ms: u64,
    ) {
    }

    fn on_video_input_format_changed(&self, _format: &Format) {}

    fn on_dropped_frames(&self, _count: u32, _elapsed_ms: u64) {}

    fn on_video_size_changed(
        &self,
        _width: u32,
        _height: u32,
        _unapplied_rotation_degrees: i32,
        _pixel_width_height_ratio: f32,
    ) {
    }

    fn on_rendered_first_frame(&self, _surface: Option<VideoSurface>) {}

    fn on_video_disabled(&self, _counters: DecoderCounters) {}
}

/// Audio decoder/renderer observer
pub trait AudioRendererEventListener: Send + Sync {
    fn on_audio_enabled(&self, _counters: DecoderCounters) {}

    fn on_audio_session_id(&self, _audio_session_id: i32) {}

    fn on_audio_decoder_initialized(
        &self,
        _decoder_name: &str,
        _initialized_timestamp_ms: u64,
        _initialization_duration_ms: u64,
    ) {
    }

    fn on_audio_input_format_changed(&self, _format: &Format) {}

    fn on_audio_sink_underrun(
        &self,
        _buffer_size: usize,
        _buffer_size_ms: u64,
        _elapsed_since_last_feed_ms: u64,
    ) {
    }

    fn on_audio_disabled(&self, _counters: DecoderCounters) {}
}

/// What a state change means for the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateReport {
    pub label: &'static str,
    /// Ready with play-when-ready set: media is actually being rendered
    pub actually_playing: bool,
}

pub fn describe_state_change(play_when_ready: bool, state: PlaybackState) -> StateReport {
    StateReport {
        label: state.label(),
        actually_playing: play_when_ready && state == PlaybackState::Ready,
    }
}

const STATE_TARGET: &str = "reel::state";
const VIDEO_TARGET: &str = "reel::video";
const AUDIO_TARGET: &str = "reel::audio";

/// Logs every state transition and engine error
#[derive(Debug, Default)]
pub struct StateLogger;

impl EventListener for StateLogger {
    fn on_player_state_changed(&self, play_when_ready: bool, state: PlaybackState) {
        let report = describe_state_change(play_when_ready, state);
        if report.actually_playing {
            log::debug!(target: STATE_TARGET, "onPlayerStateChanged: actually playing media");
        }
        match state {
            PlaybackState::Unknown(code) => log::debug!(
                target: STATE_TARGET,
                "changed state to {} ({}) playWhenReady: {}",
                report.label,
                code,
                play_when_ready
            ),
            _ => log::debug!(
                target: STATE_TARGET,
                "changed state to {} playWhenReady: {}",
                report.label,
                play_when_ready
            ),
        }
    }

    fn on_player_error(&self, error: &PlaybackError) {
        log::error!(target: STATE_TARGET, "playback failed: {}", error);
    }

    fn on_playback_parameters_changed(&self, parameters: PlaybackParameters) {
        log::debug!(
            target: STATE_TARGET,
            "playback parameters: speed={} pitch={}",
            parameters.speed,
            parameters.pitch
        );
    }
}

#[derive(Debug, Default)]
pub struct VideoEventLogger;

impl VideoRendererEventListener for VideoEventLogger {
    fn on_video_enabled(&self, counters: DecoderCounters) {
        log::debug!(target: VIDEO_TARGET, "video enabled: {:?}", counters);
    }

    fn on_video_decoder_initialized(
        &self,
        decoder_name: &str,
        initialized_timestamp_ms: u64,
        initialization_duration_ms: u64,
    ) {
        log::debug!(
            target: VIDEO_TARGET,
            "video decoder {} initialized at {}ms in {}ms",
            decoder_name,
            initialized_timestamp_ms,
            initialization_duration_ms
        );
    }

    fn on_video_input_format_changed(&self, format: &Format) {
        log::debug!(target: VIDEO_TARGET, "video format: {:?}", format);
    }

    fn on_dropped_frames(&self, count: u32, elapsed_ms: u64) {
        log::debug!(target: VIDEO_TARGET, "dropped {} frames in {}ms", count, elapsed_ms);
    }

    fn on_video_size_changed(
        &self,
        width: u32,
        height: u32,
        unapplied_rotation_degrees: i32,
        pixel_width_height_ratio: f32,
    ) {
        log::debug!(
            target: VIDEO_TARGET,
            "video size {}x{} rotation={} par={}",
            width,
            height,
            unapplied_rotation_degrees,
            pixel_width_height_ratio
        );
    }

    fn on_rendered_first_frame(&self, surface: Option<VideoSurface>) {
        log::debug!(target: VIDEO_TARGET, "first frame rendered on {:?}", surface);
    }

    fn on_video_disabled(&self, counters: DecoderCounters) {
        log::debug!(target: VIDEO_TARGET, "video disabled: {:?}", counters);
    }
}

#[derive(Debug, Default)]
pub struct AudioEventLogger;

impl AudioRendererEventListener for AudioEventLogger {
    fn on_audio_enabled(&self, counters: DecoderCounters) {
        log::debug!(target: AUDIO_TARGET, "audio enabled: {:?}", counters);
    }

    fn on_audio_session_id(&self, audio_session_id: i32) {
        log::debug!(target: AUDIO_TARGET, "audio session id {}", audio_session_id);
    }

    fn on_audio_decoder_initialized(
        &self,
        decoder_name: &str,
        initialized_timestamp_ms: u64,
        initialization_duration_ms: u64,
    ) {
        log::debug!(
            target: AUDIO_TARGET,
            "audio decoder {} initialized at {}ms in {}ms",
            decoder_name,
            initialized_timestamp_ms,
            initialization_duration_ms
        );
    }

    fn on_audio_input_format_changed(&self, format: &Format) {
        log::debug!(target: AUDIO_TARGET, "audio format: {:?}", format);
    }

    fn on_audio_sink_underrun(&self, buffer_size: usize, buffer_size_ms: u64, elapsed_since_last_feed_ms: u64) {
        log::warn!(
            target: AUDIO_TARGET,
            "audio sink underrun: buffer {} samples ({}ms), {}ms since last feed",
            buffer_size,
            buffer_size_ms,
            elapsed_since_last_feed_ms
        );
    }

    fn on_audio_disabled(&self, counters: DecoderCounters) {
        log::debug!(target: AUDIO_TARGET, "audio disabled: {:?}", counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_with_play_when_ready_is_actually_playing() {
        let report = describe_state_change(true, PlaybackState::Ready);
        assert_eq!(report.label, "Ready");
        assert!(report.actually_playing);
    }

    #[test]
    fn test_paused_ready_is_not_playing() {
        let report = describe_state_change(false, PlaybackState::Ready);
        assert_eq!(report.label, "Ready");
        assert!(!report.actually_playing);

        assert!(!describe_state_change(true, PlaybackState::Buffering).actually_playing);
        assert!(!describe_state_change(true, PlaybackState::Ended).actually_playing);
    }

    #[test]
    fn test_unknown_state_is_labelled_not_rejected() {
        let report = describe_state_change(true, PlaybackState::from_code(7));
        assert_eq!(report.label, "Unknown");
        assert!(!report.actually_playing);

        // Logging an unknown state must not panic
        StateLogger.on_player_state_changed(true, PlaybackState::from_code(7));
    }

    #[test]
    fn test_loggers_accept_every_notice() {
        let video = VideoEventLogger;
        video.on_video_enabled(DecoderCounters::default());
        video.on_video_decoder_initialized("test.decoder", 10, 2);
        video.on_video_input_format_changed(&Format::default());
        video.on_dropped_frames(3, 1000);
        video.on_video_size_changed(1280, 720, 0, 1.0);
        video.on_rendered_first_frame(Some(VideoSurface(1)));
        video.on_video_disabled(DecoderCounters::default());

        let audio = AudioEventLogger;
        audio.on_audio_enabled(DecoderCounters::default());
        audio.on_audio_session_id(5);
        audio.on_audio_decoder_initialized("test.decoder", 10, 2);
        audio.on_audio_input_format_changed(&Format::default());
        audio.on_audio_sink_underrun(4096, 42, 100);
        audio.on_audio_disabled(DecoderCounters::default());
    }
}
