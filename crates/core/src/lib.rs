// Core types and traits for the Reel playback session

pub mod bandwidth;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod listener;
pub mod media_source;
pub mod observer;
pub mod rate;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export commonly used types
pub use bandwidth::BandwidthMeter;
pub use config::{SessionConfig, SourceStrategy};
pub use engine::{EngineFactory, PlayerEngine};
pub use error::{Error, Result};
pub use event::{DecoderCounters, Format, PlaybackError, PlaybackState, VideoSurface};
pub use lifecycle::{ForegroundEvent, LifecycleAction, LifecyclePolicy};
pub use listener::{ListenerSet, Throttle};
pub use media_source::{DataSourceFactory, MediaSource, Timeline, Window};
pub use observer::{
    AudioEventLogger, AudioRendererEventListener, EventListener, StateLogger, VideoEventLogger,
    VideoRendererEventListener,
};
pub use rate::{PlaybackParameters, PlaybackRate};
pub use session::{Observers, PlaybackSession, SessionController};

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install the platform logger once. Later calls do nothing.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("Reel"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::builder()
                .is_test(cfg!(test))
                .filter_level(log::LevelFilter::Info)
                .parse_default_env()
                .try_init();
        }
    });
}
