// Session configuration: what to play and how the lifecycle is handled

use crate::bandwidth::BandwidthMeter;
use crate::error::{Error, Result};
use crate::event::VideoSurface;
use crate::lifecycle::{LifecyclePolicy, LEGACY_PLATFORM_CUTOVER};
use crate::media_source::{default_user_agent, DataSourceFactory, MediaSource};
use std::sync::Arc;

pub const DEFAULT_MEDIA_URI: &str = "media/sample.mp4";
pub const DEFAULT_APP_NAME: &str = "reel";

/// Which media-source construction is used. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    Progressive,
    Dash,
    Clipped { start_us: u64, end_us: u64 },
    ClippedLoop { start_us: u64, end_us: u64, count: u32 },
}

impl SourceStrategy {
    /// Parse the `REEL_SOURCE` names. Clip bounds and loop count use the defaults.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "progressive" | "mp4" => Some(SourceStrategy::Progressive),
            "dash" => Some(SourceStrategy::Dash),
            "clipped" | "clip" => Some(SourceStrategy::Clipped {
                start_us: 10_000_000,
                end_us: 30_000_000,
            }),
            "looped" | "loop" => Some(SourceStrategy::default()),
            _ => None,
        }
    }

    /// Build the descriptor for `uri`.
    pub fn build(&self, uri: &str, user_agent: &str, meter: &Arc<BandwidthMeter>) -> Result<MediaSource> {
        let progressive = || MediaSource::progressive(uri, DataSourceFactory::new(user_agent));
        match *self {
            SourceStrategy::Progressive => Ok(progressive()),
            SourceStrategy::Dash => Ok(MediaSource::dash(
                uri,
                DataSourceFactory::new(user_agent).with_bandwidth_meter(meter.clone()),
                DataSourceFactory::new(user_agent),
            )),
            SourceStrategy::Clipped { start_us, end_us } => MediaSource::clipped(progressive(), start_us, end_us),
            SourceStrategy::ClippedLoop {
                start_us,
                end_us,
                count,
            } => MediaSource::looped(MediaSource::clipped(progressive(), start_us, end_us)?, count),
        }
    }
}

impl Default for SourceStrategy {
    fn default() -> Self {
        SourceStrategy::ClippedLoop {
            start_us: 10_000_000,
            end_us: 30_000_000,
            count: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub media_uri: String,
    pub strategy: SourceStrategy,
    /// Used to build the user agent of every request
    pub app_name: String,
    pub lifecycle: LifecyclePolicy,
    /// Initial play-when-ready for a fresh session
    pub play_when_ready: bool,
    pub video_surface: Option<VideoSurface>,
}

impl SessionConfig {
    pub fn new(media_uri: impl Into<String>) -> Self {
        Self {
            media_uri: media_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: SourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecyclePolicy) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_video_surface(mut self, surface: VideoSurface) -> Self {
        self.video_surface = Some(surface);
        self
    }

    pub fn user_agent(&self) -> String {
        default_user_agent(&self.app_name)
    }

    /// Defaults overlaid with `REEL_MEDIA_URI`, `REEL_SOURCE` and `REEL_PLATFORM_VERSION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(uri) = lookup("REEL_MEDIA_URI") {
            config.media_uri = uri;
        }
        if let Some(name) = lookup("REEL_SOURCE") {
            config.strategy = SourceStrategy::from_name(&name)
                .ok_or_else(|| Error::Other(format!("unknown REEL_SOURCE: {}", name)))?;
        }
        if let Some(version) = lookup("REEL_PLATFORM_VERSION") {
            let version: u32 = version
                .trim()
                .parse()
                .map_err(|_| Error::Other(format!("invalid REEL_PLATFORM_VERSION: {}", version)))?;
            config.lifecycle = LifecyclePolicy::from_platform_version(version, LEGACY_PLATFORM_CUTOVER);
        }

        Ok(config)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_uri: DEFAULT_MEDIA_URI.to_string(),
            strategy: SourceStrategy::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            lifecycle: LifecyclePolicy::default(),
            play_when_ready: true,
            video_surface: None,
        }
    }
}
