// Media source descriptors and the timelines they resolve to

use crate::bandwidth::BandwidthMeter;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How bytes for a source are fetched: the user agent sent with every request
/// and, optionally, the meter that transfers report to.
#[derive(Clone)]
pub struct DataSourceFactory {
    user_agent: String,
    bandwidth_meter: Option<Arc<BandwidthMeter>>,
}

impl DataSourceFactory {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            bandwidth_meter: None,
        }
    }

    pub fn with_bandwidth_meter(mut self, meter: Arc<BandwidthMeter>) -> Self {
        self.bandwidth_meter = Some(meter);
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn bandwidth_meter(&self) -> Option<&Arc<BandwidthMeter>> {
        self.bandwidth_meter.as_ref()
    }
}

impl fmt::Debug for DataSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DataSourceFactory")
            .field("user_agent", &self.user_agent)
            .field("metered", &self.bandwidth_meter.is_some())
            .finish()
    }
}

/// Build a user agent of the form `app/version (os) reel-engine`.
pub fn default_user_agent(app_name: &str) -> String {
    format!(
        "{}/{} ({}) reel-engine",
        app_name,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// What to play and how.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A single progressive file (MP4, MP3, ...)
    Progressive {
        uri: String,
        data_source: DataSourceFactory,
    },
    /// A DASH manifest. Chunks are fetched through a metered factory,
    /// the manifest through a separate unmetered one.
    Dash {
        uri: String,
        chunk_source: DataSourceFactory,
        manifest_source: DataSourceFactory,
    },
    /// The inner source bounded to `[start_us, end_us)`
    Clipped {
        inner: Box<MediaSource>,
        start_us: u64,
        end_us: u64,
    },
    /// The inner source played `count` times, then ended
    Looped { inner: Box<MediaSource>, count: u32 },
}

impl MediaSource {
    pub fn progressive(uri: impl Into<String>, data_source: DataSourceFactory) -> Self {
        MediaSource::Progressive {
            uri: uri.into(),
            data_source,
        }
    }

    pub fn dash(
        uri: impl Into<String>,
        chunk_source: DataSourceFactory,
        manifest_source: DataSourceFactory,
    ) -> Self {
        MediaSource::Dash {
            uri: uri.into(),
            chunk_source,
            manifest_source,
        }
    }

    /// Clip `inner` to `[start_us, end_us)`, relative to the start of its
    /// window. Only single-window sources can be clipped, and the clip must
    /// start before the inner window ends.
    pub fn clipped(inner: MediaSource, start_us: u64, end_us: u64) -> Result<Self> {
        if start_us >= end_us {
            return Err(Error::InvalidSource(format!(
                "clip start {}us must be before end {}us",
                start_us, end_us
            )));
        }
        let timeline = inner.timeline();
        let window = match timeline.window(0) {
            Some(window) if timeline.window_count() == 1 => window,
            _ => {
                return Err(Error::InvalidSource(
                    "only single-window sources can be clipped".to_string(),
                ))
            }
        };
        if let Some(inner_end) = window.end_us {
            if window.start_us.saturating_add(start_us) >= inner_end {
                return Err(Error::InvalidSource(format!(
                    "clip start {}us is past the end of the inner window ({}us long)",
                    start_us,
                    inner_end.saturating_sub(window.start_us)
                )));
            }
        }
        Ok(MediaSource::Clipped {
            inner: Box::new(inner),
            start_us,
            end_us,
        })
    }

    /// Repeat `inner` exactly `count` times. For endless repetition use the
    /// engine's repeat mode instead.
    pub fn looped(inner: MediaSource, count: u32) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidSource("loop count must be at least 1".to_string()));
        }
        Ok(MediaSource::Looped {
            inner: Box::new(inner),
            count,
        })
    }

    /// The URI of the underlying media
    pub fn uri(&self) -> &str {
        match self {
            MediaSource::Progressive { uri, .. } | MediaSource::Dash { uri, .. } => uri,
            MediaSource::Clipped { inner, .. } | MediaSource::Looped { inner, .. } => inner.uri(),
        }
    }

    /// The progressive or DASH source at the bottom of any clip/loop wrapping
    pub fn base(&self) -> &MediaSource {
        match self {
            MediaSource::Clipped { inner, .. } | MediaSource::Looped { inner, .. } => inner.base(),
            leaf => leaf,
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self.base(), MediaSource::Dash { .. })
    }

    /// Resolve the playable windows of this source.
    pub fn timeline(&self) -> Timeline {
        match self {
            MediaSource::Progressive { .. } | MediaSource::Dash { .. } => Timeline {
                period: vec![Window::default()],
                repeat: 1,
            },
            MediaSource::Clipped {
                inner,
                start_us,
                end_us,
            } => {
                let mut timeline = inner.timeline();
                for window in &mut timeline.period {
                    *window = window.clip(*start_us, *end_us);
                }
                timeline
            }
            MediaSource::Looped { inner, count } => {
                let mut timeline = inner.timeline();
                timeline.repeat = timeline.repeat.saturating_mul(*count as u64);
                timeline
            }
        }
    }
}

/// A span of the underlying media, in microseconds. `end_us == None` means
/// "until the media ends".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start_us: u64,
    pub end_us: Option<u64>,
}

impl Window {
    /// The part of this window between `start_us` and `end_us` after its
    /// own start. Never extends past the current end.
    fn clip(self, start_us: u64, end_us: u64) -> Window {
        let start = self.start_us.saturating_add(start_us);
        let end = self.start_us.saturating_add(end_us);
        let end = self.end_us.map_or(end, |inner_end| inner_end.min(end));
        Window {
            start_us: start,
            end_us: Some(end.max(start)),
        }
    }

    /// Playable length given the length of the underlying media, if known.
    pub fn duration(&self, media_duration: Option<Duration>) -> Option<Duration> {
        let media_us = media_duration.map(|d| d.as_micros() as u64);
        let end = match (self.end_us, media_us) {
            (Some(end), Some(media)) => end.min(media),
            (Some(end), None) => end,
            (None, Some(media)) => media,
            (None, None) => return None,
        };
        Some(Duration::from_micros(end.saturating_sub(self.start_us)))
    }

    /// Whether a media timestamp lies inside this window.
    pub fn contains_us(&self, media_us: u64) -> bool {
        media_us >= self.start_us && self.end_us.map_or(true, |end| media_us < end)
    }
}

/// Ordered playable windows of a resolved source: one period of windows
/// played `repeat` times. Always finite and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    period: Vec<Window>,
    repeat: u64,
}

impl Timeline {
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        self.period.iter().copied().cycle().take(self.window_count())
    }

    pub fn window(&self, index: usize) -> Option<Window> {
        if index >= self.window_count() {
            return None;
        }
        Some(self.period[index % self.period.len()])
    }

    pub fn window_count(&self) -> usize {
        let count = (self.period.len() as u64).saturating_mul(self.repeat);
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// Total playback length across all windows, or `None` when a window is
    /// open-ended and the media length is unknown.
    pub fn duration(&self, media_duration: Option<Duration>) -> Option<Duration> {
        let period = self
            .period
            .iter()
            .map(|w| w.duration(media_duration))
            .sum::<Option<Duration>>()?;
        let total_us = period.as_micros().saturating_mul(self.repeat as u128);
        Some(Duration::from_micros(u64::try_from(total_us).unwrap_or(u64::MAX)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "https://example.com/media/sample.mp4";

    fn progressive() -> MediaSource {
        MediaSource::progressive(URI, DataSourceFactory::new("test-agent"))
    }

    #[test]
    fn test_clip_bounds_must_be_ordered() {
        assert!(matches!(
            MediaSource::clipped(progressive(), 30_000_000, 10_000_000),
            Err(Error::InvalidSource(_))
        ));
        assert!(MediaSource::clipped(progressive(), 5, 5).is_err());
        assert!(MediaSource::clipped(progressive(), 0, 1).is_ok());
    }

    #[test]
    fn test_loop_count_must_be_positive() {
        assert!(matches!(
            MediaSource::looped(progressive(), 0),
            Err(Error::InvalidSource(_))
        ));
        assert!(MediaSource::looped(progressive(), 1).is_ok());
    }

    #[test]
    fn test_looped_clip_is_two_twenty_second_windows() {
        let clip = MediaSource::clipped(progressive(), 10_000_000, 30_000_000).unwrap();
        let source = MediaSource::looped(clip, 2).unwrap();
        let timeline = source.timeline();

        assert_eq!(timeline.window_count(), 2);
        for window in timeline.windows() {
            assert_eq!(window.start_us, 10_000_000);
            assert_eq!(window.end_us, Some(30_000_000));
        }
        assert_eq!(timeline.duration(None), Some(Duration::from_secs(40)));
        assert_eq!(
            timeline.duration(Some(Duration::from_secs(120))),
            Some(Duration::from_secs(40))
        );
    }

    #[test]
    fn test_clip_past_media_end_is_shortened() {
        let clip = MediaSource::clipped(progressive(), 10_000_000, 30_000_000).unwrap();
        let source = MediaSource::looped(clip, 2).unwrap();
        assert_eq!(
            source.timeline().duration(Some(Duration::from_secs(25))),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_unclipped_duration_follows_media() {
        let timeline = progressive().timeline();
        assert_eq!(timeline.duration(None), None);
        assert_eq!(
            timeline.duration(Some(Duration::from_millis(1500))),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_looped_source_cannot_be_clipped() {
        let looped = MediaSource::looped(progressive(), 3).unwrap();
        assert!(MediaSource::clipped(looped, 0, 1_000_000).is_err());
    }

    #[test]
    fn test_base_and_uri_see_through_wrappers() {
        let chunks = DataSourceFactory::new("ua").with_bandwidth_meter(Arc::new(BandwidthMeter::new()));
        let dash = MediaSource::dash("https://example.com/manifest.mpd", chunks, DataSourceFactory::new("ua"));
        let wrapped = MediaSource::looped(MediaSource::clipped(dash, 0, 1_000).unwrap(), 2).unwrap();
        assert!(wrapped.is_adaptive());
        assert_eq!(wrapped.uri(), "https://example.com/manifest.mpd");
        assert!(!progressive().is_adaptive());
    }

    #[test]
    fn test_nested_clip_is_relative_to_inner_window() {
        let inner = MediaSource::clipped(progressive(), 10_000_000, 20_000_000).unwrap();
        let clip = MediaSource::clipped(inner, 2_000_000, 4_000_000).unwrap();
        assert_eq!(
            clip.timeline().window(0),
            Some(Window {
                start_us: 12_000_000,
                end_us: Some(14_000_000),
            })
        );

        // The outer end is cut to the inner end
        let inner = MediaSource::clipped(progressive(), 10_000_000, 20_000_000).unwrap();
        let clip = MediaSource::clipped(inner, 5_000_000, 30_000_000).unwrap();
        assert_eq!(
            clip.timeline().window(0),
            Some(Window {
                start_us: 15_000_000,
                end_us: Some(20_000_000),
            })
        );
    }

    #[test]
    fn test_nested_clip_starting_past_inner_end_is_rejected() {
        let inner = MediaSource::clipped(progressive(), 10_000_000, 20_000_000).unwrap();
        assert!(matches!(
            MediaSource::clipped(inner, 15_000_000, 30_000_000),
            Err(Error::InvalidSource(_))
        ));
        let inner = MediaSource::clipped(progressive(), 10_000_000, 20_000_000).unwrap();
        assert!(MediaSource::clipped(inner, 10_000_000, 11_000_000).is_err());
    }

    #[test]
    fn test_hand_built_inverted_clip_is_empty() {
        let inner = MediaSource::clipped(progressive(), 10_000_000, 20_000_000).unwrap();
        let clip = MediaSource::Clipped {
            inner: Box::new(inner),
            start_us: 15_000_000,
            end_us: 30_000_000,
        };
        let window = clip.timeline().window(0).unwrap();
        assert_eq!(window.start_us, 25_000_000);
        assert_eq!(window.end_us, Some(25_000_000));
        assert_eq!(window.duration(None), Some(Duration::ZERO));
    }

    #[test]
    fn test_huge_loop_count_is_not_expanded() {
        let source = MediaSource::looped(progressive(), u32::MAX).unwrap();
        let timeline = source.timeline();
        let last = u32::MAX as usize - 1;

        assert_eq!(timeline.window_count(), u32::MAX as usize);
        assert_eq!(timeline.window(last), Some(Window::default()));
        assert_eq!(timeline.window(last + 1), None);
        assert_eq!(
            timeline.duration(Some(Duration::from_secs(1))),
            Some(Duration::from_secs(u32::MAX as u64))
        );
        assert_eq!(timeline.windows().take(3).count(), 3);
    }

    #[test]
    fn test_nested_loops_multiply() {
        let clip = MediaSource::clipped(progressive(), 0, 1_000_000).unwrap();
        let source = MediaSource::looped(MediaSource::looped(clip, 3).unwrap(), 4).unwrap();
        let timeline = source.timeline();
        assert_eq!(timeline.window_count(), 12);
        assert_eq!(timeline.windows().count(), 12);
        assert_eq!(timeline.duration(None), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_window_contains() {
        let window = Window {
            start_us: 100,
            end_us: Some(200),
        };
        assert!(window.contains_us(100));
        assert!(window.contains_us(199));
        assert!(!window.contains_us(200));
        assert!(!window.contains_us(99));
    }
}
