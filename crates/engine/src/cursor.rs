// Walks a timeline's windows over decoded media, trimming chunks to window bounds

use reel_core::{Timeline, Window};
use std::time::Duration;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Where a decoded chunk lands relative to the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Entirely before the playback start; drop it
    Skip,
    /// At or past the end of the current window; advance before using it
    WindowEnd,
    /// Frames `skip_frames..skip_frames + take_frames` belong to the window
    Emit {
        window_index: u32,
        /// Window-relative time of the first emitted frame
        start: Duration,
        skip_frames: usize,
        take_frames: usize,
        /// The chunk reaches the window end
        ends_window: bool,
    },
}

#[derive(Debug, Clone)]
pub struct WindowCursor {
    timeline: Timeline,
    index: usize,
    window: Window,
    /// Media timestamp before which decoded frames are discarded
    skip_until_us: u64,
}

impl WindowCursor {
    /// Position the cursor at `position` inside `window_index`. Out-of-range
    /// windows fall back to the first one.
    pub fn new(timeline: &Timeline, window_index: u32, position: Duration) -> Self {
        let mut cursor = Self {
            timeline: timeline.clone(),
            index: 0,
            window: Window::default(),
            skip_until_us: 0,
        };
        cursor.seek(window_index, position);
        cursor
    }

    pub fn seek(&mut self, window_index: u32, position: Duration) {
        let index = window_index as usize;
        let (index, window) = match self.timeline.window(index) {
            Some(window) => (index, window),
            None => {
                log::warn!(
                    "seek to window {} outside timeline of {} windows, using window 0",
                    window_index,
                    self.timeline.window_count()
                );
                (0, self.timeline.window(0).unwrap_or_default())
            }
        };
        self.index = index;
        self.window = window;
        let mut target = window.start_us.saturating_add(position.as_micros() as u64);
        if let Some(end) = window.end_us {
            target = target.min(end);
        }
        self.skip_until_us = target;
    }

    pub fn index(&self) -> u32 {
        u32::try_from(self.index).unwrap_or(u32::MAX)
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn window_count(&self) -> usize {
        self.timeline.window_count()
    }

    /// Window-relative position of the seek target
    pub fn seek_offset(&self) -> Duration {
        Duration::from_micros(self.skip_until_us.saturating_sub(self.window.start_us))
    }

    /// Media timestamp the demuxer should seek to
    pub fn seek_target_us(&self) -> u64 {
        self.skip_until_us
    }

    /// Move to the start of the next window. Returns false at the end of the timeline.
    pub fn advance(&mut self) -> bool {
        let Some(window) = self.timeline.window(self.index + 1) else {
            return false;
        };
        self.index += 1;
        self.window = window;
        self.skip_until_us = window.start_us;
        true
    }

    pub fn place(&self, chunk_start_us: u64, frames: usize, sample_rate: u32) -> Placement {
        let window = self.window;
        let rate = sample_rate.max(1) as u64;
        let chunk_end_us = chunk_start_us + frames as u64 * MICROS_PER_SEC / rate;

        if let Some(end) = window.end_us {
            if chunk_start_us >= end {
                return Placement::WindowEnd;
            }
        }
        if frames == 0 || chunk_end_us <= self.skip_until_us {
            return Placement::Skip;
        }

        let skip_frames = if chunk_start_us < self.skip_until_us {
            (((self.skip_until_us - chunk_start_us) * rate) / MICROS_PER_SEC) as usize
        } else {
            0
        };
        let skip_frames = skip_frames.min(frames);

        let (keep_frames, ends_window) = match window.end_us {
            Some(end) if chunk_end_us >= end => {
                let until_end = (((end - chunk_start_us) * rate) / MICROS_PER_SEC) as usize;
                (until_end.min(frames), true)
            }
            _ => (frames, false),
        };
        let take_frames = keep_frames.saturating_sub(skip_frames);
        if take_frames == 0 {
            return if ends_window {
                Placement::WindowEnd
            } else {
                Placement::Skip
            };
        }

        let first_us = chunk_start_us + skip_frames as u64 * MICROS_PER_SEC / rate;
        Placement::Emit {
            window_index: self.index(),
            start: Duration::from_micros(first_us.saturating_sub(window.start_us)),
            skip_frames,
            take_frames,
            ends_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::{DataSourceFactory, MediaSource};

    const RATE: u32 = 1_000;

    fn looped_clip() -> Timeline {
        let source = MediaSource::progressive("clip.mp3", DataSourceFactory::new("ua"));
        let clip = MediaSource::clipped(source, 10_000_000, 30_000_000).unwrap();
        MediaSource::looped(clip, 2).unwrap().timeline()
    }

    #[test]
    fn test_chunk_before_start_is_skipped() {
        let cursor = WindowCursor::new(&looped_clip(), 0, Duration::ZERO);
        assert_eq!(cursor.seek_target_us(), 10_000_000);
        assert_eq!(cursor.place(5_000_000, 1_000, RATE), Placement::Skip);
    }

    #[test]
    fn test_chunk_straddling_start_is_trimmed() {
        let cursor = WindowCursor::new(&looped_clip(), 0, Duration::ZERO);
        assert_eq!(
            cursor.place(9_500_000, 1_000, RATE),
            Placement::Emit {
                window_index: 0,
                start: Duration::ZERO,
                skip_frames: 500,
                take_frames: 500,
                ends_window: false,
            }
        );
    }

    #[test]
    fn test_chunk_straddling_end_is_cut() {
        let cursor = WindowCursor::new(&looped_clip(), 0, Duration::ZERO);
        assert_eq!(
            cursor.place(29_500_000, 1_000, RATE),
            Placement::Emit {
                window_index: 0,
                start: Duration::from_millis(19_500),
                skip_frames: 0,
                take_frames: 500,
                ends_window: true,
            }
        );
        assert_eq!(cursor.place(30_000_000, 1_000, RATE), Placement::WindowEnd);
    }

    #[test]
    fn test_seek_into_second_window() {
        let mut cursor = WindowCursor::new(&looped_clip(), 0, Duration::ZERO);
        cursor.seek(1, Duration::from_secs(5));
        assert_eq!(cursor.index(), 1);
        assert_eq!(cursor.seek_target_us(), 15_000_000);
        match cursor.place(15_000_000, 100, RATE) {
            Placement::Emit {
                window_index, start, ..
            } => {
                assert_eq!(window_index, 1);
                assert_eq!(start, Duration::from_secs(5));
            }
            other => panic!("unexpected placement {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_window_falls_back() {
        let cursor = WindowCursor::new(&looped_clip(), 9, Duration::from_secs(1));
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.seek_target_us(), 11_000_000);
    }

    #[test]
    fn test_walks_huge_loop_without_expanding_it() {
        let source = MediaSource::progressive("clip.mp3", DataSourceFactory::new("ua"));
        let clip = MediaSource::clipped(source, 10_000_000, 30_000_000).unwrap();
        let timeline = MediaSource::looped(clip, u32::MAX).unwrap().timeline();

        let mut cursor = WindowCursor::new(&timeline, u32::MAX - 2, Duration::from_secs(3));
        assert_eq!(cursor.index(), u32::MAX - 2);
        assert_eq!(cursor.seek_target_us(), 13_000_000);
        assert_eq!(cursor.seek_offset(), Duration::from_secs(3));
        assert!(cursor.advance());
        assert_eq!(cursor.index(), u32::MAX - 1);
        assert_eq!(cursor.seek_target_us(), 10_000_000);
        assert!(!cursor.advance());
    }

    #[test]
    fn test_seek_offset_never_underflows() {
        let inner = MediaSource::clipped(
            MediaSource::progressive("clip.mp3", DataSourceFactory::new("ua")),
            10_000_000,
            20_000_000,
        )
        .unwrap();
        let inverted = MediaSource::Clipped {
            inner: Box::new(inner),
            start_us: 15_000_000,
            end_us: 30_000_000,
        };
        let cursor = WindowCursor::new(&inverted.timeline(), 0, Duration::from_secs(2));
        assert_eq!(cursor.seek_offset(), Duration::ZERO);
        assert_eq!(cursor.place(25_000_000, 1_000, RATE), Placement::WindowEnd);
    }

    /// Decode a 60 s file in one-second chunks and count what is played.
    #[test]
    fn test_looped_clip_plays_forty_seconds_then_ends() {
        let mut cursor = WindowCursor::new(&looped_clip(), 0, Duration::ZERO);
        let mut played_frames = 0usize;
        let mut windows_played = 0;
        let mut media_us = 0u64;
        let mut finished = false;
        let mut guard = 0;

        while media_us < 60_000_000 && guard < 1_000 {
            guard += 1;
            match cursor.place(media_us, RATE as usize, RATE) {
                Placement::Skip => media_us += 1_000_000,
                Placement::WindowEnd => {
                    windows_played += 1;
                    if !cursor.advance() {
                        finished = true;
                        break;
                    }
                    // Demuxer seeks back to the window start
                    media_us = cursor.seek_target_us();
                }
                Placement::Emit {
                    take_frames,
                    ends_window,
                    ..
                } => {
                    played_frames += take_frames;
                    if ends_window {
                        windows_played += 1;
                        if !cursor.advance() {
                            finished = true;
                            break;
                        }
                        media_us = cursor.seek_target_us();
                    } else {
                        media_us += 1_000_000;
                    }
                }
            }
        }

        assert!(finished);
        assert_eq!(windows_played, 2);
        assert_eq!(played_frames, 40 * RATE as usize);
    }
}
