// Decoded PCM waiting for the output device, tagged with timeline position
// The output side reads at the current playback speed and pitch

use crate::stretch::TimeStretch;
use std::collections::VecDeque;
use std::time::Duration;

/// Interleaved samples at the output format, starting at `start` within `window_index`
#[derive(Debug, Clone)]
pub struct PcmChunk {
    pub window_index: u32,
    pub start: Duration,
    pub samples: Vec<f32>,
}

pub struct PlaybackQueue {
    chunks: VecDeque<PcmChunk>,
    channels: usize,
    sample_rate: u32,
    /// Fractional read position, in frames, inside the front chunk
    cursor: f64,
    buffered_frames: usize,
    capacity_frames: usize,
    playhead: (u32, Duration),
    stretch: TimeStretch,
    /// Time-stretched frames, read at the pitch step
    stretched: Vec<f32>,
    stretched_pos: f64,
    /// Frames gathered across chunks for one stretch hop
    scratch: Vec<f32>,
}

impl PlaybackQueue {
    pub fn new(channels: u16, sample_rate: u32, capacity: Duration) -> Self {
        let sample_rate = sample_rate.max(1);
        let channels = channels.max(1) as usize;
        Self {
            chunks: VecDeque::new(),
            channels,
            sample_rate,
            cursor: 0.0,
            buffered_frames: 0,
            capacity_frames: (capacity.as_secs_f64() * sample_rate as f64) as usize,
            playhead: (0, Duration::ZERO),
            stretch: TimeStretch::new(channels, sample_rate),
            stretched: Vec::new(),
            stretched_pos: 0.0,
            scratch: Vec::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn has_room(&self) -> bool {
        self.buffered_frames < self.capacity_frames
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn buffered(&self) -> Duration {
        self.frames_to_duration(self.buffered_frames)
    }

    pub fn push(&mut self, chunk: PcmChunk) {
        let frames = chunk.samples.len() / self.channels;
        if frames == 0 {
            return;
        }
        if self.chunks.is_empty() {
            self.playhead = (chunk.window_index, chunk.start);
        }
        self.buffered_frames += frames;
        self.chunks.push_back(chunk);
    }

    /// Drop everything queued and report `playhead` until new data arrives.
    pub fn reset(&mut self, playhead: (u32, Duration)) {
        self.chunks.clear();
        self.cursor = 0.0;
        self.buffered_frames = 0;
        self.playhead = playhead;
        self.drop_stretched();
    }

    /// Window and window-relative position of the next frame to be heard
    pub fn playhead(&self) -> (u32, Duration) {
        self.playhead
    }

    /// Fill `output` with audio played at `speed` with its pitch scaled by
    /// `pitch`. Returns the number of samples written; the rest of `output` is
    /// left untouched.
    ///
    /// Anything other than unit speed and pitch goes through the time
    /// stretcher. When less is queued than one stretch hop needs, the rest is
    /// read by interpolating at `speed`, which shifts pitch.
    pub fn read(&mut self, output: &mut [f32], speed: f32, pitch: f32) -> usize {
        let speed = sanitize(speed);
        let pitch = sanitize(pitch);
        let mut written = 0;
        if speed == 1.0 && pitch == 1.0 {
            if !self.stretched.is_empty() {
                self.drop_stretched();
            }
        } else {
            written = self.read_stretched(output, speed, pitch);
        }
        if written < output.len() {
            written += self.read_resampled(&mut output[written..], speed);
        }
        written
    }

    fn read_stretched(&mut self, output: &mut [f32], speed: f64, pitch: f64) -> usize {
        let channels = self.channels;
        let ratio = speed / pitch;
        let mut written = 0;

        while written + channels <= output.len() {
            let frames = self.stretched.len() / channels;
            let base = self.stretched_pos.floor() as usize;
            if base + 1 < frames {
                let frac = (self.stretched_pos - base as f64) as f32;
                for ch in 0..channels {
                    let a = self.stretched[base * channels + ch];
                    let b = self.stretched[(base + 1) * channels + ch];
                    output[written + ch] = a + (b - a) * frac;
                }
                written += channels;
                self.stretched_pos += pitch;
                continue;
            }

            // Keep the frame under the read head for interpolation
            let consumed = base.min(frames);
            self.stretched.drain(..consumed * channels);
            self.stretched_pos -= consumed as f64;

            let needed = self.stretch.lookahead(ratio);
            if !self.gather(needed) {
                self.drop_stretched();
                break;
            }
            match self.stretch.process(&self.scratch, ratio, &mut self.stretched) {
                Some(advance) => self.advance(advance),
                None => {
                    self.drop_stretched();
                    break;
                }
            }
        }

        self.update_playhead();
        written
    }

    /// Read at `step` source frames per output frame, interpolating between
    /// neighbours.
    fn read_resampled(&mut self, output: &mut [f32], step: f64) -> usize {
        let channels = self.channels;
        let mut written = 0;

        while written + channels <= output.len() {
            let Some(front) = self.chunks.front() else {
                break;
            };
            let frames = front.samples.len() / channels;
            let base = self.cursor.floor() as usize;
            if base >= frames {
                self.pop_front(frames);
                continue;
            }

            let frac = (self.cursor - base as f64) as f32;
            let next = (base + 1).min(frames - 1);
            for ch in 0..channels {
                let a = front.samples[base * channels + ch];
                let b = front.samples[next * channels + ch];
                output[written + ch] = a + (b - a) * frac;
            }
            written += channels;
            self.cursor += step;
        }

        self.update_playhead();
        written
    }

    /// Copy `frames` frames starting at the read position into the scratch
    /// buffer. False when fewer are queued.
    fn gather(&mut self, frames: usize) -> bool {
        let channels = self.channels;
        let mut skip = self.cursor.floor() as usize;
        if self.buffered_frames < skip + frames {
            return false;
        }

        self.scratch.clear();
        let mut remaining = frames;
        for chunk in &self.chunks {
            let chunk_frames = chunk.samples.len() / channels;
            if skip >= chunk_frames {
                skip -= chunk_frames;
                continue;
            }
            let take = (chunk_frames - skip).min(remaining);
            self.scratch
                .extend_from_slice(&chunk.samples[skip * channels..(skip + take) * channels]);
            remaining -= take;
            skip = 0;
            if remaining == 0 {
                break;
            }
        }
        remaining == 0
    }

    fn advance(&mut self, frames: usize) {
        self.cursor = self.cursor.floor() + frames as f64;
        self.update_playhead();
    }

    fn drop_stretched(&mut self) {
        self.stretched.clear();
        self.stretched_pos = 0.0;
        self.stretch.reset();
    }

    fn pop_front(&mut self, frames: usize) {
        if let Some(done) = self.chunks.pop_front() {
            self.playhead = (done.window_index, done.start + self.frames_to_duration(frames));
        }
        self.cursor = (self.cursor - frames as f64).max(0.0);
        self.buffered_frames = self.buffered_frames.saturating_sub(frames);
    }

    fn update_playhead(&mut self) {
        // Retire chunks the cursor has fully passed
        while let Some(front) = self.chunks.front() {
            let frames = front.samples.len() / self.channels;
            if self.cursor.floor() as usize >= frames {
                self.pop_front(frames);
            } else {
                break;
            }
        }

        if let Some(front) = self.chunks.front() {
            let offset = self.frames_to_duration(self.cursor.floor() as usize);
            self.playhead = (front.window_index, front.start + offset);
        }
    }

    fn frames_to_duration(&self, frames: usize) -> Duration {
        Duration::from_nanos(frames as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

fn sanitize(rate: f32) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate as f64
    } else {
        1.0
    }
}
