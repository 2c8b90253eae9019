// Pitch-preserving time stretch (WSOLA)
// Hann-windowed segments are overlap-added at a fixed output hop; each one is
// taken near its nominal input position where it best continues the last

use std::f32::consts::PI;

/// Segment length in milliseconds
const SEGMENT_MS: usize = 40;

/// How far past the nominal position a segment may start, in milliseconds
const SEARCH_MS: usize = 10;

pub struct TimeStretch {
    channels: usize,
    window: Vec<f32>,
    search: usize,
    /// Windowed second half of the last segment, waiting for its overlap
    tail: Vec<f32>,
    /// The same frames unwindowed and mixed to mono: the shape the next
    /// segment should continue
    template: Vec<f32>,
    primed: bool,
    /// Fractional input frames not yet advanced
    carry: f64,
    mono: Vec<f32>,
}

impl TimeStretch {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as usize;
        let segment = ((rate * SEGMENT_MS / 1000) & !1).max(8);
        // Periodic Hann: halves overlapped at `segment / 2` sum to one
        let window = (0..segment)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / segment as f32).cos())
            .collect();
        Self {
            channels: channels.max(1),
            window,
            search: (rate * SEARCH_MS / 1000).max(1),
            tail: Vec::new(),
            template: Vec::new(),
            primed: false,
            carry: 0.0,
            mono: Vec::new(),
        }
    }

    /// Output frames produced by one `process` call
    pub fn hop(&self) -> usize {
        self.window.len() / 2
    }

    /// Input frames `process` needs from the nominal position at `ratio`
    pub fn lookahead(&self, ratio: f64) -> usize {
        let advance = (self.hop() as f64 * ratio).ceil() as usize;
        (self.window.len() + self.search).max(advance + 1)
    }

    pub fn reset(&mut self) {
        self.tail.clear();
        self.template.clear();
        self.primed = false;
        self.carry = 0.0;
    }

    /// Append one hop of output to `out`. `input` is interleaved and starts at
    /// the nominal position; `ratio` is input frames per output frame. Returns
    /// how many input frames the nominal position moves, or `None` when
    /// `input` is shorter than one segment.
    pub fn process(&mut self, input: &[f32], ratio: f64, out: &mut Vec<f32>) -> Option<usize> {
        let ch = self.channels;
        let segment = self.window.len();
        let hop = self.hop();
        let available = input.len() / ch;
        if available < segment {
            return None;
        }

        let offset = if self.primed {
            self.best_offset(input, (available - segment).min(self.search))
        } else {
            0
        };
        let chosen = &input[offset * ch..(offset + segment) * ch];

        if self.primed {
            for i in 0..hop {
                let w = self.window[i];
                for c in 0..ch {
                    out.push(self.tail[i * ch + c] + w * chosen[i * ch + c]);
                }
            }
        } else {
            out.extend_from_slice(&chosen[..hop * ch]);
        }

        self.tail.clear();
        self.template.clear();
        for i in hop..segment {
            let w = self.window[i];
            let mut sum = 0.0;
            for c in 0..ch {
                let sample = chosen[i * ch + c];
                self.tail.push(w * sample);
                sum += sample;
            }
            self.template.push(sum / ch as f32);
        }
        self.primed = true;

        let exact = hop as f64 * ratio.max(0.0) + self.carry;
        let advance = exact.floor();
        self.carry = exact - advance;
        Some(advance as usize)
    }

    /// Start offset in `0..=max_offset` whose opening best matches the template,
    /// by normalized cross-correlation on every other frame.
    fn best_offset(&mut self, input: &[f32], max_offset: usize) -> usize {
        let ch = self.channels;
        let hop = self.hop();
        self.mono.clear();
        self.mono.extend(
            input
                .chunks_exact(ch)
                .take(max_offset + hop)
                .map(|frame| frame.iter().sum::<f32>() / ch as f32),
        );

        let mut best = (0, f32::MIN);
        for offset in 0..=max_offset {
            let candidate = &self.mono[offset..offset + hop];
            let (mut dot, mut energy) = (0.0f32, 0.0f32);
            for (a, b) in candidate.iter().zip(&self.template).step_by(2) {
                dot += a * b;
                energy += a * a;
            }
            let score = dot / (energy + 1e-9).sqrt();
            if score > best.1 {
                best = (offset, score);
            }
        }
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_follow_sample_rate() {
        let stretch = TimeStretch::new(2, 8_000);
        assert_eq!(stretch.hop(), 160);
        assert_eq!(stretch.lookahead(1.0), 320 + 80);
        assert_eq!(stretch.lookahead(4.0), 641);
    }

    #[test]
    fn test_short_input_is_refused() {
        let mut stretch = TimeStretch::new(1, 8_000);
        let mut out = Vec::new();
        assert_eq!(stretch.process(&[0.0; 100], 1.0, &mut out), None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unity_ratio_reproduces_constant_signal() {
        let mut stretch = TimeStretch::new(2, 8_000);
        let input = vec![0.25f32; 400 * 2];
        let mut out = Vec::new();
        let mut advanced = 0;
        for _ in 0..3 {
            advanced += stretch.process(&input, 1.0, &mut out).unwrap();
        }
        assert_eq!(advanced, 480);
        assert_eq!(out.len(), 480 * 2);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-5));
    }

    #[test]
    fn test_fractional_advance_is_carried() {
        let mut stretch = TimeStretch::new(1, 8_000);
        let input = vec![0.0f32; 400];
        let mut out = Vec::new();
        // 160 output frames at 15/64 is 37.5 input frames
        let steps: Vec<usize> = (0..4)
            .map(|_| stretch.process(&input, 0.234375, &mut out).unwrap())
            .collect();
        assert_eq!(steps, vec![37, 38, 37, 38]);
    }
}
