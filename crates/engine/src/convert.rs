// Channel mapping and sample-rate conversion to the output device format

/// Converts interleaved decoder output to the device's rate and channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    input_rate: u32,
    output_rate: u32,
    input_channels: u16,
    output_channels: u16,
}

impl Converter {
    pub fn new(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> Self {
        Self {
            input_rate: input_rate.max(1),
            output_rate: output_rate.max(1),
            input_channels: input_channels.max(1),
            output_channels: output_channels.max(1),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate && self.input_channels == self.output_channels
    }

    /// Whether this converter was built for the given input format.
    pub fn accepts(&self, rate: u32, channels: u16) -> bool {
        self.input_rate == rate && self.input_channels == channels
    }

    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        let mapped = self.map_channels(input);
        if self.input_rate == self.output_rate {
            mapped
        } else {
            self.resample(&mapped)
        }
    }

    fn map_channels(&self, input: &[f32]) -> Vec<f32> {
        let inc = self.input_channels as usize;
        let outc = self.output_channels as usize;
        if inc == outc {
            return input.to_vec();
        }

        let frames = input.len() / inc;
        let mut output = Vec::with_capacity(frames * outc);
        for frame in input.chunks_exact(inc) {
            if outc == 1 {
                // Downmix to mono
                output.push(frame.iter().sum::<f32>() / inc as f32);
            } else {
                // Spread or truncate, wrapping input channels over the output
                for ch in 0..outc {
                    output.push(frame[ch % inc]);
                }
            }
        }
        output
    }

    /// Linear interpolation at the output rate
    fn resample(&self, input: &[f32]) -> Vec<f32> {
        let channels = self.output_channels as usize;
        let input_frames = input.len() / channels;
        if input_frames == 0 {
            return Vec::new();
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let output_frames = ((input_frames as f64) * ratio).round() as usize;
        let mut output = Vec::with_capacity(output_frames * channels);

        for frame_idx in 0..output_frames {
            let src = frame_idx as f64 / ratio;
            let lo = (src.floor() as usize).min(input_frames - 1);
            let hi = (lo + 1).min(input_frames - 1);
            let frac = (src - lo as f64).clamp(0.0, 1.0) as f32;

            for ch in 0..channels {
                let a = input[lo * channels + ch];
                let b = input[hi * channels + ch];
                output.push(a + (b - a) * frac);
            }
        }
        output
    }
}
