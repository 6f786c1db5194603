/*!
Linear sample-rate conversion for fully decoded tracks.

Tracks are decoded whole before playback, so conversion works on complete
interleaved buffers: every output frame interpolates between the two nearest
source frames, and the final frame is held rather than blended with silence.

```
use xfade_player::audio::resampler::LinearResampler;

let input_interleaved_f32 = vec![0.0f32; 2 * 441];
let rs = LinearResampler::new(44_100, 48_000, 2);
let output = rs.process(&input_interleaved_f32);
assert_eq!(output.len(), 2 * 480);
```
*/

use crate::models::DecodedBuffer;

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
    // source frames per output frame (src/dst)
    step: f64,
}

impl LinearResampler {
    /// - src_rate: decoded sample rate (Hz)
    /// - dst_rate: output graph sample rate (Hz)
    /// - channels: number of interleaved channels
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
        }
    }

    pub fn config(&self) -> (u32, u32, usize) {
        (self.src_rate, self.dst_rate, self.channels)
    }

    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    /// Number of output frames produced for `in_frames` source frames
    pub fn output_frames(&self, in_frames: usize) -> usize {
        if self.src_rate == 0 || self.dst_rate == 0 {
            return 0;
        }
        (in_frames as f64 * self.dst_rate as f64 / self.src_rate as f64).round() as usize
    }

    /// Resample interleaved samples from `src_rate` to `dst_rate`
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        if ch == 0 || self.src_rate == 0 || self.dst_rate == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }
        let out_frames = self.output_frames(in_frames);
        let last = in_frames - 1;
        let mut out = Vec::with_capacity(out_frames * ch);

        for j in 0..out_frames {
            let pos = j as f64 * self.step;
            let i = (pos.floor() as usize).min(last);
            let next = (i + 1).min(last);
            let frac = (pos - i as f64).clamp(0.0, 1.0) as f32;

            let base0 = i * ch;
            let base1 = next * ch;
            out.extend((0..ch).map(|c| {
                let s0 = input[base0 + c];
                let s1 = input[base1 + c];
                s0 + (s1 - s0) * frac
            }));
        }

        out
    }

    /// Resample a decoded buffer, keeping its channel layout
    pub fn process_buffer(&self, input: &DecodedBuffer) -> DecodedBuffer {
        let rs = if input.sample_rate != self.src_rate || input.channels as usize != self.channels {
            LinearResampler::new(input.sample_rate, self.dst_rate, input.channels as usize)
        } else {
            self.clone()
        };
        DecodedBuffer::new(rs.process(&input.samples), input.channels, self.dst_rate)
    }
}

/// Convert `buffer` to `dst_rate`, or return it unchanged when it already matches
pub fn resample_to(buffer: DecodedBuffer, dst_rate: u32) -> DecodedBuffer {
    if buffer.sample_rate == dst_rate || dst_rate == 0 {
        return buffer;
    }
    LinearResampler::new(buffer.sample_rate, dst_rate, buffer.channels as usize).process_buffer(&buffer)
}
