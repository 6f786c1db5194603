//! Three-band equalizer: low shelf, peaking mid, high shelf.
//!
//! Coefficients follow the RBJ audio EQ cookbook; filtering uses Direct Form
//! II Transposed with per-channel state.

use crate::models::EqSettings;
use std::f64::consts::PI;

pub const BASS_FREQUENCY: f64 = 200.0;
pub const MID_FREQUENCY: f64 = 1000.0;
pub const MID_Q: f64 = 1.0;
pub const TREBLE_FREQUENCY: f64 = 3000.0;

pub const MIN_BAND_DB: f32 = -40.0;
pub const MAX_BAND_DB: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    LowShelf,
    Peaking,
    HighShelf,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    z1: f64,
    z2: f64,
}

/// One biquad stage with state for every output channel
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BandKind,
    frequency: f64,
    q: f64,
    gain_db: f64,
    sample_rate: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    state: Vec<ChannelState>,
}

impl Biquad {
    pub fn new(kind: BandKind, frequency: f64, q: f64, sample_rate: u32, channels: usize) -> Self {
        let mut filter = Self {
            kind,
            frequency,
            q,
            gain_db: 0.0,
            sample_rate: sample_rate.max(1) as f64,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: vec![ChannelState::default(); channels.max(1)],
        };
        filter.calculate_coefficients();
        filter
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    /// Change the band gain; takes effect on the next sample
    pub fn set_gain_db(&mut self, gain_db: f64) {
        if (self.gain_db - gain_db).abs() < f64::EPSILON {
            return;
        }
        self.gain_db = gain_db;
        self.calculate_coefficients();
    }

    fn calculate_coefficients(&mut self) {
        // Keep the center below Nyquist for low sample rates.
        let f0 = self.frequency.min(self.sample_rate * 0.45);
        let a = 10.0_f64.powf(self.gain_db / 40.0);
        let w0 = 2.0 * PI * f0 / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();

        let (b0, b1, b2, a0, a1, a2) = match self.kind {
            BandKind::Peaking => {
                let alpha = sin_w0 / (2.0 * self.q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            BandKind::LowShelf => {
                // Shelf slope S = 1
                let alpha = sin_w0 / 2.0 * std::f64::consts::SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            BandKind::HighShelf => {
                let alpha = sin_w0 / 2.0 * std::f64::consts::SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let idx = channel.min(self.state.len() - 1);
        let state = &mut self.state[idx];
        let x = x as f64;
        let y = self.b0 * x + state.z1;
        state.z1 = self.b1 * x - self.a1 * y + state.z2;
        state.z2 = self.b2 * x - self.a2 * y;
        if state.z1.abs() < 1e-15 {
            state.z1 = 0.0;
        }
        if state.z2.abs() < 1e-15 {
            state.z2 = 0.0;
        }
        y as f32
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = ChannelState::default());
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db_at(&self, frequency: f64) -> f64 {
        let w = 2.0 * PI * frequency / self.sample_rate;
        let (cos_w, sin_w) = (w.cos(), w.sin());
        let (cos_2w, sin_2w) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos_w + self.b2 * cos_2w;
        let num_im = -(self.b1 * sin_w + self.b2 * sin_2w);
        let den_re = 1.0 + self.a1 * cos_w + self.a2 * cos_2w;
        let den_im = -(self.a1 * sin_w + self.a2 * sin_2w);

        let num_mag = (num_re * num_re + num_im * num_im).sqrt();
        let den_mag = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num_mag / den_mag).log10()
    }
}

/// Bass, mid and treble stages applied in that order
#[derive(Debug, Clone)]
pub struct EqChain {
    bass: Biquad,
    mid: Biquad,
    treble: Biquad,
}

impl EqChain {
    pub fn new(sample_rate: u32, channels: usize, settings: &EqSettings) -> Self {
        let mut chain = Self {
            bass: Biquad::new(BandKind::LowShelf, BASS_FREQUENCY, MID_Q, sample_rate, channels),
            mid: Biquad::new(BandKind::Peaking, MID_FREQUENCY, MID_Q, sample_rate, channels),
            treble: Biquad::new(BandKind::HighShelf, TREBLE_FREQUENCY, MID_Q, sample_rate, channels),
        };
        chain.apply(settings);
        chain
    }

    pub fn apply(&mut self, settings: &EqSettings) {
        self.bass.set_gain_db(clamp_band(settings.bass_db));
        self.mid.set_gain_db(clamp_band(settings.mid_db));
        self.treble.set_gain_db(clamp_band(settings.treble_db));
    }

    /// True when every band is at 0 dB
    pub fn is_flat(&self) -> bool {
        self.bass.gain_db() == 0.0 && self.mid.gain_db() == 0.0 && self.treble.gain_db() == 0.0
    }

    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let y = self.bass.process_sample(channel, x);
        let y = self.mid.process_sample(channel, y);
        self.treble.process_sample(channel, y)
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }

    pub fn bands(&self) -> [&Biquad; 3] {
        [&self.bass, &self.mid, &self.treble]
    }
}

fn clamp_band(gain_db: f32) -> f64 {
    if gain_db.is_finite() {
        gain_db.clamp(MIN_BAND_DB, MAX_BAND_DB) as f64
    } else {
        0.0
    }
}
