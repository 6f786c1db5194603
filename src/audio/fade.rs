//! Gain envelopes for crossfades.
//!
//! A [`GainParam`] behaves like an automatable gain: it holds a static value
//! and optionally one scheduled ramp that is evaluated against the audio
//! clock, so the envelope is sample-accurate no matter how often the control
//! side polls.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

/// Equal-power crossfade gain at `position` (0.0 to 1.0): `cos(position·π/2)`.
///
/// Returns 1.0 at the start and 0.0 at the end. The incoming side uses the
/// mirrored position, so the two gains always satisfy `out² + in² = 1`.
pub fn equal_power_crossfade(position: f64) -> f64 {
    (position.clamp(0.0, 1.0) * FRAC_PI_2).cos()
}

/// Shape of a crossfade envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FadeCurve {
    /// Gain changes at a constant rate; dips in loudness mid-transition
    Linear,
    /// Constant perceived loudness through the transition
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Gain of the outgoing source, 1.0 at `position == 0`
    pub fn fade_out(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::EqualPower => equal_power_crossfade(t),
        }
    }

    /// Gain of the incoming source, 0.0 at `position == 0`
    pub fn fade_in(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => equal_power_crossfade(1.0 - t),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::EqualPower => "equal-power",
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadeCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" | "lin" => Ok(FadeCurve::Linear),
            "equal-power" | "equalpower" | "equal_power" | "power" | "ep" => Ok(FadeCurve::EqualPower),
            other => Err(format!("unknown fade curve '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// A scheduled ramp on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub start: f64,
    pub duration: f64,
    pub curve: FadeCurve,
    pub direction: FadeDirection,
}

impl GainRamp {
    fn position(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    fn value_at(&self, now: f64) -> f64 {
        let t = self.position(now);
        match self.direction {
            FadeDirection::In => self.curve.fade_in(t),
            FadeDirection::Out => self.curve.fade_out(t),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration.max(0.0)
    }
}

/// An automatable gain value owned by one source
#[derive(Debug, Clone, PartialEq)]
pub struct GainParam {
    value: f64,
    ramp: Option<GainRamp>,
}

impl GainParam {
    pub fn new(value: f64) -> Self {
        Self { value, ramp: None }
    }

    /// Set the static value, dropping any scheduled ramp
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.ramp = None;
    }

    /// Cancel scheduled automation, freezing the gain where it is at `now`
    pub fn cancel_scheduled_values(&mut self, now: f64) {
        if self.ramp.is_some() {
            self.value = self.value_at(now);
            self.ramp = None;
        }
    }

    /// Schedule a ramp starting at `start` and lasting `duration` seconds
    pub fn schedule_fade(&mut self, start: f64, duration: f64, curve: FadeCurve, direction: FadeDirection) {
        self.ramp = Some(GainRamp {
            start,
            duration,
            curve,
            direction,
        });
    }

    pub fn ramp(&self) -> Option<&GainRamp> {
        self.ramp.as_ref()
    }

    /// Gain at time `now` on the audio clock
    pub fn value_at(&self, now: f64) -> f64 {
        match &self.ramp {
            Some(ramp) if now >= ramp.start => ramp.value_at(now),
            _ => self.value,
        }
    }
}

impl Default for GainParam {
    fn default() -> Self {
        Self::new(1.0)
    }
}
