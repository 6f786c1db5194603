//! The mixing graph shared between the controller and the output callback.
//!
//! Topology is fixed: every source has its own [`GainParam`], the summed
//! sources run through one [`EqChain`], then the master gain. The graph owns
//! the clock: `current_time` is frames rendered divided by the sample rate.

use crate::audio::eq::EqChain;
use crate::audio::fade::GainParam;
use crate::error::AudioError;
use crate::models::{DecodedBuffer, EqSettings};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to one playing voice in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

struct Voice {
    id: SourceId,
    buffer: Arc<DecodedBuffer>,
    frame: usize,
    gain: GainParam,
}

struct GraphCore {
    sample_rate: u32,
    channels: usize,
    frames_rendered: u64,
    next_id: u64,
    voices: Vec<Voice>,
    ended: Vec<SourceId>,
    eq: EqChain,
    master_gain: f32,
    mix: Vec<f32>,
}

impl GraphCore {
    fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn render(&mut self, out: &mut [f32]) {
        let channels = self.channels;
        let frames = out.len() / channels;

        for frame in 0..frames {
            let t = self.now();
            self.mix.iter_mut().for_each(|s| *s = 0.0);

            let mut i = 0;
            while i < self.voices.len() {
                let voice = &mut self.voices[i];
                let gain = voice.gain.value_at(t) as f32;
                for (ch, acc) in self.mix.iter_mut().enumerate() {
                    *acc += voice.buffer.sample(voice.frame, ch, channels) * gain;
                }
                voice.frame += 1;

                if voice.frame >= voice.buffer.frames {
                    let finished = self.voices.remove(i);
                    self.ended.push(finished.id);
                } else {
                    i += 1;
                }
            }

            let base = frame * channels;
            for ch in 0..channels {
                let shaped = self.eq.process_sample(ch, self.mix[ch]);
                out[base + ch] = shaped * self.master_gain;
            }
            self.frames_rendered += 1;
        }

        // Trailing partial frame, if any
        for sample in out[frames * channels..].iter_mut() {
            *sample = 0.0;
        }
    }
}

/// Cloneable handle to the shared mixing graph
#[derive(Clone)]
pub struct AudioGraph {
    inner: Arc<Mutex<GraphCore>>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, channels: u16, settings: &EqSettings) -> Self {
        let sample_rate = sample_rate.max(1);
        let channels = channels.max(1) as usize;
        let core = GraphCore {
            sample_rate,
            channels,
            frames_rendered: 0,
            next_id: 1,
            voices: Vec::new(),
            ended: Vec::new(),
            eq: EqChain::new(sample_rate, channels, settings),
            master_gain: sanitize_gain(settings.volume),
            mix: vec![0.0; channels],
        };
        Self {
            inner: Arc::new(Mutex::new(core)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GraphCore> {
        // A panic inside the output callback must not wedge the controller.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Audio clock in seconds
    pub fn current_time(&self) -> f64 {
        self.lock().now()
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.lock().channels as u16
    }

    /// Start a voice immediately at `offset_secs` into `buffer`
    pub fn start_source(&self, buffer: Arc<DecodedBuffer>, offset_secs: f64, gain: GainParam) -> SourceId {
        let mut core = self.lock();
        let id = SourceId(core.next_id);
        core.next_id += 1;

        let offset = offset_secs.max(0.0);
        let frame = ((offset * buffer.sample_rate as f64).round() as usize).min(buffer.frames);
        if frame >= buffer.frames {
            // Nothing left to play; report the end on the next drain.
            core.ended.push(id);
            return id;
        }

        core.voices.push(Voice {
            id,
            buffer,
            frame,
            gain,
        });
        id
    }

    /// Stop and disconnect a voice. Idempotent: returns false when the voice
    /// was already gone. Any pending end notice for it is dropped.
    pub fn stop_source(&self, id: SourceId) -> bool {
        let mut core = self.lock();
        core.ended.retain(|ended| *ended != id);
        let before = core.voices.len();
        core.voices.retain(|voice| voice.id != id);
        core.voices.len() != before
    }

    /// Run `f` against a voice's gain with the current clock time
    pub fn with_gain<F>(&self, id: SourceId, f: F) -> Result<(), AudioError>
    where
        F: FnOnce(&mut GainParam, f64),
    {
        let mut core = self.lock();
        let now = core.now();
        let voice = core
            .voices
            .iter_mut()
            .find(|voice| voice.id == id)
            .ok_or(AudioError::UnknownSource { id: id.0 })?;
        f(&mut voice.gain, now);
        Ok(())
    }

    /// Current gain of a voice, if it is still connected
    pub fn gain_of(&self, id: SourceId) -> Option<f64> {
        let core = self.lock();
        let now = core.now();
        core.voices
            .iter()
            .find(|voice| voice.id == id)
            .map(|voice| voice.gain.value_at(now))
    }

    pub fn is_active(&self, id: SourceId) -> bool {
        self.lock().voices.iter().any(|voice| voice.id == id)
    }

    /// Update EQ bands and master volume in place
    pub fn set_eq(&self, settings: &EqSettings) {
        let mut core = self.lock();
        core.eq.apply(settings);
        core.master_gain = sanitize_gain(settings.volume);
    }

    pub fn set_master_gain(&self, volume: f32) {
        self.lock().master_gain = sanitize_gain(volume);
    }

    pub fn master_gain(&self) -> f32 {
        self.lock().master_gain
    }

    /// Drain voices that reached their natural end since the last call
    pub fn take_ended(&self) -> Vec<SourceId> {
        std::mem::take(&mut self.lock().ended)
    }

    pub fn active_source_count(&self) -> usize {
        self.lock().voices.len()
    }

    /// Fill an interleaved output buffer and advance the clock
    pub fn render(&self, out: &mut [f32]) {
        self.lock().render(out);
    }

    /// Render and discard `seconds` of audio in 10 ms blocks
    pub fn advance(&self, seconds: f64) {
        let (sample_rate, channels) = {
            let core = self.lock();
            (core.sample_rate as f64, core.channels)
        };
        let total_frames = (seconds.max(0.0) * sample_rate).round() as usize;
        let block_frames = ((sample_rate / 100.0) as usize).max(1);
        let mut scratch = vec![0.0f32; block_frames * channels];

        let mut remaining = total_frames;
        while remaining > 0 {
            let frames = remaining.min(block_frames);
            self.render(&mut scratch[..frames * channels]);
            remaining -= frames;
        }
    }
}

impl fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.lock();
        f.debug_struct("AudioGraph")
            .field("sample_rate", &core.sample_rate)
            .field("channels", &core.channels)
            .field("time", &core.now())
            .field("voices", &core.voices.len())
            .finish()
    }
}

fn sanitize_gain(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
