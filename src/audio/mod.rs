pub mod cache;
pub mod crossfade;
pub mod decoder;
pub mod device;
pub mod engine;
pub mod eq;
pub mod fade;
pub mod graph;
pub mod position;
pub mod resampler;
pub mod scheduler;

#[cfg(test)]
pub mod tests;

use std::time::Duration;

use crate::error::{AudioError, DecodeError};
use crate::models::DecodedBuffer;

pub use cache::BufferCache;
pub use decoder::SymphoniaDecoder;
pub use device::{list_output_devices, CpalOutput, OfflineOutput};
pub use engine::{EngineSettings, PlaybackSession, PlayerEngine, PlayerEvent};
pub use fade::{equal_power_crossfade, FadeCurve, GainParam};
pub use graph::{AudioGraph, SourceId};
pub use position::PositionTracker;
pub use resampler::LinearResampler;
pub use scheduler::{Scheduler, TaskKind};

/// Turns encoded bytes into PCM
pub trait AudioDecoder: Send {
    /// Decode a complete file. `hint` is the file extension, if known.
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<DecodedBuffer, DecodeError>;
}

/// A sink the audio graph renders into
pub trait AudioOutput {
    /// Human-readable device name
    fn name(&self) -> String;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Start pulling audio from `graph`
    fn connect(&mut self, graph: AudioGraph) -> Result<(), AudioError>;

    /// Advance offline outputs by `elapsed`; real-time outputs ignore it
    fn pump(&mut self, _elapsed: Duration) {}

    /// Stop pulling audio
    fn disconnect(&mut self) {}
}
