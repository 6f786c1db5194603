use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use log::{error, info, warn};

use crate::audio::graph::AudioGraph;
use crate::audio::AudioOutput;
use crate::error::AudioError;

/// Names of every output device on the default host
pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

    let mut names = Vec::new();
    for device in devices {
        match device.name() {
            Ok(name) => names.push(name),
            Err(e) => warn!("Skipping output device without a name: {}", e),
        }
    }
    Ok(names)
}

/// Pick `preferred` when it exists, otherwise the host's default output
fn select_device(preferred: Option<&str>) -> Result<Device, AudioError> {
    let host = cpal::default_host();

    if let Some(name) = preferred {
        let found = host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false));
        match found {
            Some(device) => return Ok(device),
            None => warn!("Output device '{}' not found, falling back to default", name),
        }
    }

    host.default_output_device().ok_or_else(|| AudioError::DeviceNotFound {
        device: preferred.unwrap_or("default").to_string(),
    })
}

/// Real-time output through cpal
pub struct CpalOutput {
    device: Device,
    device_name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl CpalOutput {
    pub fn new(preferred_device: Option<&str>) -> Result<Self, AudioError> {
        let device = select_device(preferred_device)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;
        let sample_format = default_config.sample_format();
        let config: StreamConfig = default_config.into();

        info!(
            "Using output '{}' at {} Hz, {} channel(s), {:?}",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            device_name,
            config,
            sample_format,
            stream: None,
        })
    }

    fn build_stream<T>(&self, graph: AudioGraph) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + Send + 'static,
        T: cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if scratch.len() != data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    graph.render(&mut scratch);
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = cpal::Sample::from_sample(*sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
    }
}

impl AudioOutput for CpalOutput {
    fn name(&self) -> String {
        self.device_name.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn connect(&mut self, graph: AudioGraph) -> Result<(), AudioError> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(graph)?,
            SampleFormat::I16 => self.build_stream::<i16>(graph)?,
            SampleFormat::U16 => self.build_stream::<u16>(graph)?,
            other => {
                return Err(AudioError::UnsupportedSampleFormat {
                    format: format!("{:?}", other),
                });
            }
        };
        stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }
}

/// Headless output that renders only when pumped.
///
/// Used for `--dry-run` and tests: the graph clock advances exactly as far as
/// the caller asks.
#[derive(Debug)]
pub struct OfflineOutput {
    sample_rate: u32,
    channels: u16,
    graph: Option<AudioGraph>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            graph: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.graph.is_some()
    }
}

impl Default for OfflineOutput {
    fn default() -> Self {
        Self::new(48_000, 2)
    }
}

impl AudioOutput for OfflineOutput {
    fn name(&self) -> String {
        "offline".to_string()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn connect(&mut self, graph: AudioGraph) -> Result<(), AudioError> {
        self.graph = Some(graph);
        Ok(())
    }

    fn pump(&mut self, elapsed: Duration) {
        if let Some(graph) = &self.graph {
            graph.advance(elapsed.as_secs_f64());
        }
    }

    fn disconnect(&mut self) {
        self.graph = None;
    }
}
