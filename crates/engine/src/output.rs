// cpal output stream fed from the playback queue
// The stream is !Send: it must be created and dropped on the worker thread

use crate::queue::PlaybackQueue;
use crate::EngineShared;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use parking_lot::Mutex;
use reel_core::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Device-side format chosen for the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct AudioOutput {
    // Held for its lifetime; dropping it stops the device callback
    _stream: Stream,
    pub queue: Arc<Mutex<PlaybackQueue>>,
    pub format: OutputFormat,
}

fn default_format() -> Result<(cpal::Device, cpal::StreamConfig, OutputFormat)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("No output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::Device(format!("No default output config: {}", e)))?;
    if supported.sample_format() != SampleFormat::F32 {
        log::warn!(
            "Device prefers {:?} samples, requesting f32 anyway",
            supported.sample_format()
        );
    }

    let config: cpal::StreamConfig = supported.config();
    let format = OutputFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    Ok((device, config, format))
}

/// Open the default device with a queue holding up to `capacity` of audio
/// in the device's format, and start pulling from it.
pub fn open(shared: Arc<EngineShared>, capacity: Duration) -> Result<AudioOutput> {
    let (device, config, format) = default_format()?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let queue = Arc::new(Mutex::new(PlaybackQueue::new(
        format.channels,
        format.sample_rate,
        capacity,
    )));
    let device_queue = queue.clone();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !shared.is_rendering() {
                    data.fill(0.0);
                    return;
                }

                let written = device_queue
                    .lock()
                    .read(data, shared.speed(), shared.pitch());
                if written < data.len() {
                    data[written..].fill(0.0);
                    if !shared.draining.load(Ordering::Acquire) {
                        shared.underruns.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)))?;

    log::info!(
        "Audio output on {}: {} Hz, {} channels",
        device_name,
        format.sample_rate,
        format.channels
    );
    Ok(AudioOutput {
        _stream: stream,
        queue,
        format,
    })
}
