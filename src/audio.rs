use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fixed encoding contract with the backend: 16 kHz mono 16-bit LE PCM.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable input device, or the platform refused access to it.
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
    /// `start` was called while a capture was already running. Restarting
    /// silently would abandon the in-progress capture with no buffer ever
    /// finalized.
    #[error("already recording")]
    AlreadyRecording,
}

struct ActiveCapture {
    stream: cpal::Stream,
    buffer: Arc<Mutex<Vec<u8>>>,
}

/// The capture unit. Owns the microphone exclusively while recording; at
/// most one capture session exists at a time.
#[derive(Default)]
pub struct Recorder {
    active: Option<ActiveCapture>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Acquire the microphone and start accumulating encoded audio in
    /// arrival order. `device_name` of `None` means the host default input.
    pub fn start(&mut self, device_name: Option<&str>) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let host = cpal::default_host();
        let device = if let Some(name) = device_name {
            host.input_devices()
                .map_err(|e| {
                    CaptureError::DeviceUnavailable(format!("failed to list devices: {}", e))
                })?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("device '{}' not found", name))
                })?
        } else {
            host.default_input_device()
                .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into()))?
        };

        let device_label = device.name().unwrap_or_else(|_| "unknown".into());
        info!("using input device: {}", device_label);

        // Prefer capturing at the target rate; otherwise take the device
        // default and resample.
        let config = match try_config(&device, TARGET_SAMPLE_RATE) {
            Some(cfg) => cfg,
            None => {
                let default = device.default_input_config().map_err(|e| {
                    CaptureError::DeviceUnavailable(format!("no input config: {}", e))
                })?;
                warn!(
                    "{}Hz unavailable, capturing at {}Hz with resampling",
                    TARGET_SAMPLE_RATE,
                    default.sample_rate().0
                );
                StreamConfig {
                    channels: default.channels(),
                    sample_rate: default.sample_rate(),
                    buffer_size: cpal::BufferSize::Default,
                }
            }
        };

        let input_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        info!(
            "stream config: {}Hz, {}ch, target={}Hz",
            input_rate, channels, TARGET_SAMPLE_RATE
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let mut resampler = ResamplerState::default();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix_to_mono(data, channels);
                    let samples = if input_rate == TARGET_SAMPLE_RATE {
                        mono
                    } else {
                        resample_linear(&mono, input_rate, TARGET_SAMPLE_RATE, &mut resampler)
                    };
                    // Arrival order is the PCM byte order the backend decodes;
                    // fragments only ever append.
                    if let Ok(mut buf) = sink.lock() {
                        append_pcm16(&samples, &mut buf);
                    }
                },
                |err| {
                    error!("input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!("failed to build stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            CaptureError::DeviceUnavailable(format!("failed to start stream: {}", e))
        })?;

        self.active = Some(ActiveCapture { stream, buffer });
        Ok(())
    }

    /// Finalize the capture into one immutable buffer and release the
    /// device. Returns `None` when no capture is running (stop while idle
    /// is a no-op).
    pub fn stop(&mut self) -> Option<Vec<u8>> {
        let capture = self.active.take()?;
        // Dropping the stream stops the device callback and releases the
        // handle, regardless of what happens to the buffer afterwards.
        drop(capture.stream);
        let buffer = match capture.buffer.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        info!("capture finalized: {} bytes", buffer.len());
        Some(buffer)
    }
}

fn try_config(device: &cpal::Device, rate: u32) -> Option<StreamConfig> {
    let supported = device.supported_input_configs().ok()?;
    for range in supported {
        if range.channels() == 1
            && range.min_sample_rate().0 <= rate
            && range.max_sample_rate().0 >= rate
        {
            return Some(StreamConfig {
                channels: 1,
                sample_rate: SampleRate(rate),
                buffer_size: cpal::BufferSize::Default,
            });
        }
    }
    // Also accept stereo configs (we downmix).
    let supported = device.supported_input_configs().ok()?;
    for range in supported {
        if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
            return Some(StreamConfig {
                channels: range.channels(),
                sample_rate: SampleRate(rate),
                buffer_size: cpal::BufferSize::Default,
            });
        }
    }
    None
}

fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn append_pcm16(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &s in samples {
        let clamped = (s * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&clamped.to_le_bytes());
    }
}

#[derive(Default)]
struct ResamplerState {
    t: f64,
    last_sample: f32,
    has_last: bool,
}

fn resample_linear(
    samples: &[f32],
    input_rate: u32,
    target_rate: u32,
    state: &mut ResamplerState,
) -> Vec<f32> {
    if samples.is_empty() || input_rate == target_rate {
        return samples.to_vec();
    }
    let step = input_rate as f64 / target_rate as f64;
    let mut out = Vec::with_capacity(((samples.len() as f64 / step) + 2.0) as usize);

    let mut buf = Vec::with_capacity(samples.len() + 1);
    if state.has_last {
        buf.push(state.last_sample);
    }
    buf.extend_from_slice(samples);

    let mut i: usize = 0;
    let mut t = state.t;
    while i + 1 < buf.len() {
        let s0 = buf[i];
        let s1 = buf[i + 1];
        let v = s0 + (s1 - s0) * t as f32;
        out.push(v);
        t += step;
        while t >= 1.0 {
            t -= 1.0;
            i += 1;
            if i + 1 >= buf.len() {
                break;
            }
        }
        if i + 1 >= buf.len() {
            break;
        }
    }

    state.t = t;
    if let Some(last) = buf.last() {
        state.last_sample = *last;
        state.has_last = true;
    }
    out
}

/// List available input devices (name strings).
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let devices = match host.input_devices() {
        Ok(d) => d,
        Err(_) => return Vec::new(),
    };
    devices.filter_map(|d| d.name().ok()).collect()
}
