// Microphone capture and speaker playback for the UDP engine
//
// cpal streams are not Send on every platform, so they are opened and owned
// by a dedicated thread that lives until the session stops.

use std::net::UdpSocket;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{error, info, warn};

use super::codec::VoiceEncoder;
use super::status::{self, StatusCode};
use super::udp::{EngineConfig, Shared};

/// How long start() waits for the audio thread to open its devices
const AUDIO_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while the audio thread waits for stop
const AUDIO_IDLE_POLL: Duration = Duration::from_millis(100);

struct AudioStreams {
    _input: Stream,
    _output: Stream,
}

/// Spawn the audio thread and wait until its streams are playing
pub(crate) fn spawn(
    config: &EngineConfig,
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
) -> Result<JoinHandle<()>, StatusCode> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let config = config.clone();

    let worker = thread::Builder::new()
        .name("voice-audio".to_string())
        .spawn(move || {
            let streams = match open_streams(&config, socket, Arc::clone(&shared)) {
                Ok(streams) => {
                    let _ = ready_tx.send(status::SUCCESS);
                    streams
                }
                Err(code) => {
                    let _ = ready_tx.send(code);
                    return;
                }
            };

            while shared.running.load(Ordering::SeqCst) {
                thread::park_timeout(AUDIO_IDLE_POLL);
            }

            drop(streams);
            info!("Audio streams closed");
        })
        .map_err(|e| {
            error!("Failed to spawn audio thread: {}", e);
            status::WORKER_SPAWN_FAILED
        })?;

    match ready_rx.recv_timeout(AUDIO_OPEN_TIMEOUT) {
        Ok(status::SUCCESS) => Ok(worker),
        Ok(code) => {
            let _ = worker.join();
            Err(code)
        }
        Err(_) => {
            // The thread exits on its own once running is cleared
            error!("Audio devices did not open within {:?}", AUDIO_OPEN_TIMEOUT);
            Err(status::INPUT_STREAM_FAILED)
        }
    }
}

fn find_device(
    devices: Option<impl Iterator<Item = Device>>,
    name: Option<&str>,
    default: Option<Device>,
) -> Option<Device> {
    let Some(name) = name else {
        return default;
    };

    devices
        .and_then(|mut devices| {
            devices.find(|d| d.description().is_ok_and(|desc| desc.name() == name))
        })
        .or_else(|| {
            warn!("Audio device {:?} not found, using default", name);
            default
        })
}

fn device_name(device: &Device) -> String {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .unwrap_or_default()
}

fn supports_voice_format(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
    sample_rate: u32,
) -> bool {
    configs.into_iter().any(|c| {
        c.channels() == 1
            && c.min_sample_rate() <= sample_rate
            && c.max_sample_rate() >= sample_rate
            && c.sample_format() == SampleFormat::F32
    })
}

fn open_streams(
    config: &EngineConfig,
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
) -> Result<AudioStreams, StatusCode> {
    let host = cpal::default_host();

    let input_device = find_device(
        host.input_devices().ok(),
        config.input_device.as_deref(),
        host.default_input_device(),
    )
    .ok_or_else(|| {
        error!("No input device available");
        status::NO_INPUT_DEVICE
    })?;
    info!("Using input device: {:?}", device_name(&input_device));

    let output_device = find_device(
        host.output_devices().ok(),
        config.output_device.as_deref(),
        host.default_output_device(),
    )
    .ok_or_else(|| {
        error!("No output device available");
        status::NO_OUTPUT_DEVICE
    })?;
    info!("Using output device: {:?}", device_name(&output_device));

    let input_configs = input_device.supported_input_configs().map_err(|e| {
        error!("Failed to get input configs: {}", e);
        status::INPUT_STREAM_FAILED
    })?;
    if !supports_voice_format(input_configs, config.sample_rate) {
        error!("Input device does not support required configuration");
        return Err(status::UNSUPPORTED_SAMPLE_FORMAT);
    }

    let output_configs = output_device.supported_output_configs().map_err(|e| {
        error!("Failed to get output configs: {}", e);
        status::OUTPUT_STREAM_FAILED
    })?;
    if !supports_voice_format(output_configs, config.sample_rate) {
        error!("Output device does not support required configuration");
        return Err(status::UNSUPPORTED_SAMPLE_FORMAT);
    }

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: config.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let input = build_capture_stream(&input_device, &stream_config, config, socket, Arc::clone(&shared))?;
    input.play().map_err(|e| {
        error!("Failed to play input stream: {}", e);
        status::INPUT_STREAM_FAILED
    })?;

    let output = build_playback_stream(&output_device, &stream_config, shared)?;
    output.play().map_err(|e| {
        error!("Failed to play output stream: {}", e);
        status::OUTPUT_STREAM_FAILED
    })?;

    Ok(AudioStreams {
        _input: input,
        _output: output,
    })
}

fn build_capture_stream(
    device: &Device,
    stream_config: &StreamConfig,
    config: &EngineConfig,
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
) -> Result<Stream, StatusCode> {
    let mut applied_bitrate = shared.bitrate.load(Ordering::Relaxed);
    let mut encoder = VoiceEncoder::new(config.sample_rate, applied_bitrate).map_err(|e| {
        error!("{}", e);
        status::ENCODER_INIT_FAILED
    })?;

    let frame_size = config.frame_size;
    let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 4);

    device
        .build_input_stream(
            stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !shared.running.load(Ordering::SeqCst) {
                    return;
                }

                // Never send audio captured before the key was pressed
                if !shared.transmitting.load(Ordering::SeqCst) {
                    pending.clear();
                    return;
                }

                let wanted = shared.bitrate.load(Ordering::Relaxed);
                if wanted != applied_bitrate {
                    match encoder.set_bitrate(wanted) {
                        Ok(()) => applied_bitrate = wanted,
                        Err(e) => warn!("{}", e),
                    }
                }

                pending.extend_from_slice(data);

                while pending.len() >= frame_size {
                    let frame: Vec<f32> = pending.drain(..frame_size).collect();

                    match encoder.encode(&frame) {
                        // One-byte packets are indistinguishable from keep-alives
                        Ok(packet) if packet.len() > 1 => match socket.send(&packet) {
                            Ok(_) => {
                                shared.packets_sent.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => warn!("Send error: {}", e),
                        },
                        Ok(_) => {}
                        Err(e) => warn!("Encoding error: {}", e),
                    }
                }
            },
            |err| error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| {
            error!("Failed to build input stream: {}", e);
            status::INPUT_STREAM_FAILED
        })
}

fn build_playback_stream(
    device: &Device,
    stream_config: &StreamConfig,
    shared: Arc<Shared>,
) -> Result<Stream, StatusCode> {
    device
        .build_output_stream(
            stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut buffer) = shared.playback.lock() else {
                    data.fill(0.0);
                    return;
                };

                for sample in data.iter_mut() {
                    *sample = buffer.pop_front().unwrap_or(0.0);
                }
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| {
            error!("Failed to build output stream: {}", e);
            status::OUTPUT_STREAM_FAILED
        })
}
