//! Sound card output using cpal.
//!
//! `cpal::Stream` is `!Send`, so the stream lives on a dedicated thread for
//! the whole session and is driven through a command channel. Scheduled
//! buffers are resampled to the device rate with rubato and queued; the audio
//! callback plays them one after another and signals each completion when its
//! last frame has been rendered. Buffers are never mixed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::PlaybackError;
use crate::pcm::{DecodedAudio, SPEECH_SAMPLE_RATE};
use crate::playback::{AudioOutput, Completion, OutputState};

enum Command {
    Resume(oneshot::Sender<Result<(), String>>),
}

/// One scheduled buffer, already at the device rate.
struct Voice {
    samples: Vec<f32>,
    cursor: usize,
    done: Option<oneshot::Sender<()>>,
}

impl Voice {
    fn finished(&self) -> bool {
        self.cursor >= self.samples.len()
    }
}

type VoiceQueue = Arc<Mutex<VecDeque<Voice>>>;

/// Convert mono samples to the device rate.
fn resample(samples: Vec<f32>, input_rate: u32, output_rate: u32) -> Result<Vec<f32>, PlaybackError> {
    if input_rate == output_rate || samples.is_empty() {
        return Ok(samples);
    }
    debug!("Resampling {} frames from {}Hz to {}Hz", samples.len(), input_rate, output_rate);

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        samples.len(),
        1,
    )
    .map_err(|e| PlaybackError::OutputUnavailable(format!("Failed to create resampler: {e}")))?;

    let output = resampler
        .process(&[samples], None)
        .map_err(|e| PlaybackError::OutputUnavailable(format!("Resampling failed: {e}")))?;
    Ok(output.into_iter().next().unwrap_or_default())
}

/// Fill `data` from the front of the queue, moving on to the next buffer
/// when one ends.
fn render(queue: &mut VecDeque<Voice>, data: &mut [f32], channels: usize) {
    for frame in data.chunks_mut(channels.max(1)) {
        let mut value = 0.0;
        while let Some(voice) = queue.front_mut() {
            if let Some(&sample) = voice.samples.get(voice.cursor) {
                voice.cursor += 1;
                value = sample.clamp(-1.0, 1.0);
                break;
            }
            finish_front(queue);
        }
        frame.fill(value);
    }

    // Report a buffer as done as soon as its last frame went out
    while queue.front().is_some_and(Voice::finished) {
        finish_front(queue);
    }
}

fn finish_front(queue: &mut VecDeque<Voice>) {
    if let Some(mut voice) = queue.pop_front() {
        if let Some(done) = voice.done.take() {
            let _ = done.send(());
        }
    }
}

/// The system's sound card, opened once per session.
pub struct DeviceOutput {
    commands: Mutex<mpsc::Sender<Command>>,
    queue: VoiceQueue,
    suspended: AtomicBool,
    sample_rate: u32,
}

impl DeviceOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>, PlaybackError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| PlaybackError::OutputUnavailable(format!("Failed to enumerate devices: {e}")))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open the named device (or the default one) and start its stream thread.
    ///
    /// The stream is created paused; the first playback resumes it.
    pub fn open(device_name: Option<String>) -> Result<Arc<Self>, PlaybackError> {
        let queue: VoiceQueue = Arc::new(Mutex::new(VecDeque::new()));
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let callback_queue = queue.clone();
        std::thread::Builder::new()
            .name("speech-output".to_string())
            .spawn(move || {
                let stream = match build_stream(device_name, callback_queue) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Runs until the owning DeviceOutput is dropped
                while let Ok(command) = command_rx.recv() {
                    match command {
                        Command::Resume(reply) => {
                            let result = stream
                                .play()
                                .map_err(|e| format!("Failed to start stream: {e}"));
                            let _ = reply.send(result);
                        }
                    }
                }
                debug!("Audio output thread exiting");
            })
            .map_err(|e| PlaybackError::OutputUnavailable(format!("Failed to spawn output thread: {e}")))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| PlaybackError::OutputUnavailable("output thread exited".to_string()))?
            .map_err(PlaybackError::OutputUnavailable)?;

        Ok(Arc::new(Self {
            commands: Mutex::new(command_tx),
            queue,
            suspended: AtomicBool::new(true),
            sample_rate,
        }))
    }
}

fn pick_device(host: &cpal::Host, device_name: Option<String>) -> Result<Device, String> {
    if let Some(name) = device_name {
        let found = host
            .output_devices()
            .map_err(|e| format!("Failed to enumerate devices: {e}"))?
            .find(|d| d.name().ok().as_deref() == Some(name.as_str()));
        match found {
            Some(device) => {
                info!("Using requested audio device: {}", name);
                return Ok(device);
            }
            None => warn!("Requested device '{}' not found, falling back to default device", name),
        }
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| "No default output device found".to_string())?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Prefer an f32 config at the speech rate; otherwise take the device default.
fn pick_config(device: &Device) -> Result<StreamConfig, String> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| format!("Failed to get device configs: {e}"))?
        .find(|range| {
            range.sample_format() == SampleFormat::F32
                && range.min_sample_rate().0 <= SPEECH_SAMPLE_RATE
                && range.max_sample_rate().0 >= SPEECH_SAMPLE_RATE
        });
    if let Some(range) = supported {
        return Ok(range
            .with_sample_rate(cpal::SampleRate(SPEECH_SAMPLE_RATE))
            .config());
    }

    let default = device
        .default_output_config()
        .map_err(|e| format!("Failed to get default config: {e}"))?;
    if default.sample_format() != SampleFormat::F32 {
        return Err(format!(
            "Unsupported sample format: {:?}",
            default.sample_format()
        ));
    }
    Ok(default.config())
}

fn build_stream(
    device_name: Option<String>,
    queue: VoiceQueue,
) -> Result<(cpal::Stream, u32), String> {
    let host = cpal::default_host();
    let device = pick_device(&host, device_name)?;
    let config = pick_config(&device)?;
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    debug!(
        "Audio config: sample_rate={}, channels={}",
        sample_rate, channels
    );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match queue.lock() {
                Ok(mut queue) => render(&mut queue, data, channels),
                Err(_) => data.fill(0.0),
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build stream: {e}"))?;

    // Some backends start streams immediately; hold it until the first resume.
    if let Err(e) = stream.pause() {
        debug!("Stream could not be paused after creation: {}", e);
    }

    Ok((stream, sample_rate))
}

#[async_trait]
impl AudioOutput for DeviceOutput {
    fn state(&self) -> OutputState {
        if self.suspended.load(Ordering::SeqCst) {
            OutputState::Suspended
        } else {
            OutputState::Running
        }
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .lock()
            .map_err(|_| PlaybackError::OutputUnavailable("output command lock poisoned".to_string()))?
            .send(Command::Resume(reply_tx))
            .map_err(|_| PlaybackError::OutputUnavailable("output thread exited".to_string()))?;

        reply_rx
            .await
            .map_err(|_| PlaybackError::OutputUnavailable("output thread exited".to_string()))?
            .map_err(PlaybackError::OutputUnavailable)?;

        self.suspended.store(false, Ordering::SeqCst);
        info!("Audio output resumed at {} Hz", self.sample_rate);
        Ok(())
    }

    fn schedule(&self, audio: DecodedAudio) -> Result<Completion, PlaybackError> {
        let (done_tx, done_rx) = oneshot::channel();
        if audio.is_empty() {
            let _ = done_tx.send(());
            return Ok(done_rx);
        }

        let samples = resample(audio.to_mono(), audio.sample_rate(), self.sample_rate)?;
        let voice = Voice {
            samples,
            cursor: 0,
            done: Some(done_tx),
        };
        self.queue
            .lock()
            .map_err(|_| PlaybackError::OutputUnavailable("voice queue lock poisoned".to_string()))?
            .push_back(voice);
        Ok(done_rx)
    }
}
