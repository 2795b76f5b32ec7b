//! Microphone capture for the terminal chat
//!
//! Records from the default input device at whatever rate and channel count it
//! offers, keeping a mono buffer. [`AudioCapture::finish`] resamples to 16kHz
//! and encodes WAV for transcription.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use super::{AudioBlob, SAMPLE_RATE, resample, samples_to_wav};
use crate::{Error, Result};

/// Records one utterance from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// Prefers an `f32` configuration that can run at 16kHz; otherwise takes
    /// the device's highest `f32` rate and resamples afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if no input device or `f32` configuration is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let mut candidates: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .collect();
        candidates.sort_by_key(cpal::SupportedStreamConfigRange::channels);

        let target = SampleRate(SAMPLE_RATE);
        let config = candidates
            .iter()
            .find(|c| c.min_sample_rate() <= target && c.max_sample_rate() >= target)
            .map(|c| c.clone().with_sample_rate(target))
            .or_else(|| candidates.first().map(|c| c.clone().with_max_sample_rate()))
            .ok_or_else(|| Error::Audio("input device has no f32 configuration".to_string()))?
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start recording into the internal buffer
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let channels = usize::from(self.config.channels.max(1));

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(downmix(data, channels));
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("recording started");
        Ok(())
    }

    /// Stop recording
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("recording stopped");
        }
    }

    /// Take the mono samples recorded so far, clearing the buffer
    ///
    /// Samples are at the device rate, not resampled.
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Stop recording and encode everything captured as a 16kHz WAV blob
    ///
    /// Returns an empty blob if nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns error if resampling or WAV encoding fails
    pub fn finish(&mut self) -> Result<AudioBlob> {
        self.stop();
        let samples = self.take_buffer();
        if samples.is_empty() {
            return Ok(AudioBlob::default());
        }

        let samples = resample(&samples, self.config.sample_rate.0, SAMPLE_RATE)?;
        tracing::debug!(samples = samples.len(), "captured utterance");
        Ok(AudioBlob::wav(samples_to_wav(&samples, SAMPLE_RATE)?))
    }
}

/// Average interleaved frames down to one channel
#[allow(clippy::cast_precision_loss)]
fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
}
