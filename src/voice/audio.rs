//! Transient audio blobs and the temp files that carry them between stages

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;

use crate::{Error, Result};

/// Sample rate for speech capture (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// Container format of an audio blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Wav,
    Webm,
    Ogg,
    Mp3,
    M4a,
}

impl AudioFormat {
    /// Guess the format from a `Content-Type` value, defaulting to WAV
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence {
            "audio/webm" | "video/webm" => Self::Webm,
            "audio/ogg" | "application/ogg" => Self::Ogg,
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Self::M4a,
            _ => Self::Wav,
        }
    }

    /// Guess the format from a file extension, defaulting to WAV
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("webm") => Self::Webm,
            Some("ogg" | "oga") => Self::Ogg,
            Some("mp3") => Self::Mp3,
            Some("m4a" | "mp4") => Self::M4a,
            _ => Self::Wav,
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
        }
    }

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
        }
    }
}

/// Raw recorded audio for one turn
#[derive(Debug, Clone, Default)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioBlob {
    #[must_use]
    pub const fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    /// WAV audio, the capture format
    #[must_use]
    pub const fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, AudioFormat::Wav)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the blob to a uniquely named file in `dir`
    ///
    /// The file is deleted when the returned path is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write_temp(&self, dir: &Path) -> Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("sommelier-input-")
            .suffix(&format!(".{}", self.format.extension()))
            .tempfile_in(dir)?;
        file.write_all(&self.bytes)?;
        file.flush()?;

        tracing::debug!(
            path = %file.path().display(),
            bytes = self.bytes.len(),
            "wrote input audio"
        );
        Ok(file.into_temp_path())
    }
}

/// Synthesized speech on disk
///
/// Dropping the handle deletes the file.
#[derive(Debug)]
pub struct SpeechFile {
    path: TempPath,
    format: AudioFormat,
}

impl SpeechFile {
    /// Wrap an existing temp path
    #[must_use]
    pub const fn new(path: TempPath, format: AudioFormat) -> Self {
        Self { path, format }
    }

    /// Write complete audio bytes to a fresh file in `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write_in(dir: &Path, bytes: &[u8], format: AudioFormat) -> Result<Self> {
        let mut file = reply_tempfile(dir, format)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self::new(file.into_temp_path(), format))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Read the audio bytes back for playback
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path()).await?)
    }

    /// Delete the file now, reporting failures
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be removed
    pub fn delete(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }
}

/// Create a uniquely named reply file in `dir`
pub(crate) fn reply_tempfile(dir: &Path, format: AudioFormat) -> Result<tempfile::NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix("sommelier-reply-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(dir)?)
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Input chunk size requested from the resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Resample mono audio with rubato's band-limited FFT resampler
///
/// The input is zero-padded to flush the filter, and the output is trimmed
/// to the resampler delay and the expected length.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let delay = resampler.output_delay();
    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();

    let mut output: Vec<f64> = Vec::with_capacity(expected + delay);
    let mut pos = 0;
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(input.len());
        let mut chunk = input.get(pos..end).map(<[f64]>::to_vec).unwrap_or_default();
        chunk.resize(needed, 0.0);
        pos += needed;

        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output
        .into_iter()
        .skip(delay)
        .take(expected)
        .map(|s| s as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn sine(frequency: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_resample_removes_tones_above_nyquist() {
        let input = sine(12_000.0, 48_000, 48_000);
        let output = resample(&input, 48_000, 16_000).unwrap();

        assert_eq!(output.len(), 16_000);
        // Skip edges where the zero padding rings
        let middle = &output[2_000..14_000];
        assert!(rms(middle) < 0.05, "12kHz tone leaked: rms {}", rms(middle));
    }

    #[test]
    fn test_resample_keeps_speech_band() {
        let input = sine(440.0, 48_000, 48_000);
        let output = resample(&input, 48_000, 16_000).unwrap();

        let level = rms(&output[2_000..14_000]);
        assert!((level - rms(&input)).abs() < 0.05, "440Hz level changed: {level}");
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        assert_eq!(resample(&[0.1, 0.2], 16_000, 16_000).unwrap(), [0.1, 0.2]);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(AudioFormat::from_mime("audio/webm;codecs=opus"), AudioFormat::Webm);
        assert_eq!(AudioFormat::from_mime("audio/ogg"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_mime("audio/wav"), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_mime("application/octet-stream"), AudioFormat::Wav);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("q.MP3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("q.m4a")), AudioFormat::M4a);
        assert_eq!(AudioFormat::from_path(Path::new("q")), AudioFormat::Wav);
    }

    #[test]
    fn test_write_temp_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let blob = AudioBlob::new(vec![1, 2, 3], AudioFormat::Webm);

        let path = blob.write_temp(dir.path()).unwrap();
        let on_disk = path.to_path_buf();
        assert!(on_disk.exists());
        assert_eq!(on_disk.extension().unwrap(), "webm");
        assert_eq!(std::fs::read(&on_disk).unwrap(), vec![1, 2, 3]);

        drop(path);
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_speech_file_read_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let speech = SpeechFile::write_in(dir.path(), b"ID3mp3", AudioFormat::Mp3).unwrap();
        let on_disk = speech.path().to_path_buf();

        assert!(on_disk.file_name().unwrap().to_string_lossy().starts_with("sommelier-reply-"));
        assert_eq!(speech.read().await.unwrap(), b"ID3mp3");

        speech.delete().unwrap();
        assert!(!on_disk.exists());
    }

    #[test]
    fn test_speech_files_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = SpeechFile::write_in(dir.path(), b"a", AudioFormat::Mp3).unwrap();
        let b = SpeechFile::write_in(dir.path(), b"b", AudioFormat::Mp3).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
