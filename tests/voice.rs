//! Voice pipeline integration tests
//!
//! Tests audio handling without requiring audio hardware

use std::io::Cursor;

use sommelier::voice::{AudioBlob, AudioFormat, SAMPLE_RATE, SpeechFile, samples_to_wav};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_samples_to_wav_header() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    // 44-byte header plus 16-bit mono samples
    assert_eq!(wav.len(), 44 + samples.len() * 2);
}

#[test]
fn test_samples_to_wav_roundtrip_through_hound() {
    let samples = generate_sine_samples(440.0, 0.05, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_samples_to_wav_clamps() {
    let wav = samples_to_wav(&[2.0, -2.0], SAMPLE_RATE).unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();

    assert_eq!(decoded, [i16::MAX, i16::MIN]);
}

#[test]
fn test_input_audio_removed_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let blob = AudioBlob::new(vec![1, 2, 3], AudioFormat::Webm);

    let path = blob.write_temp(dir.path()).unwrap();
    assert_eq!(path.extension().unwrap(), "webm");
    assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 3]);

    let kept = path.to_path_buf();
    path.close().unwrap();
    assert!(!kept.exists());
}

#[test]
fn test_speech_file_read_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let speech = SpeechFile::write_in(dir.path(), b"ID3", AudioFormat::Mp3).unwrap();

    assert_eq!(speech.path().extension().unwrap(), "mp3");
    let bytes = tokio_test::block_on(speech.read()).unwrap();
    assert_eq!(bytes, b"ID3");

    let path = speech.path().to_path_buf();
    speech.delete().unwrap();
    assert!(!path.exists());
}
