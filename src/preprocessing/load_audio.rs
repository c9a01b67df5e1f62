use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::AudioError;

/// Read a WAV file, downmix it to mono and resample it to `target_sample_rate`.
pub fn load_mono_audio<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::Channels(spec.channels));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_sample_value = (2.0_f64.powi(spec.bits_per_sample as i32 - 1) - 1.0) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_sample_value))
                .collect::<Result<_, _>>()?
        }
    };

    // Average the channels of each frame into one sample
    let channels = spec.channels as usize;
    let mono: Vec<f64> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / channels as f64)
        .collect();

    if mono.is_empty() {
        return Err(AudioError::Empty);
    }

    if spec.sample_rate == target_sample_rate {
        return Ok(mono.into_iter().map(|s| s as f32).collect());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f64>::new(
        target_sample_rate as f64 / spec.sample_rate as f64,
        2.0,
        params,
        mono.len(),
        1,
    )?;
    let resampled = resampler.process(&[mono], None)?;

    Ok(resampled
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|s| s as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, spec: WavSpec, frames: usize) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let value = (i as f32 * 0.01).sin() * 0.5;
            for _ in 0..spec.channels {
                match spec.sample_format {
                    SampleFormat::Float => writer.write_sample(value).unwrap(),
                    SampleFormat::Int => writer.write_sample((value * i16::MAX as f32) as i16).unwrap(),
                }
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_native_rate_float_file_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        write_wav(&path, spec, 1000);

        let samples = load_mono_audio(&path, 22050).unwrap();
        assert_eq!(samples.len(), 1000);
        assert!((samples[10] - (0.1f32).sin() * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_int_file_is_downmixed_and_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, 8820);

        let samples = load_mono_audio(&path, 22050).unwrap();
        let expected = 4410.0;
        assert!((samples.len() as f32 - expected).abs() < expected * 0.05);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }
}
