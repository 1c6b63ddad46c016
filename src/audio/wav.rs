//! Channel mixing and in-memory WAV encoding.

use std::io::Cursor;

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec`.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use dictation_relay::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// encode_wav
// ---------------------------------------------------------------------------

/// Encode mono `f32` samples as a 16-bit PCM WAV file held in memory.
///
/// Samples outside `[-1.0, 1.0]` are clipped.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clipped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clipped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(stereo_to_mono(&samples, 1), samples);
    }

    #[test]
    fn zero_channels_yields_nothing() {
        assert!(stereo_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let mono = stereo_to_mono(&[1.0, 1.0, 0.5], 2);
        assert_eq!(mono, vec![1.0]);
    }

    #[test]
    fn wav_has_riff_header_and_expected_length() {
        let bytes = encode_wav(&[0.0; 1600], 16_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample.
        assert_eq!(bytes.len(), 44 + 1600 * 2);
    }

    #[test]
    fn wav_decodes_back_with_clipping() {
        let bytes = encode_wav(&[0.0, 0.5, 2.0, -2.0], 48_000).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.spec().channels, 1);

        let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(decoded[0], 0);
        assert_eq!(decoded[1], (0.5 * i16::MAX as f32) as i16);
        assert_eq!(decoded[2], i16::MAX);
        assert_eq!(decoded[3], -i16::MAX);
    }
}
