use super::{AudioError, AudioResult};

/// Per-stream silence trimming and 16-bit scaling
///
/// The model pads every chunk with a little silence; trimming it from both
/// ends keeps the gaps between chunks short.
#[derive(Debug, Clone, Copy)]
pub struct AudioNormalizer {
    samples_to_trim: usize,
}

impl AudioNormalizer {
    pub fn new(gap_trim_ms: u32, sample_rate: u32) -> Self {
        let samples_to_trim = (u64::from(gap_trim_ms) * u64::from(sample_rate) / 1000) as usize;
        Self { samples_to_trim }
    }

    pub fn samples_to_trim(&self) -> usize {
        self.samples_to_trim
    }

    pub fn normalize(&self, samples: &[f32]) -> AudioResult<Vec<i16>> {
        if samples.is_empty() {
            return Err(AudioError::EmptyAudio);
        }

        let trim = self.samples_to_trim;
        let kept = if samples.len() > 2 * trim {
            &samples[trim..samples.len() - trim]
        } else {
            samples
        };

        Ok(kept
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_length_from_ms() {
        assert_eq!(AudioNormalizer::new(250, 24_000).samples_to_trim(), 6000);
        assert_eq!(AudioNormalizer::new(0, 24_000).samples_to_trim(), 0);
    }

    #[test]
    fn test_trims_both_ends() {
        let normalizer = AudioNormalizer::new(1, 2000);
        let samples = [0.0, 0.0, 0.5, 0.5, 0.0, 0.0];
        assert_eq!(normalizer.normalize(&samples).unwrap(), vec![16383, 16383]);
    }

    #[test]
    fn test_short_buffer_kept_whole() {
        let normalizer = AudioNormalizer::new(1, 2000);
        let samples = [0.5, 0.5, 0.5, 0.5];
        assert_eq!(normalizer.normalize(&samples).unwrap().len(), 4);
    }

    #[test]
    fn test_scaling_clips() {
        let normalizer = AudioNormalizer::new(0, 24_000);
        assert_eq!(
            normalizer.normalize(&[1.0, -1.0, 2.0, -2.0, 0.0]).unwrap(),
            vec![32767, -32767, 32767, -32768, 0]
        );
    }

    #[test]
    fn test_empty_is_error() {
        let normalizer = AudioNormalizer::new(250, 24_000);
        assert!(matches!(
            normalizer.normalize(&[]),
            Err(AudioError::EmptyAudio)
        ));
    }
}
