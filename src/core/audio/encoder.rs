use super::{AudioError, AudioFormat, AudioResult};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// Size field value for a stream whose final length is unknown
const STREAMING_SIZE: u32 = 0xFFFF_FFFF;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;

/// 16-bit mono PCM WAV header
///
/// `data_len` is the size of the sample data in bytes. `None` writes the
/// streaming placeholder into both size fields.
pub fn wav_header(sample_rate: u32, data_len: Option<u32>) -> [u8; WAV_HEADER_LEN] {
    let (riff_size, data_size) = match data_len {
        Some(len) => (len.saturating_add(36), len),
        None => (STREAMING_SIZE, STREAMING_SIZE),
    };

    let mut header = BytesMut::with_capacity(WAV_HEADER_LEN);
    header.put_slice(b"RIFF");
    header.put_u32_le(riff_size);
    header.put_slice(b"WAVE");
    header.put_slice(b"fmt ");
    header.put_u32_le(16); // fmt chunk size
    header.put_u16_le(1); // PCM
    header.put_u16_le(1); // mono
    header.put_u32_le(sample_rate);
    header.put_u32_le(sample_rate * 2); // byte rate
    header.put_u16_le(2); // block align
    header.put_u16_le(16); // bits per sample
    header.put_slice(b"data");
    header.put_u32_le(data_size);

    let mut out = [0u8; WAV_HEADER_LEN];
    out.copy_from_slice(&header);
    out
}

/// RIFF and data chunk sizes for a WAV file of `total_len` bytes
pub(crate) fn wav_size_fields(total_len: u64) -> (u32, u32) {
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    (
        clamp(total_len.saturating_sub(8)),
        clamp(total_len.saturating_sub(WAV_HEADER_LEN as u64)),
    )
}

pub(crate) const fn wav_size_offsets() -> (usize, usize) {
    (RIFF_SIZE_OFFSET, DATA_SIZE_OFFSET)
}

/// Replace the size fields of a complete in-memory WAV file
///
/// Returns false when the buffer is too short to hold a header.
pub fn patch_wav_header(wav: &mut [u8]) -> bool {
    if wav.len() < WAV_HEADER_LEN || &wav[..4] != b"RIFF" {
        return false;
    }
    let (riff_size, data_size) = wav_size_fields(wav.len() as u64);
    wav[RIFF_SIZE_OFFSET..RIFF_SIZE_OFFSET + 4].copy_from_slice(&riff_size.to_le_bytes());
    wav[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4].copy_from_slice(&data_size.to_le_bytes());
    true
}

fn pcm_bytes(samples: &[i16]) -> BytesMut {
    let mut out = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.put_i16_le(sample);
    }
    out
}

/// Frames normalized samples for one output stream
#[derive(Debug)]
pub struct StreamingAudioEncoder {
    format: AudioFormat,
    sample_rate: u32,
    header_written: bool,
}

impl StreamingAudioEncoder {
    pub fn new(format: AudioFormat, sample_rate: u32) -> AudioResult<Self> {
        if !format.is_encodable() {
            return Err(AudioError::UnsupportedFormat(format.to_string()));
        }
        Ok(Self {
            format,
            sample_rate,
            header_written: false,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Encode one buffer; `is_first` marks the start of the stream
    pub fn encode(&mut self, samples: &[i16], is_first: bool) -> Bytes {
        let mut out = BytesMut::new();
        if self.format == AudioFormat::Wav && is_first && !self.header_written {
            out.put_slice(&wav_header(self.sample_rate, None));
            self.header_written = true;
        }
        out.unsplit(pcm_bytes(samples));
        out.freeze()
    }

    /// Trailer bytes closing the stream; WAV and PCM have none
    pub fn finish(&mut self) -> Bytes {
        Bytes::new()
    }
}

/// Encode a whole utterance with final sizes in the header
pub fn encode_complete(format: AudioFormat, sample_rate: u32, samples: &[i16]) -> AudioResult<Bytes> {
    let format = format.ensure_encodable()?;
    let pcm = pcm_bytes(samples);
    if format == AudioFormat::Pcm {
        return Ok(pcm.freeze());
    }

    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let mut out = BytesMut::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.put_slice(&wav_header(sample_rate, Some(data_len)));
    out.unsplit(pcm);
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_streaming_header_placeholders() {
        let mut encoder = StreamingAudioEncoder::new(AudioFormat::Wav, 24_000).unwrap();
        let first = encoder.encode(&[1, 2], true);
        assert_eq!(first.len(), WAV_HEADER_LEN + 4);
        assert_eq!(&first[..4], b"RIFF");
        assert_eq!(&first[8..12], b"WAVE");
        assert_eq!(&first[4..8], &[0xFF; 4]);
        assert_eq!(&first[40..44], &[0xFF; 4]);
        assert_eq!(u32::from_le_bytes(first[24..28].try_into().unwrap()), 24_000);

        let next = encoder.encode(&[3], false);
        assert_eq!(next.as_ref(), &3i16.to_le_bytes());
        assert!(encoder.finish().is_empty());
    }

    #[test]
    fn test_header_only_once() {
        let mut encoder = StreamingAudioEncoder::new(AudioFormat::Wav, 24_000).unwrap();
        encoder.encode(&[1], true);
        assert_eq!(encoder.encode(&[1], true).len(), 2);
    }

    #[test]
    fn test_pcm_is_raw() {
        let mut encoder = StreamingAudioEncoder::new(AudioFormat::Pcm, 24_000).unwrap();
        let out = encoder.encode(&[-1, 256], true);
        assert_eq!(out.as_ref(), &[0xFF, 0xFF, 0x00, 0x01]);
    }

    #[test]
    fn test_rejects_codec_formats() {
        assert!(StreamingAudioEncoder::new(AudioFormat::Mp3, 24_000).is_err());
    }

    #[test]
    fn test_complete_wav_readable() {
        let samples: Vec<i16> = (0..100).map(|i| i * 10).collect();
        let wav = encode_complete(AudioFormat::Wav, 24_000, &samples).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav.to_vec())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_patch_streamed_wav() {
        let mut encoder = StreamingAudioEncoder::new(AudioFormat::Wav, 24_000).unwrap();
        let mut wav = encoder.encode(&[5, 6, 7], true).to_vec();
        wav.extend_from_slice(&encoder.encode(&[8], false));

        assert!(patch_wav_header(&mut wav));
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 44);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_patch_rejects_short_buffer() {
        let mut short = vec![0u8; 10];
        assert!(!patch_wav_header(&mut short));
    }
}
