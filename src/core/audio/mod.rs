//! Audio post-processing and container framing

mod encoder;
mod normalizer;

pub use encoder::{
    StreamingAudioEncoder, WAV_HEADER_LEN, encode_complete, patch_wav_header, wav_header,
};
pub(crate) use encoder::{wav_size_fields, wav_size_offsets};
pub use normalizer::AudioNormalizer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Empty audio data")]
    EmptyAudio,

    #[error("Unsupported audio format: {0}. Supported formats: wav, pcm")]
    UnsupportedFormat(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Response formats the OpenAI speech API names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
    Ogg,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
            AudioFormat::Ogg => "ogg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Pcm => "audio/pcm",
            AudioFormat::Ogg => "audio/ogg",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Whether this build can produce the format
    pub fn is_encodable(&self) -> bool {
        matches!(self, AudioFormat::Wav | AudioFormat::Pcm)
    }

    /// Reject formats that need a codec this build does not ship
    pub fn ensure_encodable(self) -> AudioResult<Self> {
        if self.is_encodable() {
            Ok(self)
        } else {
            Err(AudioError::UnsupportedFormat(self.to_string()))
        }
    }

    /// Format for a file extension, used when serving downloads
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "opus" => Ok(AudioFormat::Opus),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            "wav" => Ok(AudioFormat::Wav),
            "pcm" => Ok(AudioFormat::Pcm),
            "ogg" => Ok(AudioFormat::Ogg),
            other => Err(AudioError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(AudioFormat::Mp3.content_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Wav.content_type(), "audio/wav");
        assert_eq!(AudioFormat::Pcm.content_type(), "audio/pcm");
        assert_eq!(AudioFormat::Ogg.content_type(), "audio/ogg");
    }

    #[test]
    fn test_only_wav_and_pcm_encodable() {
        assert!(AudioFormat::Wav.ensure_encodable().is_ok());
        assert!(AudioFormat::Pcm.ensure_encodable().is_ok());
        for format in [
            AudioFormat::Mp3,
            AudioFormat::Opus,
            AudioFormat::Aac,
            AudioFormat::Flac,
            AudioFormat::Ogg,
        ] {
            assert!(matches!(
                format.ensure_encodable(),
                Err(AudioError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("mid".parse::<AudioFormat>().is_err());
        let format: AudioFormat = serde_json::from_str("\"opus\"").unwrap();
        assert_eq!(format, AudioFormat::Opus);
        assert_eq!(AudioFormat::from_extension("pcm"), Some(AudioFormat::Pcm));
    }
}
