//! Text to phoneme conversion
//!
//! [`EspeakPhonemizer`] wraps eSpeak-NG (feature `kokoro-tts`) and rewrites
//! its IPA output into the symbol set the Kokoro vocabulary covers.
//! [`PassthroughPhonemizer`] hands text through untouched and is what the
//! server falls back to when eSpeak is unavailable.
//!
//! eSpeak-NG keeps global state and is not thread-safe, so every call into it
//! is serialized through a process-wide mutex.

use super::vocab::VOCAB;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "kokoro-tts")]
use parking_lot::Mutex;

/// Errors raised while phonemizing
#[derive(Debug, Error)]
pub enum PhonemizerError {
    #[error("eSpeak error: {0}")]
    Espeak(String),

    #[error("Unsupported language: {0}. Supported: 'a' (American English), 'b' (British English)")]
    UnsupportedLanguage(String),
}

/// Converts normalized text into a phoneme string
pub trait Phonemizer: Send + Sync {
    /// Phonemize `text` for the given language code (`a`, `b`, `en-us`, `en-gb`)
    ///
    /// Failures degrade to an empty string; the caller sees no tokens for
    /// that sentence rather than an aborted request.
    fn phonemize(&self, text: &str, language: &str) -> String;
}

/// Returns the input unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughPhonemizer;

impl Phonemizer for PassthroughPhonemizer {
    fn phonemize(&self, text: &str, _language: &str) -> String {
        text.to_string()
    }
}

#[cfg(feature = "kokoro-tts")]
static ESPEAK_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// eSpeak-NG backed phonemizer
#[cfg(feature = "kokoro-tts")]
#[derive(Debug)]
pub struct EspeakPhonemizer {
    _private: (),
}

#[cfg(feature = "kokoro-tts")]
impl EspeakPhonemizer {
    /// Probe eSpeak-NG with a test phrase
    ///
    /// Fails when the eSpeak-NG shared library or its data files are missing.
    pub fn new() -> Result<Self, PhonemizerError> {
        let _guard = ESPEAK_MUTEX.lock();
        espeak_rs::text_to_phonemes("test", "en-us", None, true, false).map_err(|e| {
            PhonemizerError::Espeak(format!(
                "{e}. Install with: apt-get install espeak-ng libespeak-ng-dev"
            ))
        })?;
        Ok(Self { _private: () })
    }

    pub fn try_phonemize(&self, text: &str, language: &str) -> Result<String, PhonemizerError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let espeak_lang = map_language_code(language)?;

        let raw = {
            let _guard = ESPEAK_MUTEX.lock();
            espeak_rs::text_to_phonemes(text, espeak_lang, None, true, false)
                .map_err(|e| PhonemizerError::Espeak(e.to_string()))?
                .join("")
        };

        Ok(postprocess_phonemes(&raw, language))
    }
}

#[cfg(feature = "kokoro-tts")]
impl Phonemizer for EspeakPhonemizer {
    fn phonemize(&self, text: &str, language: &str) -> String {
        match self.try_phonemize(text, language) {
            Ok(phonemes) => phonemes,
            Err(e) => {
                tracing::warn!("Phonemization failed: {}", e);
                String::new()
            }
        }
    }
}

/// Pick the best available phonemizer for this build
pub fn default_phonemizer() -> Arc<dyn Phonemizer> {
    #[cfg(feature = "kokoro-tts")]
    {
        match EspeakPhonemizer::new() {
            Ok(espeak) => {
                tracing::info!("Using eSpeak-NG phonemizer");
                return Arc::new(espeak);
            }
            Err(e) => {
                tracing::warn!("eSpeak-NG unavailable, falling back to passthrough: {}", e);
            }
        }
    }

    if !cfg!(feature = "kokoro-tts") {
        tracing::warn!("Built without kokoro-tts; text is tokenized without phonemization");
    }

    Arc::new(PassthroughPhonemizer)
}

/// Map a Kokoro language code to the eSpeak voice name
pub fn map_language_code(language: &str) -> Result<&'static str, PhonemizerError> {
    match language {
        "a" | "en-us" => Ok("en-us"),
        "b" | "en-gb" => Ok("en-gb"),
        _ => Err(PhonemizerError::UnsupportedLanguage(language.to_string())),
    }
}

static HUNDRED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-zɹː])(hˈʌndɹɪd)").unwrap());
static DETACHED_Z_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#" z([;:,.!?¡¿—…"«»“” ])"#).unwrap());
static TRAILING_Z_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" z$").unwrap());
static NINETY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"nˈaɪnti([^ː])").unwrap());
static NINETY_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"nˈaɪnti$").unwrap());

/// Rewrite raw eSpeak output into Kokoro's symbol set
pub fn postprocess_phonemes(phonemes: &str, language: &str) -> String {
    let mut result = phonemes
        .replace("kəkˈoːɹoʊ", "kˈoʊkəɹoʊ")
        .replace("kəkˈɔːɹəʊ", "kˈəʊkəɹəʊ")
        .replace('ʲ', "j")
        .replace('r', "ɹ")
        .replace('x', "k")
        .replace('ɬ', "l");

    result = HUNDRED_RE.replace_all(&result, "$1 $2").into_owned();
    result = DETACHED_Z_RE.replace_all(&result, "z$1").into_owned();
    result = TRAILING_Z_RE.replace_all(&result, "z").into_owned();

    if matches!(language, "a" | "en-us") {
        result = NINETY_RE.replace_all(&result, "nˈaɪndi$1").into_owned();
        result = NINETY_END_RE.replace_all(&result, "nˈaɪndi").into_owned();
    }

    result
        .chars()
        .filter(|c| VOCAB.contains_key(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_is_identity() {
        let p = PassthroughPhonemizer;
        assert_eq!(p.phonemize("Hello, world.", "a"), "Hello, world.");
    }

    #[test]
    fn test_postprocess_substitutions() {
        assert_eq!(postprocess_phonemes("red", "a"), "ɹed");
        assert_eq!(postprocess_phonemes("xa", "a"), "ka");
        assert_eq!(postprocess_phonemes("ɬamp", "a"), "lamp");
        assert_eq!(postprocess_phonemes("aʲe", "a"), "aje");
    }

    #[test]
    fn test_postprocess_kokoro_fix() {
        assert_eq!(postprocess_phonemes("kəkˈoːɹoʊ", "a"), "kˈoʊkəɹoʊ");
        assert_eq!(postprocess_phonemes("kəkˈɔːɹəʊ", "b"), "kˈəʊkəɹəʊ");
    }

    #[test]
    fn test_postprocess_hundred_spacing() {
        assert_eq!(postprocess_phonemes("tuːhˈʌndɹɪd", "a"), "tuː hˈʌndɹɪd");
    }

    #[test]
    fn test_postprocess_detached_z() {
        assert_eq!(postprocess_phonemes("hello z.", "a"), "helloz.");
        assert_eq!(postprocess_phonemes("hello z", "a"), "helloz");
    }

    #[test]
    fn test_ninety_only_for_american() {
        assert_eq!(postprocess_phonemes("nˈaɪnti", "a"), "nˈaɪndi");
        assert_eq!(postprocess_phonemes("nˈaɪnti", "b"), "nˈaɪnti");
        assert_eq!(postprocess_phonemes("nˈaɪntiː", "a"), "nˈaɪntiː");
    }

    #[test]
    fn test_postprocess_drops_unknown_symbols() {
        assert_eq!(postprocess_phonemes("hello€world", "a"), "hellowoɹld");
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(map_language_code("a").unwrap(), "en-us");
        assert_eq!(map_language_code("en-gb").unwrap(), "en-gb");
        let err = map_language_code("fr").unwrap_err();
        assert!(err.to_string().contains("fr"));
    }

    #[cfg(feature = "kokoro-tts")]
    #[test]
    fn test_espeak_phonemizes_when_installed() {
        let Ok(espeak) = EspeakPhonemizer::new() else {
            return;
        };
        assert!(!espeak.phonemize("hello world", "a").is_empty());
        assert!(espeak.phonemize("", "a").is_empty());
    }
}
