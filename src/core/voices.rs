//! Voice packs and voice resolution
//!
//! Voices are NPY files (`<name>.bin`) holding one `[N, 1, 256]` f32 style
//! table each. Row `i` is the style for an utterance of `i + 1` tokens.
//! A voice spec can blend packs: `af_bella(2)+af_sky(1)` is the weighted
//! sum with weights normalized to 1.

use crate::core::backend::STYLE_DIM;
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const VOICE_EXTENSION: &str = "bin";

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Voice '{name}' not found. Available voices: {}", .available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Invalid voice: {0}")]
    Invalid(String),

    #[error("Voice file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Voice file format error: {0}")]
    Format(String),
}

pub type VoiceResult<T> = Result<T, VoiceError>;

/// Style embedding table for one voice
#[derive(Debug, Clone)]
pub struct VoicePack {
    name: String,
    /// `[N, STYLE_DIM]`
    styles: Array2<f32>,
}

impl VoicePack {
    /// Build a pack from a `[N, 1, 256]` array as stored on disk
    pub fn from_array(name: impl Into<String>, data: Array3<f32>) -> VoiceResult<Self> {
        let name = name.into();
        let shape = data.shape();
        if shape[0] == 0 || shape[1] != 1 || shape[2] != STYLE_DIM {
            return Err(VoiceError::Format(format!(
                "voice '{name}' has shape {shape:?}, expected [N, 1, {STYLE_DIM}]"
            )));
        }
        let styles = data.index_axis_move(Axis(1), 0);
        Ok(Self { name, styles })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of token lengths covered
    pub fn len(&self) -> usize {
        self.styles.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Style row for an utterance of `token_count` tokens, clamped to the table
    pub fn style_for(&self, token_count: usize) -> Vec<f32> {
        let idx = token_count.saturating_sub(1).min(self.len() - 1);
        self.styles.row(idx).to_vec()
    }

    /// Serialize back to the on-disk `[N, 1, 256]` NPY layout
    pub fn to_npy_bytes(&self) -> VoiceResult<Vec<u8>> {
        let stored = self.styles.clone().insert_axis(Axis(1));
        let mut buf = Vec::new();
        stored
            .write_npy(&mut buf)
            .map_err(|e| VoiceError::Format(e.to_string()))?;
        Ok(buf)
    }

    fn weighted_sum(name: String, parts: &[(Arc<VoicePack>, f32)]) -> VoiceResult<Self> {
        let rows = parts.iter().map(|(pack, _)| pack.len()).min().unwrap_or(0);
        if rows == 0 {
            return Err(VoiceError::Invalid("no voices to combine".to_string()));
        }
        if parts.iter().any(|(pack, _)| pack.len() != rows) {
            tracing::warn!(
                "Combining voices of different lengths, truncating to {} rows",
                rows
            );
        }

        let mut styles = Array2::<f32>::zeros((rows, STYLE_DIM));
        for (pack, weight) in parts {
            let part = pack.styles.slice(ndarray::s![..rows, ..]);
            styles.scaled_add(*weight, &part);
        }
        Ok(Self { name, styles })
    }
}

/// A voice ready for synthesis
#[derive(Debug, Clone)]
pub struct ResolvedVoice {
    /// Voice string as requested, e.g. `af_bella+af_sky`
    pub name: String,
    pub pack: Arc<VoicePack>,
    /// Phonemizer language code
    pub language: String,
}

/// Parse `name`, `name(w)` and `a(w)+b(w)` specs into (name, weight) pairs
fn parse_voice_spec(spec: &str) -> VoiceResult<Vec<(String, f32)>> {
    let mut parts = Vec::new();
    for part in spec.split('+').map(str::trim).filter(|p| !p.is_empty()) {
        let parsed = match (part.find('('), part.rfind(')')) {
            (Some(open), Some(close)) if open < close => {
                let weight: f32 = part[open + 1..close].trim().parse().map_err(|_| {
                    VoiceError::Invalid(format!("bad weight in voice component '{part}'"))
                })?;
                (part[..open].trim().to_string(), weight)
            }
            _ => (part.to_string(), 1.0),
        };
        if parsed.0.is_empty() {
            return Err(VoiceError::Invalid(format!("empty voice name in '{spec}'")));
        }
        parts.push(parsed);
    }

    if parts.is_empty() {
        return Err(VoiceError::Invalid("voice must not be empty".to_string()));
    }
    Ok(parts)
}

/// Directory-backed voice store with an in-memory pack cache
pub struct VoiceStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<VoicePack>>>,
}

impl VoiceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted names of the voices on disk
    pub fn list_voices(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            tracing::warn!("Voices directory not readable: {}", self.dir.display());
            return Vec::new();
        };

        let mut voices: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == VOICE_EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        voices.sort();
        voices
    }

    /// Load a single base voice, caching the result
    pub fn load(&self, name: &str) -> VoiceResult<Arc<VoicePack>> {
        if let Some(pack) = self.cache.read().get(name) {
            return Ok(Arc::clone(pack));
        }

        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(VoiceError::Invalid(format!("invalid voice name '{name}'")));
        }

        let path = self.dir.join(format!("{name}.{VOICE_EXTENSION}"));
        if !path.is_file() {
            return Err(VoiceError::NotFound {
                name: name.to_string(),
                available: self.list_voices(),
            });
        }

        let reader = BufReader::new(File::open(&path)?);
        let data = Array3::<f32>::read_npy(reader)
            .map_err(|e| VoiceError::Format(format!("{}: {e}", path.display())))?;
        let pack = Arc::new(VoicePack::from_array(name, data)?);

        tracing::info!("Loaded voice '{}' ({} styles)", name, pack.len());
        self.cache
            .write()
            .insert(name.to_string(), Arc::clone(&pack));
        Ok(pack)
    }

    /// Resolve a possibly combined voice spec
    pub fn resolve(&self, spec: &str, lang_code: Option<&str>) -> VoiceResult<ResolvedVoice> {
        let spec = spec.trim();
        let pack = self.pack_for_spec(spec)?;

        let language = match lang_code.map(str::trim).filter(|l| !l.is_empty()) {
            Some(code) => code.to_lowercase(),
            None => spec
                .chars()
                .next()
                .map(|c| c.to_lowercase().to_string())
                .unwrap_or_else(|| "a".to_string()),
        };

        Ok(ResolvedVoice {
            name: spec.to_string(),
            pack,
            language,
        })
    }

    /// Combine voices and return the pack in NPY form
    pub fn combine(&self, spec: &str) -> VoiceResult<Vec<u8>> {
        self.pack_for_spec(spec.trim())?.to_npy_bytes()
    }

    fn pack_for_spec(&self, spec: &str) -> VoiceResult<Arc<VoicePack>> {
        let parts = parse_voice_spec(spec)?;
        if let [(name, _)] = parts.as_slice() {
            return self.load(name);
        }

        let total: f32 = parts.iter().map(|(_, w)| w).sum();
        if !(total > 0.0) {
            return Err(VoiceError::Invalid(format!(
                "voice weights in '{spec}' must sum to a positive value"
            )));
        }

        let mut weighted = Vec::with_capacity(parts.len());
        for (name, weight) in &parts {
            weighted.push((self.load(name)?, weight / total));
        }
        tracing::debug!(
            "Combining {} voices with weights {:?}",
            weighted.len(),
            weighted.iter().map(|(_, w)| *w).collect::<Vec<_>>()
        );

        Ok(Arc::new(VoicePack::weighted_sum(
            spec.to_string(),
            &weighted,
        )?))
    }
}
