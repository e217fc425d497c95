//! Kokoro symbol vocabulary
//!
//! Maps every phoneme/text symbol the model understands to its token id.
//! Index 0 (`$`) is the padding symbol; anything outside the table has no id
//! and is dropped during tokenization.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Padding / boundary token id
pub const PAD_TOKEN: i64 = 0;

/// Symbols in id order: padding, punctuation, ASCII letters, IPA
const VOCAB_STRING: &str = concat!(
    "$",                                                                         // Padding
    ";:,.!?\u{00a1}\u{00bf}\u{2014}\u{2026}\"\u{00ab}\u{00bb}\u{201c}\u{201d} ", // Punctuation
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",                      // ASCII letters
    "\u{0251}\u{0250}\u{0252}\u{00e6}\u{0253}\u{0299}\u{03b2}\u{0254}\u{0255}",  // IPA: ɑɐɒæɓʙβɔɕ
    "\u{00e7}\u{0257}\u{0256}\u{00f0}\u{02a4}\u{0259}\u{0258}\u{025a}\u{025b}",  // IPA: çɗɖðʤəɘɚɛ
    "\u{025c}\u{025d}\u{025e}\u{025f}\u{0284}\u{0261}\u{0260}\u{0262}\u{029b}",  // IPA: ɜɝɞɟʄɡɠɢʛ
    "\u{0266}\u{0267}\u{0127}\u{0265}\u{029c}\u{0268}\u{026a}\u{029d}\u{026d}",  // IPA: ɦɧħɥʜɨɪʝɭ
    "\u{026c}\u{026b}\u{026e}\u{029f}\u{0271}\u{026f}\u{0270}\u{014b}\u{0273}",  // IPA: ɬɫɮʟɱɯɰŋɳ
    "\u{0272}\u{0274}\u{00f8}\u{0275}\u{0278}\u{03b8}\u{0153}\u{0276}\u{0298}",  // IPA: ɲɴøɵɸθœɶʘ
    "\u{0279}\u{027a}\u{027e}\u{027b}\u{0280}\u{0281}\u{027d}\u{0282}\u{0283}",  // IPA: ɹɺɾɻʀʁɽʂʃ
    "\u{0288}\u{02a7}\u{0289}\u{028a}\u{028b}\u{2c71}\u{028c}\u{0263}\u{0264}",  // IPA: ʈʧʉʊʋⱱʌɣɤ
    "\u{028d}\u{03c7}\u{028e}\u{028f}\u{0291}\u{0290}\u{0292}\u{0294}\u{02a1}",  // IPA: ʍχʎʏʑʐʒʔʡ
    "\u{0295}\u{02a2}\u{01c0}\u{01c1}\u{01c2}\u{01c3}\u{02c8}\u{02cc}\u{02d0}",  // IPA: ʕʢǀǁǂǃˈˌː
    "\u{02d1}\u{02bc}\u{02b4}\u{02b0}\u{02b1}\u{02b2}\u{02b7}\u{02e0}\u{02e4}",  // IPA: ˑʼʴʰʱʲʷˠˤ
    "\u{02de}\u{2193}\u{2191}\u{2192}\u{2197}\u{2198}\u{2019}\u{0329}\u{2019}",  // IPA: ˞↓↑→↗↘'̩'
    "\u{1d7b}"                                                                   // IPA: ᵻ
);

/// Symbol to token id
pub static VOCAB: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    VOCAB_STRING
        .chars()
        .enumerate()
        .map(|(idx, c)| (c, idx as i64))
        .collect()
});

/// Token id to symbol
pub static REVERSE_VOCAB: Lazy<HashMap<i64, char>> =
    Lazy::new(|| VOCAB.iter().map(|(&c, &idx)| (idx, c)).collect());

/// Look up the token id for a symbol
pub fn token_id(c: char) -> Option<i64> {
    VOCAB.get(&c).copied()
}

/// Render token ids back into their symbols, skipping unknown ids
pub fn detokenize(tokens: &[i64]) -> String {
    tokens
        .iter()
        .filter_map(|t| REVERSE_VOCAB.get(t))
        .collect()
}
