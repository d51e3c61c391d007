// Copyright 2025 Medicontent Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Morpheme counting for the SEO metrics.
//!
//! With the `ko-dic` feature, `TextMetrics::default()` counts with
//! `DictionaryKoreanAnalyzer`, which tokenizes against mecab-ko-dic through
//! lindera. `HeuristicKoreanAnalyzer` is the fallback: a Hangul word is a stem
//! followed by stacked particles, or by a verbal ending with its pre-final
//! endings. Latin and numeric runs count as one morpheme each and every
//! punctuation mark is its own symbol morpheme.

use std::sync::Arc;

use once_cell::sync::Lazy;

/// Counts morphemes in cleaned text
pub trait MorphemeAnalyzer: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn name(&self) -> &str;
}

/// Final verbal endings with the number of morphemes each spans
const ENDINGS: &[(&str, usize)] = &[
    ("했습니다", 3),
    ("습니다", 1),
    ("입니다", 2),
    ("합니다", 2),
    ("됩니다", 2),
    ("하세요", 2),
    ("십시오", 2),
    ("세요", 1),
    ("니다", 1),
    ("어요", 1),
    ("아요", 1),
    ("해요", 2),
    ("예요", 2),
    ("에요", 1),
    ("지만", 1),
    ("는데", 1),
    ("으며", 1),
    ("면서", 1),
    ("도록", 1),
    ("하는", 2),
    ("했다", 3),
    ("한다", 2),
    ("해서", 2),
    ("하며", 2),
    ("하고", 2),
    ("된", 2),
    ("한", 2),
    ("는", 1),
    ("다", 1),
    ("요", 1),
    ("며", 1),
    ("서", 1),
    ("고", 1),
];

/// Pre-final endings (tense, honorific) that sit between stem and ending
const PRE_FINAL: &[(&str, usize)] = &[
    ("으셨", 2),
    ("으시", 1),
    ("셨", 2),
    ("었", 1),
    ("았", 1),
    ("였", 1),
    ("겠", 1),
    ("시", 1),
];

const PARTICLES: &[&str] = &[
    "에게서", "까지", "부터", "에서", "에게", "으로", "처럼", "보다", "이나", "이랑", "은", "는",
    "이", "가", "을", "를", "에", "의", "와", "과", "도", "로", "만",
];

/// Single-syllable particles that may follow a one-syllable stem (저는, 나도)
const SHORT_STEM_PARTICLES: &[&str] = &["은", "는", "이", "가", "을", "를", "도"];

/// Case particles that never sit inside another particle
const OUTERMOST_PARTICLES: &[&str] = &["은", "는", "이", "가", "을", "를"];

const MAX_PRE_FINAL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Hangul,
    Latin,
    Digit,
    OtherLetter,
    Symbol,
    Space,
}

fn classify(ch: char) -> CharClass {
    match ch {
        '\u{AC00}'..='\u{D7A3}' => CharClass::Hangul,
        c if c.is_whitespace() => CharClass::Space,
        c if c.is_ascii_alphabetic() => CharClass::Latin,
        c if c.is_ascii_digit() => CharClass::Digit,
        c if c.is_alphanumeric() => CharClass::OtherLetter,
        _ => CharClass::Symbol,
    }
}

/// Rule-based stand-in for a Korean morphological analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicKoreanAnalyzer;

impl HeuristicKoreanAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Reads the word both as a predicate and as a noun phrase and keeps the
    /// finer split
    fn hangul_word(word: &str) -> usize {
        predicate_morphemes(word).max(noun_phrase_morphemes(word))
    }
}

/// Stem + pre-final endings + final ending
fn predicate_morphemes(word: &str) -> usize {
    let Some((mut rest, mut count)) = strip_weighted(word, ENDINGS) else {
        return 1;
    };
    for _ in 0..MAX_PRE_FINAL {
        match strip_weighted(rest, PRE_FINAL) {
            Some((stem, weight)) => {
                rest = stem;
                count += weight;
            }
            None => break,
        }
    }
    count + 1
}

/// Noun + up to two stacked particles (치과 + 에서 + 는)
fn noun_phrase_morphemes(word: &str) -> usize {
    let mut rest = word;
    let mut count = 1;
    for depth in 0..2 {
        let particle = PARTICLES
            .iter()
            .filter(|p| rest.len() > p.len() && rest.ends_with(**p))
            .filter(|p| depth == 0 || !OUTERMOST_PARTICLES.contains(*p))
            .filter(|p| {
                let stem_syllables = rest[..rest.len() - p.len()].chars().count();
                stem_syllables >= 2 || p.chars().count() > 1 || SHORT_STEM_PARTICLES.contains(*p)
            })
            .max_by_key(|p| p.len());
        match particle {
            Some(p) => {
                rest = &rest[..rest.len() - p.len()];
                count += 1;
            }
            None => break,
        }
    }
    count
}

/// Longest suffix from `candidates` that leaves a non-empty stem
fn strip_weighted<'a>(word: &'a str, candidates: &[(&str, usize)]) -> Option<(&'a str, usize)> {
    candidates
        .iter()
        .filter(|(suffix, _)| word.len() > suffix.len() && word.ends_with(*suffix))
        .max_by_key(|(suffix, _)| suffix.len())
        .map(|(suffix, weight)| (&word[..word.len() - suffix.len()], *weight))
}

impl MorphemeAnalyzer for HeuristicKoreanAnalyzer {
    fn count(&self, text: &str) -> usize {
        let mut total = 0;
        let mut run = String::new();
        let mut run_class = CharClass::Space;

        let mut flush = |run: &mut String, class: CharClass| {
            if run.is_empty() {
                return;
            }
            total += match class {
                CharClass::Hangul => Self::hangul_word(run),
                CharClass::Symbol => run.chars().count(),
                CharClass::Space => 0,
                _ => 1,
            };
            run.clear();
        };

        for ch in text.chars() {
            let class = classify(ch);
            if class != run_class {
                flush(&mut run, run_class);
                run_class = class;
            }
            if class != CharClass::Space {
                run.push(ch);
            }
        }
        flush(&mut run, run_class);

        total
    }

    fn name(&self) -> &str {
        "heuristic-ko"
    }
}

#[cfg(feature = "ko-dic")]
pub use dictionary::DictionaryKoreanAnalyzer;

#[cfg(feature = "ko-dic")]
mod dictionary {
    use std::sync::Mutex;

    use lindera::{DictionaryConfig, DictionaryKind, Mode, Tokenizer, TokenizerConfig};
    use tracing::warn;

    use super::{HeuristicKoreanAnalyzer, MorphemeAnalyzer};

    /// mecab-ko-dic tokenizer; whitespace tokens are not counted
    pub struct DictionaryKoreanAnalyzer {
        tokenizer: Mutex<Tokenizer>,
        fallback: HeuristicKoreanAnalyzer,
    }

    impl DictionaryKoreanAnalyzer {
        pub fn new() -> Result<Self, String> {
            let config = TokenizerConfig {
                dictionary: DictionaryConfig {
                    kind: Some(DictionaryKind::KoDic),
                    path: None,
                },
                user_dictionary: None,
                mode: Mode::Normal,
            };
            let tokenizer = Tokenizer::from_config(config).map_err(|e| e.to_string())?;
            Ok(Self {
                tokenizer: Mutex::new(tokenizer),
                fallback: HeuristicKoreanAnalyzer::new(),
            })
        }
    }

    impl MorphemeAnalyzer for DictionaryKoreanAnalyzer {
        fn count(&self, text: &str) -> usize {
            #[allow(unused_mut)]
            let Ok(mut tokenizer) = self.tokenizer.lock() else {
                return self.fallback.count(text);
            };
            match tokenizer.tokenize(text) {
                Ok(tokens) => tokens
                    .iter()
                    .filter(|token| !token.text.trim().is_empty())
                    .count(),
                Err(e) => {
                    warn!(error = %e, "ko-dic tokenization failed, using heuristic count");
                    self.fallback.count(text)
                }
            }
        }

        fn name(&self) -> &str {
            "lindera-ko-dic"
        }
    }
}

static DEFAULT_ANALYZER: Lazy<Arc<dyn MorphemeAnalyzer>> = Lazy::new(|| {
    #[cfg(feature = "ko-dic")]
    {
        match DictionaryKoreanAnalyzer::new() {
            Ok(analyzer) => return Arc::new(analyzer),
            Err(e) => {
                tracing::warn!(error = %e, "ko-dic dictionary unavailable, using heuristic analyzer")
            }
        }
    }
    Arc::new(HeuristicKoreanAnalyzer::new())
});

/// Shared dictionary analyzer when compiled in, otherwise the heuristic
pub fn default_analyzer() -> Arc<dyn MorphemeAnalyzer> {
    Arc::clone(&DEFAULT_ANALYZER)
}
