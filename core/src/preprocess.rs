//! Query tokenization, spelling correction and synonym expansion.
//!
//! Each token runs through the correction stages in order and stops at the
//! first that produces a term:
//!
//! 1. exact vocabulary hit;
//! 2. known-typo table, if its correction is in the vocabulary;
//! 3. prefix completion inside the token's own block;
//! 4. bounded edit-distance search over the token's block and every block
//!    whose key differs from it in one of the first three characters.
//!
//! Stage 4 is deliberately not a full vocabulary scan. A typo past the third
//! character is found; a typo inside the block key is found only when the
//! rest of the key is intact.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::RankerConfig;
use crate::dictionary::{block_key, TermDictionary, BLOCK_KEY_LEN};
use crate::edit_distance::distance_within;
use crate::index::InvertedIndex;
use crate::lexicon::Lexicon;
use crate::tokenizer::query_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStage {
    Exact,
    KnownTypo,
    PrefixCompletion,
    EditDistance,
    Unresolved,
}

/// Outcome of correcting one query token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    /// `None` when nothing matched and the token was kept as typed.
    pub distance: Option<usize>,
    pub stage: CorrectionStage,
}

impl Correction {
    fn new(original: &str, corrected: &str, distance: Option<usize>, stage: CorrectionStage) -> Self {
        Self { original: original.to_string(), corrected: corrected.to_string(), distance, stage }
    }

    pub fn is_exact(&self) -> bool {
        self.stage == CorrectionStage::Exact
    }
}

/// A query ready for retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedQuery {
    /// Corrected terms plus any synonyms, deduplicated, in first-seen order.
    pub terms: Vec<String>,
    /// Non-exact corrections only.
    pub corrections: Vec<Correction>,
    pub expanded: bool,
}

impl PreparedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub struct QueryPreprocessor<'a> {
    dictionary: &'a TermDictionary,
    index: &'a InvertedIndex,
    lexicon: &'a Lexicon,
    config: &'a RankerConfig,
}

const ALPHABET: std::ops::RangeInclusive<char> = 'a'..='z';

impl<'a> QueryPreprocessor<'a> {
    pub fn new(
        dictionary: &'a TermDictionary,
        index: &'a InvertedIndex,
        lexicon: &'a Lexicon,
        config: &'a RankerConfig,
    ) -> Self {
        Self { dictionary, index, lexicon, config }
    }

    pub fn preprocess(&self, query: &str) -> PreparedQuery {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return PreparedQuery::default();
        }

        let mut corrected = Vec::with_capacity(tokens.len());
        let mut corrections = Vec::new();
        for token in &tokens {
            let correction = self.correct(token);
            corrected.push(correction.corrected.clone());
            if !correction.is_exact() {
                tracing::debug!(from = %correction.original, to = %correction.corrected, stage = ?correction.stage, "corrected query token");
                corrections.push(correction);
            }
        }

        let confident = corrections
            .iter()
            .all(|c| c.distance.is_some_and(|d| d < self.config.expansion_max_distance));
        let terms = if confident { self.expand(&corrected) } else { dedup(corrected) };
        PreparedQuery { terms, corrections, expanded: confident }
    }

    /// Correct a single lower-cased token.
    pub fn correct(&self, token: &str) -> Correction {
        if self.dictionary.contains(token) {
            return Correction::new(token, token, Some(0), CorrectionStage::Exact);
        }
        if let Some(fixed) = self.lexicon.correction_for(token) {
            if self.dictionary.contains(fixed) {
                return Correction::new(token, fixed, Some(1), CorrectionStage::KnownTypo);
            }
        }
        if let Some((term, d)) = self.complete_prefix(token) {
            return Correction::new(token, term, Some(d), CorrectionStage::PrefixCompletion);
        }
        if let Some((term, d)) = self.nearest_term(token) {
            return Correction::new(token, term, Some(d), CorrectionStage::EditDistance);
        }
        Correction::new(token, token, None, CorrectionStage::Unresolved)
    }

    /// Most frequent block term that extends `token` by at most
    /// `max_prefix_extension` characters. Earlier block entries win ties.
    fn complete_prefix(&self, token: &str) -> Option<(&'a str, usize)> {
        let len = token.chars().count();
        if len < BLOCK_KEY_LEN {
            return None;
        }
        let block = self.dictionary.lookup_block(token)?;
        let mut best: Option<(&'a str, u32)> = None;
        for term in block {
            if !term.starts_with(token) || term.chars().count() > len + self.config.max_prefix_extension {
                continue;
            }
            let df = self.index.df(term);
            if best.map_or(true, |(_, best_df)| df > best_df) {
                best = Some((term.as_str(), df));
            }
        }
        best.map(|(term, _)| (term, term.chars().count() - len))
    }

    /// Block keys searched for a fuzzy match: the token's own key first, then
    /// every existing key one substitution away in the first three characters.
    fn search_keys(&self, token: &str) -> Vec<String> {
        let key: Vec<char> = block_key(token).chars().collect();
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        let own: String = key.iter().collect();
        if self.dictionary.block(&own).is_some() {
            seen.insert(own.clone());
            keys.push(own);
        }
        for i in 0..key.len() {
            for c in ALPHABET {
                let mut variant = key.clone();
                variant[i] = c;
                let variant: String = variant.into_iter().collect();
                if self.dictionary.block(&variant).is_some() && seen.insert(variant.clone()) {
                    keys.push(variant);
                }
            }
        }
        keys
    }

    /// Closest term within `min(max_fuzzy_distance, len / 2)` edits, ranked by
    /// distance then document frequency.
    fn nearest_term(&self, token: &str) -> Option<(&'a str, usize)> {
        let len = token.chars().count();
        if len < BLOCK_KEY_LEN {
            return None;
        }
        let max_distance = self.config.max_fuzzy_distance.min(len / 2);

        let mut candidates: Vec<(&'a str, usize, u32)> = Vec::new();
        for key in self.search_keys(token) {
            let Some(block) = self.dictionary.block(&key) else { continue };
            for term in block {
                if term.chars().count().abs_diff(len) > max_distance {
                    continue;
                }
                if let Some(d) = distance_within(token, term, max_distance) {
                    candidates.push((term.as_str(), d, self.index.df(term)));
                }
            }
        }
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));
        candidates.first().map(|&(term, d, _)| (term, d))
    }

    /// Corrected terms followed by up to `max_synonyms_per_term` synonyms each.
    pub fn expand(&self, terms: &[String]) -> Vec<String> {
        let mut out = dedup(terms.to_vec());
        let mut seen: HashSet<String> = out.iter().cloned().collect();
        for term in terms {
            for syn in self.lexicon.synonyms_of(term).iter().take(self.config.max_synonyms_per_term) {
                if seen.insert(syn.clone()) {
                    out.push(syn.clone());
                }
            }
        }
        out
    }
}

fn dedup(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(terms.len());
    terms.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::IndexFile;
    use std::collections::BTreeMap;

    const VOCAB: &[(&str, u32)] = &[
        ("deteksi", 5),
        ("penyakit", 7),
        ("jantung", 4),
        ("sistem", 9),
        ("sistematis", 1),
        ("pencarian", 3),
        ("pencahayaan", 2),
        ("klasifikasi", 6),
        ("detection", 1),
        ("heart", 1),
    ];

    fn fixture() -> (TermDictionary, InvertedIndex) {
        let dict = TermDictionary::from_terms(VOCAB.iter().map(|(t, _)| *t));
        let mut index = BTreeMap::new();
        for (term, df) in VOCAB {
            let docs = (0..*df).map(|i| (format!("doc_{i}"), 1)).collect();
            index.insert(term.to_string(), docs);
        }
        let doc_len = (0..10).map(|i| (format!("doc_{i}"), 10)).collect();
        let file = IndexFile { index, doc_len, num_docs: 10, avg_doc_len: 10.0, ..IndexFile::default() };
        (dict, InvertedIndex::from_file(file).unwrap())
    }

    fn with_pre<T>(f: impl FnOnce(&QueryPreprocessor) -> T) -> T {
        let (dict, index) = fixture();
        let lexicon = Lexicon::default();
        let config = RankerConfig::default();
        let pre = QueryPreprocessor::new(&dict, &index, &lexicon, &config);
        f(&pre)
    }

    #[test]
    fn exact_match_is_kept() {
        with_pre(|pre| {
            let c = pre.correct("sistem");
            assert_eq!(c.stage, CorrectionStage::Exact);
            assert_eq!(c.distance, Some(0));
        });
    }

    #[test]
    fn known_typo_wins_over_fuzzy() {
        with_pre(|pre| {
            let c = pre.correct("penykti");
            assert_eq!(c.corrected, "penyakit");
            assert_eq!(c.stage, CorrectionStage::KnownTypo);
            assert_eq!(c.distance, Some(1));
        });
    }

    #[test]
    fn typo_target_outside_vocabulary_falls_through() {
        with_pre(|pre| {
            // "diabtes" maps to "diabetes", which this vocabulary lacks.
            let c = pre.correct("diabtes");
            assert_ne!(c.corrected, "diabetes");
        });
    }

    #[test]
    fn prefix_completion_prefers_frequent_terms() {
        with_pre(|pre| {
            let c = pre.correct("pencar");
            assert_eq!(c.corrected, "pencarian");
            assert_eq!(c.stage, CorrectionStage::PrefixCompletion);
            assert_eq!(c.distance, Some(3));

            // "sistematis" is more than five characters longer than "sist".
            let c = pre.correct("sist");
            assert_eq!(c.corrected, "sistem");
        });
    }

    #[test]
    fn fuzzy_search_reaches_neighbouring_blocks() {
        with_pre(|pre| {
            // First character wrong: block "xla" does not exist, "kla" does.
            let c = pre.correct("xlasifikasi");
            assert_eq!(c.corrected, "klasifikasi");
            assert_eq!(c.stage, CorrectionStage::EditDistance);
            assert_eq!(c.distance, Some(1));

            // Two edits after the block key.
            let c = pre.correct("jantnug");
            assert_eq!(c.corrected, "jantung");
            assert_eq!(c.distance, Some(2));
        });
    }

    #[test]
    fn fuzzy_search_allows_three_edits_on_long_tokens() {
        with_pre(|pre| {
            // three dropped vowels; eight chars allow min(3, 8 / 2) edits
            let c = pre.correct("klasfkas");
            assert_eq!(c.corrected, "klasifikasi");
            assert_eq!(c.stage, CorrectionStage::EditDistance);
            assert_eq!(c.distance, Some(3));

            // same block as "jantung" but four edits away
            assert_eq!(pre.correct("jantxxxx").stage, CorrectionStage::Unresolved);
        });
    }

    #[test]
    fn unreachable_token_is_left_alone() {
        with_pre(|pre| {
            let c = pre.correct("zzzz");
            assert_eq!(c.corrected, "zzzz");
            assert_eq!(c.distance, None);
            assert_eq!(c.stage, CorrectionStage::Unresolved);

            // Short tokens never reach the fuzzy stage.
            assert_eq!(pre.correct("qx").stage, CorrectionStage::Unresolved);
        });
    }

    #[test]
    fn confident_query_is_expanded() {
        with_pre(|pre| {
            let q = pre.preprocess("Detksi jantung jantung");
            assert!(q.expanded);
            assert_eq!(q.terms[..2], ["deteksi", "jantung"]);
            assert!(q.terms.contains(&"detection".to_string()));
            assert!(q.terms.contains(&"heart".to_string()));
            assert!(q.terms.contains(&"cardiac".to_string()));
            assert!(!q.terms.contains(&"pengenalan".to_string()), "only two synonyms per term");
            assert_eq!(q.corrections.len(), 1);
        });
    }

    #[test]
    fn low_confidence_correction_blocks_expansion() {
        with_pre(|pre| {
            let q = pre.preprocess("deteksi zzzz");
            assert!(!q.expanded);
            assert_eq!(q.terms, ["deteksi", "zzzz"]);
        });
    }

    #[test]
    fn blank_query_is_empty() {
        with_pre(|pre| {
            assert!(pre.preprocess("").is_empty());
            assert!(pre.preprocess("   ").is_empty());
            assert!(pre.preprocess("a b c").is_empty());
        });
    }
}
