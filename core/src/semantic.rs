//! Relevance check against the displayed document text.
//!
//! BM25 matches on the weighted body, which includes chapters a reader never
//! sees in the result list. A document passes when enough core terms, or one
//! of their synonyms, appear in its title, keywords or abstract.

use crate::config::RankerConfig;
use crate::index::{DocId, InvertedIndex};
use crate::lexicon::Lexicon;

pub struct SemanticFilter<'a> {
    index: &'a InvertedIndex,
    lexicon: &'a Lexicon,
    config: &'a RankerConfig,
    core_terms: &'a [String],
}

impl<'a> SemanticFilter<'a> {
    pub fn new(index: &'a InvertedIndex, lexicon: &'a Lexicon, config: &'a RankerConfig, core_terms: &'a [String]) -> Self {
        Self { index, lexicon, config, core_terms }
    }

    /// Substring match, so `sistem` also hits `sistematis`.
    pub fn is_relevant(&self, doc: DocId) -> bool {
        if self.core_terms.is_empty() {
            return true;
        }
        let text = self.index.doc(doc).map(|d| d.display_text()).unwrap_or_default();
        let matched = self
            .core_terms
            .iter()
            .filter(|term| {
                text.contains(term.as_str()) || self.lexicon.synonyms_of(term).iter().any(|s| text.contains(s.as_str()))
            })
            .count();
        matched as f64 / self.core_terms.len() as f64 >= self.config.semantic_coverage
    }

    /// Keep relevant candidates if at least `semantic_min_survivors` remain,
    /// otherwise keep them all.
    pub fn prefilter(&self, candidates: Vec<DocId>) -> Vec<DocId> {
        let relevant: Vec<DocId> = candidates.iter().copied().filter(|&d| self.is_relevant(d)).collect();
        if relevant.len() >= self.config.semantic_min_survivors {
            relevant
        } else {
            tracing::debug!(relevant = relevant.len(), candidates = candidates.len(), "semantic prefilter skipped");
            candidates
        }
    }

    /// Drop irrelevant scored documents unless fewer than
    /// `min(semantic_min_survivors, len / semantic_post_divisor)` would remain.
    pub fn postfilter(&self, scored: Vec<(DocId, f64)>) -> Vec<(DocId, f64)> {
        let floor = self.config.semantic_min_survivors.min(scored.len() / self.config.semantic_post_divisor.max(1));
        let relevant: Vec<(DocId, f64)> = scored.iter().copied().filter(|&(d, _)| self.is_relevant(d)).collect();
        if relevant.len() < floor {
            tracing::debug!(relevant = relevant.len(), scored = scored.len(), "semantic postfilter reverted");
            scored
        } else {
            relevant
        }
    }
}
