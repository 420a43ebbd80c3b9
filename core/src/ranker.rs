//! The search pipeline.
//!
//! `search` runs, in order: preprocessing (correction and expansion), query
//! analysis, candidate collection, the semantic prefilter, BM25 scoring with
//! boosting, threshold and cap, the semantic postfilter and the final top-k
//! cut. Every stage reads shared immutable state, so one `Ranker` can serve
//! any number of threads.

use serde::Serialize;
use std::sync::Arc;

use crate::analyzer::{analyze, QueryAnalysis, Specificity};
use crate::collector::collect;
use crate::config::RankerConfig;
use crate::dictionary::TermDictionary;
use crate::error::LoadError;
use crate::index::{DocId, DocMeta, InvertedIndex};
use crate::lexicon::Lexicon;
use crate::limiter::{self, by_score_desc};
use crate::persist::{load_blocks, load_frontcoded, load_index, BlocksFile, FrontcodedFile, IndexFile, IndexPaths};
use crate::preprocess::{Correction, QueryPreprocessor};
use crate::scorer::{boost_multiplier, Bm25};
use crate::semantic::SemanticFilter;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: String,
    pub score: f64,
    pub title: String,
    pub keywords: String,
    pub abstract_excerpt: String,
    pub authors: String,
    pub domain: String,
    pub specificity: Specificity,
}

/// Ranked documents together with what the pipeline did to the query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub corrections: Vec<Correction>,
    /// Corrected and expanded terms that were searched.
    pub terms: Vec<String>,
    /// `None` when the query had no usable tokens.
    pub analysis: Option<QueryAnalysis>,
    pub documents: Vec<ScoredDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DictionaryStats {
    pub num_blocks: usize,
    pub num_terms: usize,
    pub num_frontcoded: usize,
    pub avg_block_size: f64,
    /// Vocabulary terms per front-coded entry.
    pub compression_ratio: f64,
    pub num_typo_patterns: usize,
    pub num_docs: u32,
    pub num_index_terms: usize,
}

pub struct Ranker {
    dictionary: TermDictionary,
    index: InvertedIndex,
    lexicon: Arc<Lexicon>,
    config: RankerConfig,
}

impl Ranker {
    /// Read `blocks.json`, `frontcoded.json` and `index.json` from `paths`.
    pub fn load(paths: &IndexPaths, lexicon: Arc<Lexicon>, config: RankerConfig) -> Result<Self, LoadError> {
        let blocks = load_blocks(paths)?;
        let frontcoded = load_frontcoded(paths)?;
        let index = load_index(paths)?;
        Self::from_parts(blocks, frontcoded, index, lexicon, config)
    }

    /// Validate and assemble already-parsed dictionary and index files.
    pub fn from_parts(
        blocks: BlocksFile,
        frontcoded: FrontcodedFile,
        index: IndexFile,
        lexicon: Arc<Lexicon>,
        config: RankerConfig,
    ) -> Result<Self, LoadError> {
        config.validate()?;
        lexicon.validate()?;
        let dictionary = TermDictionary::from_parts(blocks, frontcoded)?;
        let index = InvertedIndex::from_file(index)?;
        Ok(Self { dictionary, index, lexicon, config })
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn document(&self, external_id: &str) -> Option<&DocMeta> {
        self.index.lookup_external(external_id).and_then(|d| self.index.doc(d))
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredDocument> {
        self.search_detailed(query, top_k).documents
    }

    pub fn search_detailed(&self, query: &str, top_k: usize) -> SearchOutcome {
        let prepared = QueryPreprocessor::new(&self.dictionary, &self.index, &self.lexicon, &self.config).preprocess(query);
        let mut outcome = SearchOutcome { query: query.to_string(), ..SearchOutcome::default() };
        if prepared.is_empty() {
            return outcome;
        }
        outcome.corrections = prepared.corrections;
        outcome.terms = prepared.terms;

        let analysis = analyze(&outcome.terms, &self.lexicon);
        tracing::debug!(
            terms = ?outcome.terms,
            domain = %analysis.domain.name,
            specificity = %analysis.specificity,
            "query analyzed"
        );

        let candidates = collect(&self.index, &outcome.terms, analysis.core_terms.len(), &self.config);
        tracing::debug!(
            candidates = candidates.len(),
            min_matches = candidates.min_matches,
            max_matches = candidates.max_matches(),
            relaxed = candidates.relaxed,
            "candidates collected"
        );
        if candidates.is_empty() {
            outcome.analysis = Some(analysis);
            return outcome;
        }

        let semantic = SemanticFilter::new(&self.index, &self.lexicon, &self.config, &analysis.core_terms);
        let docs = semantic.prefilter(candidates.ids().collect());

        let bm25 = Bm25::new(&self.index, &self.config);
        let scored: Vec<(DocId, f64)> = docs
            .into_iter()
            .filter_map(|doc| {
                let base = bm25.score(&outcome.terms, doc);
                (base > 0.0).then(|| {
                    let mult = boost_multiplier(&self.index, &analysis.core_terms, doc, &analysis.domain, &self.config);
                    (doc, base * mult)
                })
            })
            .collect();

        let limited = limiter::limit(scored, self.config.limit_for(analysis.specificity), &self.config);
        let mut ranked = semantic.postfilter(limited);
        ranked.sort_by(by_score_desc);
        ranked.truncate(top_k);

        outcome.documents = ranked
            .into_iter()
            .filter_map(|(doc, score)| self.index.doc(doc).map(|meta| self.present(meta, score, &analysis)))
            .collect();
        outcome.analysis = Some(analysis);
        outcome
    }

    fn present(&self, meta: &DocMeta, score: f64, analysis: &QueryAnalysis) -> ScoredDocument {
        ScoredDocument {
            doc_id: meta.external_id.clone(),
            score,
            title: meta.title.clone(),
            keywords: meta.keywords.clone(),
            abstract_excerpt: excerpt(&meta.abstract_text, self.config.abstract_excerpt_chars),
            authors: meta.authors.clone(),
            domain: analysis.domain.name.clone(),
            specificity: analysis.specificity,
        }
    }

    pub fn stats(&self) -> DictionaryStats {
        let num_terms = self.dictionary.len();
        let num_frontcoded = self.dictionary.num_frontcoded();
        DictionaryStats {
            num_blocks: self.dictionary.num_blocks(),
            num_terms,
            num_frontcoded,
            avg_block_size: self.dictionary.avg_block_size(),
            compression_ratio: if num_frontcoded == 0 { 0.0 } else { num_terms as f64 / num_frontcoded as f64 },
            num_typo_patterns: self.lexicon.typos.len(),
            num_docs: self.index.num_docs,
            num_index_terms: self.index.num_terms(),
        }
    }
}

/// First `max_chars` characters, with `...` appended when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
