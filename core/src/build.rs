//! Offline index construction from thesis records.
//!
//! Each document is flattened into a *weighted* token stream where important
//! fields are repeated: the title five times, keywords four, the abstract
//! three, chapter one twice and chapters two to five once. Term frequencies
//! come from that stream, so a title hit counts five times in BM25.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::dictionary::build_blocks;
use crate::persist::{BlocksFile, FrontcodedFile, IndexFile, RawDocMeta};
use crate::tokenizer::{normalize_field, FieldMode};

const TITLE_WEIGHT: f64 = 5.0;
const KEYWORDS_WEIGHT: f64 = 4.0;
const ABSTRACT_WEIGHT: f64 = 3.0;
const CHAPTER_WEIGHTS: [f64; 5] = [2.0, 1.5, 1.0, 1.0, 1.0];
const PEOPLE_WEIGHT: f64 = 0.5;

const MIN_FIELD_WORDS: usize = 10;
const MIN_WEIGHTED_TOKENS: usize = 5;

const TITLE_CHARS: usize = 200;
const KEYWORDS_CHARS: usize = 200;
const ABSTRACT_CHARS: usize = 500;
const AUTHORS_CHARS: usize = 100;

/// One thesis record as found in the corpus files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorpusDoc {
    #[serde(default, alias = "id")]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub advisors: String,
    /// Chapter bodies in order; anything past the fifth is ignored.
    #[serde(default)]
    pub chapters: Vec<String>,
}

struct Fields {
    title: String,
    keywords: String,
    abstract_text: String,
    chapters: Vec<String>,
    authors: String,
    advisors: String,
}

impl Fields {
    fn normalize(doc: &CorpusDoc) -> Self {
        Self {
            title: normalize_field(&doc.title, FieldMode::Minimal),
            keywords: normalize_field(&doc.keywords, FieldMode::Minimal),
            abstract_text: normalize_field(&doc.abstract_text, FieldMode::Aggressive),
            chapters: doc
                .chapters
                .iter()
                .take(CHAPTER_WEIGHTS.len())
                .map(|c| normalize_field(c, FieldMode::Aggressive))
                .collect(),
            authors: normalize_field(&doc.authors, FieldMode::Aggressive),
            advisors: normalize_field(&doc.advisors, FieldMode::Aggressive),
        }
    }

    fn weighted(&self) -> Vec<(&str, f64)> {
        let mut parts = vec![
            (self.title.as_str(), TITLE_WEIGHT),
            (self.keywords.as_str(), KEYWORDS_WEIGHT),
            (self.abstract_text.as_str(), ABSTRACT_WEIGHT),
        ];
        parts.extend(self.chapters.iter().map(String::as_str).zip(CHAPTER_WEIGHTS));
        parts.push((self.authors.as_str(), PEOPLE_WEIGHT));
        parts.push((self.advisors.as_str(), PEOPLE_WEIGHT));
        parts
    }

    fn word_count(&self) -> usize {
        self.weighted().iter().map(|(text, _)| text.split_whitespace().count()).sum()
    }

    fn weighted_tokens(&self) -> Vec<&str> {
        let mut tokens = Vec::new();
        for (text, weight) in self.weighted() {
            for _ in 0..weight.floor() as usize {
                tokens.extend(text.split_whitespace());
            }
        }
        tokens
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Everything the indexer writes, apart from the build stamp.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub index: IndexFile,
    pub blocks: BlocksFile,
    pub frontcoded: FrontcodedFile,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: IndexFile,
    position: usize,
    skipped: usize,
    total_len: u64,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document. Returns `false` if it was too short or its id was
    /// already taken.
    pub fn add(&mut self, doc: CorpusDoc) -> bool {
        let position = self.position;
        self.position += 1;

        let id = doc
            .doc_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("doc_{position}"));
        if self.index.doc_len.contains_key(&id) {
            tracing::warn!(doc_id = %id, "duplicate document id, skipping");
            self.skipped += 1;
            return false;
        }

        let fields = Fields::normalize(&doc);
        if fields.word_count() < MIN_FIELD_WORDS {
            self.skipped += 1;
            return false;
        }
        let tokens = fields.weighted_tokens();
        if tokens.len() < MIN_WEIGHTED_TOKENS {
            self.skipped += 1;
            return false;
        }

        for token in &tokens {
            *self.index.index.entry(token.to_string()).or_default().entry(id.clone()).or_insert(0) += 1;
        }
        add_field_terms(&mut self.index.title_index, &fields.title, &id);
        add_field_terms(&mut self.index.keyword_index, &fields.keywords, &id);

        self.index.doc_len.insert(id.clone(), tokens.len() as u32);
        self.total_len += tokens.len() as u64;
        self.index.doc_metadata.insert(
            id,
            RawDocMeta {
                title: truncate(&fields.title, TITLE_CHARS),
                keywords: truncate(&fields.keywords, KEYWORDS_CHARS),
                abstract_text: truncate(&fields.abstract_text, ABSTRACT_CHARS),
                authors: truncate(&fields.authors, AUTHORS_CHARS),
            },
        );
        true
    }

    pub fn num_docs(&self) -> usize {
        self.index.doc_len.len()
    }

    pub fn finish(mut self) -> BuildOutput {
        let num_docs = self.index.doc_len.len();
        self.index.num_docs = num_docs as u32;
        self.index.avg_doc_len = if num_docs == 0 { 0.0 } else { self.total_len as f64 / num_docs as f64 };
        let (blocks, frontcoded) = build_blocks(self.index.index.keys());
        tracing::info!(
            docs = num_docs,
            terms = self.index.index.len(),
            blocks = blocks.len(),
            skipped = self.skipped,
            "index built"
        );
        BuildOutput { index: self.index, blocks, frontcoded, skipped: self.skipped }
    }
}

fn add_field_terms(field: &mut BTreeMap<String, Vec<String>>, text: &str, id: &str) {
    for token in text.split_whitespace() {
        let ids = field.entry(token.to_string()).or_default();
        if ids.last().map(String::as_str) != Some(id) {
            ids.push(id.to_string());
        }
    }
}
