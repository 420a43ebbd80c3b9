//! Blocked, front-coded term dictionary.
//!
//! The vocabulary is partitioned into blocks keyed by the first three
//! characters of each term. On disk every block is stored twice: once as the
//! plain term list (`blocks.json`) and once front-coded (`frontcoded.json`),
//! `"prefix*suf1|suf2|..."`. Loading decodes every front-coded block up front
//! so membership tests are a single hash lookup.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::LoadError;

/// Number of leading characters that form a block key.
pub const BLOCK_KEY_LEN: usize = 3;

const PREFIX_SEP: char = '*';
const SUFFIX_SEP: &str = "|";

/// Block key for `term`: its first three characters, or the whole term if shorter.
pub fn block_key(term: &str) -> &str {
    match term.char_indices().nth(BLOCK_KEY_LEN) {
        Some((end, _)) => &term[..end],
        None => term,
    }
}

/// Expand a front-coded block back into its terms.
pub fn decode_block(encoded: &str) -> Vec<String> {
    let Some((prefix, suffixes)) = encoded.split_once(PREFIX_SEP) else {
        return vec![encoded.to_string()];
    };
    if suffixes.is_empty() {
        return vec![prefix.to_string()];
    }
    suffixes.split(SUFFIX_SEP).map(|suffix| format!("{prefix}{suffix}")).collect()
}

/// Front-code a set of terms. Returns `None` for an empty block.
///
/// Terms must not contain `*` or `|`; the field tokenizer strips both.
pub fn encode_block<S: AsRef<str>>(terms: &[S]) -> Option<String> {
    let mut sorted: Vec<&str> = terms.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();
    match sorted.as_slice() {
        [] => None,
        [only] => Some((*only).to_string()),
        [first, rest @ ..] => {
            let mut prefix_len = first.len();
            for term in rest {
                prefix_len = common_prefix_len(&first[..prefix_len], term);
            }
            let prefix = &first[..prefix_len];
            let suffixes: Vec<&str> = sorted.iter().map(|t| &t[prefix_len..]).collect();
            Some(format!("{prefix}{PREFIX_SEP}{}", suffixes.join(SUFFIX_SEP)))
        }
    }
}

/// Byte length of the longest common prefix, on a char boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Group `terms` into blocks and front-code each one.
pub fn build_blocks<I, S>(terms: I) -> (BTreeMap<String, Vec<String>>, BTreeMap<String, String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blocks: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for term in terms {
        let term = term.as_ref();
        if term.is_empty() {
            continue;
        }
        blocks.entry(block_key(term).to_string()).or_default().push(term.to_string());
    }
    let mut frontcoded = BTreeMap::new();
    for (key, list) in blocks.iter_mut() {
        list.sort_unstable();
        list.dedup();
        if let Some(encoded) = encode_block(list.as_slice()) {
            frontcoded.insert(key.clone(), encoded);
        }
    }
    (blocks, frontcoded)
}

/// Read-only vocabulary with block-level access for spelling correction.
#[derive(Debug, Default)]
pub struct TermDictionary {
    blocks: HashMap<String, Vec<String>>,
    vocabulary: HashSet<String>,
    num_frontcoded: usize,
}

impl TermDictionary {
    /// Build from the two on-disk views of the dictionary.
    ///
    /// Every front-coded block must decode to exactly the term set listed for
    /// the same key in `blocks`, and every term must belong under its own key.
    /// Block term order follows `blocks`, which is what correction tie-breaks on.
    pub fn from_parts(
        blocks: BTreeMap<String, Vec<String>>,
        frontcoded: BTreeMap<String, String>,
    ) -> Result<Self, LoadError> {
        if let Some(key) = blocks.keys().find(|k| !frontcoded.contains_key(*k)) {
            return Err(LoadError::dictionary(key, "listed in blocks but missing from front-coded terms"));
        }

        let mut vocabulary = HashSet::new();
        let mut decoded_blocks = HashMap::with_capacity(blocks.len());
        for (key, encoded) in &frontcoded {
            let decoded: HashSet<String> = decode_block(encoded).into_iter().collect();
            let Some(listed) = blocks.get(key) else {
                return Err(LoadError::dictionary(key, "front-coded block has no entry in blocks"));
            };
            let listed_set: HashSet<&str> = listed.iter().map(String::as_str).collect();
            if listed_set.len() != decoded.len() || !decoded.iter().all(|t| listed_set.contains(t.as_str())) {
                return Err(LoadError::dictionary(
                    key,
                    format!("front coding decodes to {} terms, blocks lists {}", decoded.len(), listed_set.len()),
                ));
            }
            if let Some(stray) = decoded.iter().find(|t| block_key(t) != key) {
                return Err(LoadError::dictionary(key, format!("term `{stray}` belongs to block `{}`", block_key(stray))));
            }

            let mut ordered: Vec<String> = Vec::with_capacity(listed.len());
            let mut seen = HashSet::with_capacity(listed.len());
            for term in listed {
                if seen.insert(term.as_str()) {
                    ordered.push(term.clone());
                }
            }
            vocabulary.extend(decoded);
            decoded_blocks.insert(key.clone(), ordered);
        }

        tracing::info!(terms = vocabulary.len(), blocks = decoded_blocks.len(), "dictionary loaded");
        Ok(Self { blocks: decoded_blocks, vocabulary, num_frontcoded: frontcoded.len() })
    }

    /// Build directly from a term list, as the indexer does.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (blocks, frontcoded) = build_blocks(terms);
        let num_frontcoded = frontcoded.len();
        let vocabulary = blocks.values().flatten().cloned().collect();
        Self { blocks: blocks.into_iter().collect(), vocabulary, num_frontcoded }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains(term)
    }

    /// Terms in the block `term` would live in.
    pub fn lookup_block(&self, term: &str) -> Option<&[String]> {
        self.block(block_key(term))
    }

    /// Terms stored under an exact block key.
    pub fn block(&self, key: &str) -> Option<&[String]> {
        self.blocks.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_frontcoded(&self) -> usize {
        self.num_frontcoded
    }

    pub fn avg_block_size(&self) -> f64 {
        if self.blocks.is_empty() {
            return 0.0;
        }
        let total: usize = self.blocks.values().map(Vec::len).sum();
        total as f64 / self.blocks.len() as f64
    }
}
