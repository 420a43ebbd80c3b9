//! Candidate collection with a term-coverage floor.

use std::collections::BTreeMap;

use crate::config::RankerConfig;
use crate::index::{DocId, InvertedIndex};

/// Documents that passed the coverage floor, ascending by id, with the number
/// of query terms each one contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    pub docs: Vec<(DocId, usize)>,
    pub min_matches: usize,
    /// Whether the relaxed coverage fraction was used.
    pub relaxed: bool,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs.iter().map(|&(doc, _)| doc)
    }

    /// Most query terms found in any single candidate, 0 when empty.
    pub fn max_matches(&self) -> usize {
        self.docs.iter().map(|&(_, n)| n).max().unwrap_or(0)
    }
}

/// For every document, how many of `terms` occur in its postings.
pub fn count_matches(index: &InvertedIndex, terms: &[String]) -> BTreeMap<DocId, usize> {
    let mut counts = BTreeMap::new();
    for term in terms {
        for posting in index.postings(term).unwrap_or(&[]) {
            *counts.entry(posting.doc_id).or_insert(0) += 1;
        }
    }
    counts
}

pub fn min_required(core_count: usize, coverage: f64) -> usize {
    ((core_count as f64 * coverage).floor() as usize).max(1)
}

fn above(counts: &BTreeMap<DocId, usize>, min_matches: usize) -> Vec<(DocId, usize)> {
    counts.iter().filter(|(_, &n)| n >= min_matches).map(|(&d, &n)| (d, n)).collect()
}

/// Collect documents matching enough of `terms`. When fewer than
/// `min_candidates` survive, retry once with `relaxed_term_coverage`.
pub fn collect(index: &InvertedIndex, terms: &[String], core_count: usize, config: &RankerConfig) -> CandidateSet {
    let counts = count_matches(index, terms);

    let min_matches = min_required(core_count, config.min_term_coverage);
    let docs = above(&counts, min_matches);
    if docs.len() >= config.min_candidates {
        return CandidateSet { docs, min_matches, relaxed: false };
    }

    let relaxed_min = min_required(core_count, config.relaxed_term_coverage);
    let relaxed = above(&counts, relaxed_min);
    tracing::debug!(strict = docs.len(), relaxed = relaxed.len(), min_matches = relaxed_min, "relaxed term coverage");
    CandidateSet { docs: relaxed, min_matches: relaxed_min, relaxed: true }
}
