//! BM25 scoring and field boosting.
//!
//! The base score is Okapi BM25 over the weighted document text, with the IDF
//! damped for terms that occur in a large share of the corpus. Boosting then
//! multiplies the base score by a factor built from title and keyword hits,
//! overall term coverage and the query's domain boost.

use crate::analyzer::DomainMatch;
use crate::config::RankerConfig;
use crate::index::{DocId, InvertedIndex};

pub struct Bm25<'a> {
    index: &'a InvertedIndex,
    k1: f64,
    b: f64,
}

impl<'a> Bm25<'a> {
    pub fn new(index: &'a InvertedIndex, config: &RankerConfig) -> Self {
        Self { index, k1: config.k1, b: config.b }
    }

    /// Probabilistic IDF, multiplied by 0.4 above 50% document frequency and
    /// by 0.6 above 30%. Unknown terms have IDF 0.
    pub fn idf(&self, term: &str) -> f64 {
        let df = self.index.df(term);
        if df == 0 {
            return 0.0;
        }
        let n = f64::from(self.index.num_docs);
        let df = f64::from(df);
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        if df > n * 0.5 {
            idf * 0.4
        } else if df > n * 0.3 {
            idf * 0.6
        } else {
            idf
        }
    }

    pub fn score(&self, terms: &[String], doc: DocId) -> f64 {
        let dl = self.index.doc_len(doc);
        if dl == 0 {
            return 0.0;
        }
        let avgdl = self.index.avg_doc_len;
        let length_ratio = if avgdl > 0.0 { f64::from(dl) / avgdl } else { 1.0 };
        let norm = self.k1 * (1.0 - self.b + self.b * length_ratio);

        terms
            .iter()
            .filter_map(|term| {
                let tf = f64::from(self.index.tf(term, doc)?);
                Some(self.idf(term) * (tf * (self.k1 + 1.0)) / (tf + norm))
            })
            .sum()
    }
}

/// Fraction of `core_terms` found in `doc` through the body, title or keyword index.
pub fn term_coverage(index: &InvertedIndex, core_terms: &[String], doc: DocId) -> f64 {
    if core_terms.is_empty() {
        return 0.0;
    }
    let matched = core_terms
        .iter()
        .filter(|t| index.tf(t, doc).is_some() || index.in_title(t, doc) || index.in_keywords(t, doc))
        .count();
    matched as f64 / core_terms.len() as f64
}

/// Score multiplier for `doc` from field hits, coverage and domain.
pub fn boost_multiplier(
    index: &InvertedIndex,
    core_terms: &[String],
    doc: DocId,
    domain: &DomainMatch,
    config: &RankerConfig,
) -> f64 {
    let core = core_terms.len();
    if core == 0 {
        return domain.boost;
    }
    let mut mult = 1.0;

    let title_hits = core_terms.iter().filter(|t| index.in_title(t, doc)).count();
    if title_hits > 0 {
        let coverage = title_hits as f64 / core as f64;
        mult += if coverage >= 0.8 {
            config.title_boost * 1.5
        } else if coverage >= 0.6 {
            config.title_boost * 1.2
        } else {
            config.title_boost * coverage
        };
    }

    let keyword_hits = core_terms.iter().filter(|t| index.in_keywords(t, doc)).count();
    if keyword_hits > 0 {
        mult += config.keyword_boost * (keyword_hits as f64 / core as f64);
    }

    if title_hits == core && core >= 2 {
        mult *= config.perfect_match_multiplier;
    }

    let coverage = term_coverage(index, core_terms, doc);
    if coverage >= config.ideal_term_coverage {
        mult *= config.ideal_coverage_multiplier;
    } else if coverage >= config.good_term_coverage {
        mult *= config.good_coverage_multiplier;
    }

    mult * domain.boost
}
