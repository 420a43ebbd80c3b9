//! Query classification: core terms, specificity and topical domain.

use serde::Serialize;
use std::fmt;

use crate::lexicon::Lexicon;

/// How narrow a query is. Narrower queries get a smaller result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Specificity {
    Specific,
    Moderate,
    Generic,
}

impl Specificity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::Moderate => "moderate",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain a query was assigned to. `general` with boost 1.0 when none matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainMatch {
    pub name: String,
    pub boost: f64,
}

impl DomainMatch {
    pub const GENERAL: &'static str = "general";

    pub fn general() -> Self {
        Self { name: Self::GENERAL.to_string(), boost: 1.0 }
    }

    pub fn is_general(&self) -> bool {
        self.name == Self::GENERAL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub core_terms: Vec<String>,
    pub specificity: Specificity,
    pub domain: DomainMatch,
}

/// Terms minus stopwords. Falls back to every term when all are stopwords.
pub fn core_terms(terms: &[String], lexicon: &Lexicon) -> Vec<String> {
    let core: Vec<String> = terms.iter().filter(|t| !lexicon.is_stopword(t)).cloned().collect();
    if core.is_empty() {
        terms.to_vec()
    } else {
        core
    }
}

pub fn specificity(core_terms: &[String], lexicon: &Lexicon) -> Specificity {
    let n = core_terms.len();
    let domain_hit = core_terms.iter().any(|t| lexicon.in_any_domain(t));
    if n >= 3 || (n >= 2 && domain_hit) {
        Specificity::Specific
    } else if n >= 2 {
        Specificity::Moderate
    } else {
        Specificity::Generic
    }
}

/// Domain with the most matching terms. Only a strictly larger count
/// displaces an earlier domain, so table order breaks ties.
pub fn detect_domain(terms: &[String], lexicon: &Lexicon) -> DomainMatch {
    let mut best: Option<(usize, &crate::lexicon::DomainPattern)> = None;
    for domain in &lexicon.domains {
        let matches = terms.iter().filter(|t| domain.terms.iter().any(|d| d == *t)).count();
        if matches > 0 && best.map_or(true, |(n, _)| matches > n) {
            best = Some((matches, domain));
        }
    }
    match best {
        Some((_, domain)) => DomainMatch { name: domain.name.clone(), boost: domain.boost },
        None => DomainMatch::general(),
    }
}

pub fn analyze(terms: &[String], lexicon: &Lexicon) -> QueryAnalysis {
    let core_terms = core_terms(terms, lexicon);
    let specificity = specificity(&core_terms, lexicon);
    let domain = detect_domain(terms, lexicon);
    QueryAnalysis { core_terms, specificity, domain }
}
