//! Ranking parameters.
//!
//! Every threshold and boost the ranker uses lives in [`RankerConfig`]. Two
//! named profiles exist: `strict` favors precision and is the default,
//! `balanced` lets more weak matches through.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::analyzer::Specificity;
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Strict,
    Balanced,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!("unknown profile `{other}` (expected strict or balanced)")),
        }
    }
}

/// Result cap and adaptive-threshold percentile for one specificity class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultLimit {
    pub cap: usize,
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    // BM25
    pub k1: f64,
    pub b: f64,

    // field boosting
    pub title_boost: f64,
    pub keyword_boost: f64,
    pub perfect_match_multiplier: f64,
    pub ideal_coverage_multiplier: f64,
    pub good_coverage_multiplier: f64,
    pub good_term_coverage: f64,
    pub ideal_term_coverage: f64,

    // candidate collection
    pub min_term_coverage: f64,
    pub relaxed_term_coverage: f64,
    pub min_candidates: usize,

    // result limiting
    pub specific: ResultLimit,
    pub moderate: ResultLimit,
    pub generic: ResultLimit,
    /// Above this many scored documents the threshold becomes adaptive.
    pub adaptive_min_scores: usize,
    /// Smallest rank the adaptive cutoff may sit at.
    pub adaptive_min_rank: usize,
    pub min_score_threshold: f64,

    // semantic filter
    pub semantic_coverage: f64,
    pub semantic_min_survivors: usize,
    pub semantic_post_divisor: usize,

    // correction and expansion
    pub max_prefix_extension: usize,
    pub max_fuzzy_distance: usize,
    /// Expansion is skipped if any correction is this far or farther.
    pub expansion_max_distance: usize,
    pub max_synonyms_per_term: usize,

    pub abstract_excerpt_chars: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl RankerConfig {
    pub fn strict() -> Self {
        Self {
            k1: 1.6,
            b: 0.75,
            title_boost: 5.5,
            keyword_boost: 4.5,
            perfect_match_multiplier: 2.0,
            ideal_coverage_multiplier: 1.4,
            good_coverage_multiplier: 1.2,
            good_term_coverage: 0.6,
            ideal_term_coverage: 0.85,
            min_term_coverage: 0.65,
            relaxed_term_coverage: 0.35,
            min_candidates: 5,
            specific: ResultLimit { cap: 25, percentile: 0.25 },
            moderate: ResultLimit { cap: 40, percentile: 0.35 },
            generic: ResultLimit { cap: 55, percentile: 0.45 },
            adaptive_min_scores: 20,
            adaptive_min_rank: 8,
            min_score_threshold: 8.0,
            semantic_coverage: 0.7,
            semantic_min_survivors: 3,
            semantic_post_divisor: 2,
            max_prefix_extension: 5,
            max_fuzzy_distance: 3,
            expansion_max_distance: 3,
            max_synonyms_per_term: 2,
            abstract_excerpt_chars: 200,
        }
    }

    pub fn balanced() -> Self {
        Self {
            min_score_threshold: 3.0,
            min_term_coverage: 0.45,
            ideal_term_coverage: 0.70,
            ..Self::strict()
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Strict => Self::strict(),
            Profile::Balanced => Self::balanced(),
        }
    }

    /// Load overrides from a JSON object on top of `profile`'s values.
    /// Top-level keys replace the profile value wholesale.
    pub fn from_json_file(path: &Path, profile: Profile) -> Result<Self, LoadError> {
        let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let overrides: serde_json::Value =
            serde_json::from_reader(BufReader::new(f)).map_err(|e| LoadError::parse(path, e))?;
        let serde_json::Value::Object(overrides) = overrides else {
            return Err(LoadError::Config(format!("{} must hold a JSON object", path.display())));
        };

        let mut merged = serde_json::to_value(Self::for_profile(profile)).map_err(|e| LoadError::parse(path, e))?;
        if let serde_json::Value::Object(base) = &mut merged {
            base.extend(overrides);
        }
        let config: Self = serde_json::from_value(merged).map_err(|e| LoadError::parse(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn limit_for(&self, specificity: Specificity) -> ResultLimit {
        match specificity {
            Specificity::Specific => self.specific,
            Specificity::Moderate => self.moderate,
            Specificity::Generic => self.generic,
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let fractions = [
            ("b", self.b),
            ("min_term_coverage", self.min_term_coverage),
            ("relaxed_term_coverage", self.relaxed_term_coverage),
            ("ideal_term_coverage", self.ideal_term_coverage),
            ("good_term_coverage", self.good_term_coverage),
            ("semantic_coverage", self.semantic_coverage),
            ("specific.percentile", self.specific.percentile),
            ("moderate.percentile", self.moderate.percentile),
            ("generic.percentile", self.generic.percentile),
        ];
        for (name, v) in fractions {
            if !(0.0..=1.0).contains(&v) {
                return Err(LoadError::Config(format!("{name} must be within [0, 1], got {v}")));
            }
        }
        if !(self.k1.is_finite() && self.k1 > 0.0) {
            return Err(LoadError::Config(format!("k1 must be positive, got {}", self.k1)));
        }
        if self.relaxed_term_coverage > self.min_term_coverage {
            return Err(LoadError::Config("relaxed_term_coverage must not exceed min_term_coverage".into()));
        }
        if self.semantic_post_divisor == 0 {
            return Err(LoadError::Config("semantic_post_divisor must be at least 1".into()));
        }
        Ok(())
    }
}
