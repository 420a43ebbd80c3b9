//! Score threshold and result cap.

use std::cmp::Ordering;

use crate::config::{RankerConfig, ResultLimit};
use crate::index::DocId;

/// Descending by score, then ascending by doc id.
pub fn by_score_desc(a: &(DocId, f64), b: &(DocId, f64)) -> Ordering {
    b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
}

/// Minimum score a document needs to be kept. `sorted` must be descending.
pub fn threshold(sorted: &[(DocId, f64)], limit: ResultLimit, config: &RankerConfig) -> f64 {
    if sorted.len() > config.adaptive_min_scores {
        let rank = ((sorted.len() as f64 * limit.percentile).floor() as usize).max(config.adaptive_min_rank);
        let adaptive = sorted.get(rank).map_or(config.min_score_threshold, |&(_, s)| s);
        adaptive.max(config.min_score_threshold)
    } else {
        config.min_score_threshold
    }
}

/// Drop documents below the threshold and keep at most `limit.cap`.
pub fn limit(mut scored: Vec<(DocId, f64)>, limit: ResultLimit, config: &RankerConfig) -> Vec<(DocId, f64)> {
    scored.sort_by(by_score_desc);
    let cutoff = threshold(&scored, limit, config);
    scored.retain(|&(_, s)| s >= cutoff);
    scored.truncate(limit.cap);
    scored
}
