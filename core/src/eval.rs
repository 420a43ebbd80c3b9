//! Retrieval quality against hand-judged queries.
//!
//! A judgment file maps each test query to the ids of its relevant documents:
//!
//! ```json
//! { "deteksi penyakit jantung": ["doc_12", "doc_40"], "sistem informasi desa": ["doc_7"] }
//! ```
//!
//! [`evaluate`] runs every query through a [`Ranker`] and scores the ranked ids
//! with the usual set and ranking metrics.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::LoadError;
use crate::ranker::Ranker;

/// Query text to relevant document ids.
pub type Judgments = BTreeMap<String, Vec<String>>;

/// Queries scoring below this F1 are reported as needing attention.
pub const WEAK_F1: f64 = 0.6;

const RECALL_LEVELS: usize = 11;
const TOP_RETRIEVED: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub p_at_5: f64,
    pub p_at_10: f64,
    pub average_precision: f64,
    pub r_precision: f64,
    pub interpolated_11pt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEvaluation {
    pub query: String,
    pub num_retrieved: usize,
    pub num_relevant: usize,
    #[serde(flatten)]
    pub metrics: Metrics,
    /// First ten ranked ids.
    pub retrieved: Vec<String>,
}

/// Per-metric means over all evaluated queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub num_queries: usize,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: f64,
    pub map: f64,
    pub mean_p_at_5: f64,
    pub mean_p_at_10: f64,
    pub mean_r_precision: f64,
    pub mean_interpolated_11pt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub summary: Summary,
    pub queries: Vec<QueryEvaluation>,
}

impl EvalReport {
    /// Queries with F1 under [`WEAK_F1`], worst first.
    pub fn weak_queries(&self) -> Vec<&QueryEvaluation> {
        let mut weak: Vec<&QueryEvaluation> = self.queries.iter().filter(|q| q.metrics.f1 < WEAK_F1).collect();
        weak.sort_by(|a, b| a.metrics.f1.total_cmp(&b.metrics.f1));
        weak
    }
}

pub fn load_judgments(path: &Path) -> Result<Judgments, LoadError> {
    let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| LoadError::parse(path, e))
}

fn relevant_set(relevant: &[String]) -> HashSet<&str> {
    relevant.iter().map(String::as_str).collect()
}

fn hits(retrieved: &[String], relevant: &HashSet<&str>) -> usize {
    let mut seen = HashSet::new();
    retrieved.iter().filter(|d| relevant.contains(d.as_str()) && seen.insert(d.as_str())).count()
}

/// Sum of precision at each relevant rank, divided by the number of relevant documents.
pub fn average_precision(retrieved: &[String], relevant: &[String]) -> f64 {
    let relevant = relevant_set(relevant);
    if retrieved.is_empty() || relevant.is_empty() {
        return 0.0;
    }
    let mut found = 0;
    let mut sum = 0.0;
    for (rank, doc) in retrieved.iter().enumerate() {
        if relevant.contains(doc.as_str()) {
            found += 1;
            sum += found as f64 / (rank + 1) as f64;
        }
    }
    sum / relevant.len() as f64
}

/// Precision over the first R results, R being the number of relevant documents.
pub fn r_precision(retrieved: &[String], relevant: &[String]) -> f64 {
    let relevant = relevant_set(relevant);
    if relevant.is_empty() {
        return 0.0;
    }
    let top = &retrieved[..retrieved.len().min(relevant.len())];
    hits(top, &relevant) as f64 / relevant.len() as f64
}

/// Hits in the first `k` over `min(k, R)`. Zero when fewer than `k` were retrieved.
pub fn precision_at(retrieved: &[String], relevant: &[String], k: usize) -> f64 {
    let relevant = relevant_set(relevant);
    if relevant.is_empty() || retrieved.len() < k {
        return 0.0;
    }
    hits(&retrieved[..k], &relevant) as f64 / k.min(relevant.len()) as f64
}

/// Mean over recall levels 0.0, 0.1, ..., 1.0 of the best precision reached at
/// or beyond each level.
pub fn interpolated_precision_11pt(retrieved: &[String], relevant: &[String]) -> f64 {
    let relevant = relevant_set(relevant);
    if retrieved.is_empty() || relevant.is_empty() {
        return 0.0;
    }
    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut found = 0;
    for (rank, doc) in retrieved.iter().enumerate() {
        if relevant.contains(doc.as_str()) {
            found += 1;
            points.push((found as f64 / (rank + 1) as f64, found as f64 / relevant.len() as f64));
        }
    }
    let total: f64 = (0..RECALL_LEVELS)
        .map(|i| {
            let level = i as f64 / 10.0;
            points.iter().filter(|&&(_, r)| r >= level).map(|&(p, _)| p).fold(0.0, f64::max)
        })
        .sum();
    total / RECALL_LEVELS as f64
}

pub fn metrics(retrieved: &[String], relevant: &[String]) -> Metrics {
    let relevant_docs = relevant_set(relevant);
    if retrieved.is_empty() || relevant_docs.is_empty() {
        return Metrics::default();
    }
    let tp = hits(retrieved, &relevant_docs) as f64;
    let precision = tp / retrieved.len() as f64;
    let recall = tp / relevant_docs.len() as f64;
    let f1 = if precision + recall > 0.0 { 2.0 * precision * recall / (precision + recall) } else { 0.0 };
    Metrics {
        precision,
        recall,
        f1,
        p_at_5: precision_at(retrieved, relevant, 5),
        p_at_10: precision_at(retrieved, relevant, 10),
        average_precision: average_precision(retrieved, relevant),
        r_precision: r_precision(retrieved, relevant),
        interpolated_11pt: interpolated_precision_11pt(retrieved, relevant),
    }
}

pub fn summarize(queries: &[QueryEvaluation]) -> Summary {
    if queries.is_empty() {
        return Summary::default();
    }
    let n = queries.len() as f64;
    let mean = |f: fn(&Metrics) -> f64| queries.iter().map(|q| f(&q.metrics)).sum::<f64>() / n;
    Summary {
        num_queries: queries.len(),
        mean_precision: mean(|m| m.precision),
        mean_recall: mean(|m| m.recall),
        mean_f1: mean(|m| m.f1),
        map: mean(|m| m.average_precision),
        mean_p_at_5: mean(|m| m.p_at_5),
        mean_p_at_10: mean(|m| m.p_at_10),
        mean_r_precision: mean(|m| m.r_precision),
        mean_interpolated_11pt: mean(|m| m.interpolated_11pt),
    }
}

/// Run every judged query with `top_k` results and score the rankings.
pub fn evaluate(ranker: &Ranker, judgments: &Judgments, top_k: usize) -> EvalReport {
    let queries: Vec<QueryEvaluation> = judgments
        .iter()
        .map(|(query, relevant)| {
            let retrieved: Vec<String> = ranker.search(query, top_k).into_iter().map(|d| d.doc_id).collect();
            let metrics = metrics(&retrieved, relevant);
            tracing::debug!(query = %query, retrieved = retrieved.len(), f1 = metrics.f1, "evaluated query");
            QueryEvaluation {
                query: query.clone(),
                num_retrieved: retrieved.len(),
                num_relevant: relevant_set(relevant).len(),
                metrics,
                retrieved: retrieved.into_iter().take(TOP_RETRIEVED).collect(),
            }
        })
        .collect();
    let summary = summarize(&queries);
    tracing::info!(queries = summary.num_queries, map = summary.map, mean_f1 = summary.mean_f1, "evaluation complete");
    EvalReport { summary, queries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // relevant docs sit at ranks 1, 3 and 5; "d" is never retrieved
    fn ranking() -> (Vec<String>, Vec<String>) {
        (ids(&["a", "x", "b", "y", "c"]), ids(&["a", "b", "c", "d"]))
    }

    #[test]
    fn set_metrics() {
        let (retrieved, relevant) = ranking();
        let m = metrics(&retrieved, &relevant);
        assert!(close(m.precision, 0.6));
        assert!(close(m.recall, 0.75));
        assert!(close(m.f1, 2.0 / 3.0));
    }

    #[test]
    fn average_precision_by_hand() {
        let (retrieved, relevant) = ranking();
        // (1/1 + 2/3 + 3/5) / 4
        assert!(close(average_precision(&retrieved, &relevant), (1.0 + 2.0 / 3.0 + 0.6) / 4.0));
        assert!(close(average_precision(&ids(&["a", "b"]), &ids(&["a", "b"])), 1.0));
    }

    #[test]
    fn r_precision_uses_first_r_results() {
        let (retrieved, relevant) = ranking();
        assert!(close(r_precision(&retrieved, &relevant), 0.5));
        // fewer results than relevant documents
        assert!(close(r_precision(&ids(&["a"]), &relevant), 0.25));
    }

    #[test]
    fn precision_at_k_needs_k_results() {
        let (retrieved, relevant) = ranking();
        assert!(close(precision_at(&retrieved, &relevant, 5), 0.75));
        assert_eq!(precision_at(&retrieved, &relevant, 10), 0.0);
    }

    #[test]
    fn eleven_point_interpolation_by_hand() {
        let (retrieved, relevant) = ranking();
        // levels 0.0-0.2 -> 1.0, 0.3-0.5 -> 2/3, 0.6-0.7 -> 0.6, 0.8-1.0 -> 0
        let expected = (3.0 + 3.0 * (2.0 / 3.0) + 2.0 * 0.6) / 11.0;
        assert!(close(interpolated_precision_11pt(&retrieved, &relevant), expected));
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(metrics(&[], &ids(&["a"])), Metrics::default());
        assert_eq!(metrics(&ids(&["a"]), &[]), Metrics::default());
        assert_eq!(r_precision(&ids(&["a"]), &[]), 0.0);
    }

    #[test]
    fn duplicate_results_count_once() {
        let m = metrics(&ids(&["a", "a"]), &ids(&["a", "b"]));
        assert!(close(m.recall, 0.5));
        assert!(close(m.precision, 0.5));
    }

    #[test]
    fn summary_averages_and_flags_weak_queries() {
        let eval = |query: &str, f1: f64, average_precision: f64| QueryEvaluation {
            query: query.into(),
            num_retrieved: 1,
            num_relevant: 1,
            metrics: Metrics { f1, average_precision, ..Metrics::default() },
            retrieved: Vec::new(),
        };
        let queries = vec![eval("a", 1.0, 1.0), eval("b", 0.2, 0.5), eval("c", 0.4, 0.0)];
        let summary = summarize(&queries);
        assert_eq!(summary.num_queries, 3);
        assert!(close(summary.map, 0.5));
        assert!(close(summary.mean_f1, 1.6 / 3.0));

        let report = EvalReport { summary, queries };
        let weak: Vec<&str> = report.weak_queries().iter().map(|q| q.query.as_str()).collect();
        assert_eq!(weak, ["b", "c"]);
        assert_eq!(summarize(&[]), Summary::default());
    }
}
