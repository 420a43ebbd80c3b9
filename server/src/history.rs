//! Search history, persisted as one JSON array.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    #[serde(default)]
    pub num_results: usize,
    /// Seconds.
    #[serde(default)]
    pub search_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCount {
    pub query: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_searches: usize,
    pub unique_queries: usize,
    pub avg_results: f64,
    pub avg_search_time: f64,
    pub searches_today: usize,
    pub top_queries: Vec<QueryCount>,
}

const TOP_QUERIES: usize = 10;

/// Append-only log of searches. Every operation rereads the file under the
/// lock, so several stores on one path stay consistent within a process.
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first. A missing or unreadable file is empty history.
    pub fn load(&self) -> Vec<SearchRecord> {
        let _guard = self.lock.lock();
        self.read()
    }

    fn read(&self) -> Vec<SearchRecord> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&text) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt search history");
                Vec::new()
            }
        }
    }

    fn write(&self, records: &[SearchRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    pub fn append(&self, query: &str, num_results: usize, search_time: f64) -> Result<SearchRecord> {
        let record = SearchRecord {
            query: query.to_string(),
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
            num_results,
            search_time,
        };
        let _guard = self.lock.lock();
        let mut records = self.read();
        records.push(record.clone());
        self.write(&records)?;
        Ok(record)
    }

    pub fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(&[])
    }

    pub fn stats(&self) -> HistoryStats {
        stats_at(&self.load(), OffsetDateTime::now_utc())
    }
}

/// Statistics over `records`, counting as "today" the UTC date of `now`.
pub fn stats_at(records: &[SearchRecord], now: OffsetDateTime) -> HistoryStats {
    if records.is_empty() {
        return HistoryStats::default();
    }
    let n = records.len() as f64;
    let today = now.date();
    let searches_today = records
        .iter()
        .filter_map(|r| OffsetDateTime::parse(&r.timestamp, &Rfc3339).ok())
        .filter(|ts| ts.to_offset(time::UtcOffset::UTC).date() == today)
        .count();

    // counts in first-appearance order so ties keep that order after the stable sort
    let mut order: Vec<QueryCount> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();
    for r in records {
        match slot.get(r.query.as_str()) {
            Some(&i) => order[i].count += 1,
            None => {
                slot.insert(&r.query, order.len());
                order.push(QueryCount { query: r.query.clone(), count: 1 });
            }
        }
    }
    let unique_queries = order.len();
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_QUERIES);

    HistoryStats {
        total_searches: records.len(),
        unique_queries,
        avg_results: records.iter().map(|r| r.num_results as f64).sum::<f64>() / n,
        avg_search_time: records.iter().map(|r| r.search_time).sum::<f64>() / n,
        searches_today,
        top_queries: order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn record(query: &str, timestamp: &str, num_results: usize) -> SearchRecord {
        SearchRecord { query: query.into(), timestamp: timestamp.into(), num_results, search_time: 0.5 }
    }

    #[test]
    fn missing_and_corrupt_files_read_as_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().is_empty());
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());
        assert_eq!(store.stats(), HistoryStats::default());

        // appending over a corrupt file starts a fresh history
        store.append("jantung", 3, 0.01).unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn append_and_reset() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/history.json"));
        store.append("sistem informasi", 4, 0.02).unwrap();
        let rec = store.append("jantung", 1, 0.04).unwrap();
        assert!(OffsetDateTime::parse(&rec.timestamp, &Rfc3339).is_ok());

        let all = store.load();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].query, "sistem informasi");
        assert_eq!(all[1], rec);

        store.reset().unwrap();
        assert!(store.load().is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "[]");
    }

    #[test]
    fn stats_count_today_and_rank_queries() {
        let records = vec![
            record("wisata", "2026-03-01T23:30:00+07:00", 2),
            record("jantung", "2026-03-02T08:00:00Z", 4),
            record("wisata", "2026-03-02T09:00:00Z", 6),
            record("jantung", "not a timestamp", 0),
            record("desa", "2026-03-02T10:00:00Z", 8),
        ];
        let stats = stats_at(&records, datetime!(2026-03-02 12:00 UTC));
        assert_eq!(stats.total_searches, 5);
        assert_eq!(stats.unique_queries, 3);
        assert_eq!(stats.avg_results, 4.0);
        assert_eq!(stats.avg_search_time, 0.5);
        // 23:30 at +07:00 is 16:30 UTC on the first
        assert_eq!(stats.searches_today, 3);
        assert_eq!(
            stats.top_queries,
            [
                QueryCount { query: "wisata".into(), count: 2 },
                QueryCount { query: "jantung".into(), count: 2 },
                QueryCount { query: "desa".into(), count: 1 },
            ]
        );
    }
}
