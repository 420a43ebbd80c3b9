use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use skripsi_core::build::{CorpusDoc, IndexBuilder};
use skripsi_core::eval::{evaluate, load_judgments, EvalReport};
use skripsi_core::persist::{save_blocks, save_frontcoded, save_index, save_meta, IndexPaths, MetaFile};
use skripsi_core::{Lexicon, Profile, Ranker, RankerConfig};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FORMAT_VERSION: u32 = 1;

/// A `.json` corpus file holds either one record or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Many(Vec<CorpusDoc>),
    One(Box<CorpusDoc>),
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the thesis search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Score a built index against judged test queries
    Eval {
        /// Index directory written by `build`
        #[arg(long)]
        index: String,
        /// JSON object mapping each query to its relevant doc ids
        #[arg(long)]
        queries: String,
        /// Ranking profile: strict or balanced
        #[arg(long, default_value = "strict")]
        profile: Profile,
        /// JSON file overriding ranking parameters
        #[arg(long)]
        config: Option<String>,
        /// Results retrieved per query
        #[arg(long, default_value_t = 100)]
        top_k: usize,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(Path::new(&input), Path::new(&output)).map(|_| ()),
        Commands::Eval { index, queries, profile, config, top_k, output } => {
            let report = evaluate_index(Path::new(&index), Path::new(&queries), profile, config.as_deref().map(Path::new), top_k)?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => std::fs::write(&path, json).with_context(|| format!("writing {path}"))?,
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}

/// Corpus files under `input`, in path order so document positions are stable.
fn corpus_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files.sort();
    files
}

fn build_index(input: &Path, output: &Path) -> Result<MetaFile> {
    let files = corpus_files(input);
    if files.is_empty() {
        tracing::warn!(input = %input.display(), "no corpus files found");
    }

    let mut builder = IndexBuilder::new();
    for file in &files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut builder)?;
        } else {
            read_json(file, &mut builder)?;
        }
    }
    tracing::info!(files = files.len(), num_docs = builder.num_docs(), "ingested documents");

    let out = builder.finish();
    let paths = IndexPaths::new(output);
    save_blocks(&paths, &out.blocks)?;
    save_frontcoded(&paths, &out.frontcoded)?;
    save_index(&paths, &out.index)?;
    let meta = MetaFile {
        num_docs: out.index.num_docs,
        num_terms: out.index.index.len(),
        num_blocks: out.blocks.len(),
        skipped_docs: out.skipped,
        created_at: build_stamp(time::OffsetDateTime::now_utc())?,
        version: FORMAT_VERSION,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output = %output.display(), skipped = out.skipped, "index build complete");
    Ok(meta)
}

fn evaluate_index(index: &Path, queries: &Path, profile: Profile, config: Option<&Path>, top_k: usize) -> Result<EvalReport> {
    let config = match config {
        Some(path) => RankerConfig::from_json_file(path, profile)?,
        None => RankerConfig::for_profile(profile),
    };
    let ranker = Ranker::load(&IndexPaths::new(index), Arc::new(Lexicon::default()), config)
        .with_context(|| format!("loading index from {}", index.display()))?;
    let judgments = load_judgments(queries)?;
    if judgments.is_empty() {
        tracing::warn!(queries = %queries.display(), "no judged queries");
    }

    let report = evaluate(&ranker, &judgments, top_k);
    for weak in report.weak_queries() {
        tracing::warn!(query = %weak.query, f1 = weak.metrics.f1, "query needs attention");
    }
    Ok(report)
}

/// RFC 3339 timestamp for `meta.json`.
fn build_stamp(at: time::OffsetDateTime) -> Result<String> {
    at.format(&time::format_description::well_known::Rfc3339)
        .context("formatting build timestamp")
}

fn read_jsonl(file: &Path, builder: &mut IndexBuilder) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: CorpusDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid corpus record", file.display(), lineno + 1))?;
        builder.add(doc);
    }
    Ok(())
}

fn read_json(file: &Path, builder: &mut IndexBuilder) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let parsed: CorpusFile = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("{}: expected a corpus record or an array of records", file.display()))?;
    match parsed {
        CorpusFile::Many(docs) => {
            for doc in docs {
                builder.add(doc);
            }
        }
        CorpusFile::One(doc) => {
            builder.add(*doc);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const RECORD: &str = r#"{"title": "Sistem Rekomendasi Wisata", "keywords": "rekomendasi, wisata",
        "abstract": "Sistem rekomendasi destinasi wisata menggunakan collaborative filtering.", "authors": "Made"}"#;

    #[test]
    fn builds_from_json_and_jsonl() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(corpus.join("nested")).unwrap();
        std::fs::write(corpus.join("a.json"), format!("[{RECORD}, {{\"title\": \"pendek\"}}]")).unwrap();
        std::fs::write(
            corpus.join("nested/b.jsonl"),
            format!("{}\n\n{}\n", RECORD.replace('\n', " "), RECORD.replace('\n', " ").replace("Wisata", "Kuliner")),
        )
        .unwrap();
        std::fs::write(corpus.join("notes.txt"), "ignored").unwrap();

        let out = dir.path().join("index");
        let meta = build_index(&corpus, &out).unwrap();
        assert_eq!(meta.num_docs, 3);
        assert_eq!(meta.skipped_docs, 1);
        assert_eq!(meta.version, FORMAT_VERSION);

        let paths = IndexPaths::new(&out);
        assert!(paths.meta().exists());
        let ranker = Ranker::load(&paths, Arc::new(Lexicon::default()), RankerConfig::balanced()).unwrap();
        assert_eq!(ranker.stats().num_docs, 3);
        // positions run across files; doc_1 was too short
        assert!(ranker.document("doc_0").is_some());
        assert!(ranker.document("doc_1").is_none());
        assert!(ranker.document("doc_3").is_some());
    }

    #[test]
    fn evaluates_judged_queries() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.json");
        let kuliner = RECORD.replace("Wisata", "Kuliner").replace("wisata", "kuliner");
        std::fs::write(
            &corpus,
            format!(
                "[{}, {}]",
                RECORD.replacen('{', "{\"doc_id\": \"w\",", 1),
                kuliner.replacen('{', "{\"doc_id\": \"k\",", 1)
            ),
        )
        .unwrap();
        let index = dir.path().join("index");
        build_index(&corpus, &index).unwrap();

        let queries = dir.path().join("queries.json");
        std::fs::write(&queries, r#"{"wisata": ["w"], "qqqq": ["k"]}"#).unwrap();
        let config = dir.path().join("ranker.json");
        std::fs::write(&config, r#"{"min_score_threshold": 0.0}"#).unwrap();

        let report = evaluate_index(&index, &queries, Profile::Balanced, Some(&config), 100).unwrap();
        assert_eq!(report.summary.num_queries, 2);
        let wisata = report.queries.iter().find(|q| q.query == "wisata").unwrap();
        assert_eq!(wisata.retrieved, ["w"]);
        assert_eq!(wisata.metrics.average_precision, 1.0);
        assert_eq!(report.summary.map, 0.5);
        let weak: Vec<&str> = report.weak_queries().iter().map(|q| q.query.as_str()).collect();
        assert_eq!(weak, ["qqqq"]);

        assert!(evaluate_index(&index, &dir.path().join("missing.json"), Profile::Strict, None, 10).is_err());
    }

    #[test]
    fn build_stamp_is_rfc3339() {
        use time::macros::datetime;
        assert_eq!(build_stamp(datetime!(2026-01-01 0:00 UTC)).unwrap(), "2026-01-01T00:00:00Z");
        // RFC 3339 offsets have no seconds field
        assert!(build_stamp(datetime!(2026-01-01 0:00 +01:00:30)).is_err());
    }

    #[test]
    fn malformed_record_reports_location() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.jsonl");
        std::fs::write(&file, "{\"title\": 5}\n").unwrap();
        let err = build_index(&file, &dir.path().join("out")).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:1"));
    }
}
