//! Static language tables: known typos, synonyms, topical domains and query
//! stopwords.
//!
//! A [`Lexicon`] is built once at startup and shared read-only (usually behind
//! an `Arc`). The default tables target Indonesian thesis titles.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::LoadError;

/// A named topic with its characteristic terms and score multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPattern {
    pub name: String,
    pub terms: Vec<String>,
    pub boost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    /// Misspelling → canonical term.
    pub typos: HashMap<String, String>,
    /// Term → related terms, most useful first. Only used to expand queries.
    pub synonyms: HashMap<String, Vec<String>>,
    /// Checked in order; earlier domains win ties.
    pub domains: Vec<DomainPattern>,
    pub stopwords: HashSet<String>,
}

impl Lexicon {
    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let lexicon: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| LoadError::parse(path, e))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        for domain in &self.domains {
            if !(domain.boost.is_finite() && domain.boost > 1.0) {
                return Err(LoadError::Config(format!(
                    "domain `{}` boost must be greater than 1.0, got {}",
                    domain.name, domain.boost
                )));
            }
        }
        Ok(())
    }

    pub fn correction_for(&self, token: &str) -> Option<&str> {
        self.typos.get(token).map(String::as_str)
    }

    pub fn synonyms_of(&self, term: &str) -> &[String] {
        self.synonyms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_stopword(&self, term: &str) -> bool {
        self.stopwords.contains(term)
    }

    /// Whether `term` is characteristic of any domain.
    pub fn in_any_domain(&self, term: &str) -> bool {
        self.domains.iter().any(|d| d.terms.iter().any(|t| t == term))
    }
}

fn pairs(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Values are space-separated, in preference order.
fn related(entries: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.split_whitespace().map(str::to_string).collect()))
        .collect()
}

fn domain(name: &str, terms: &[&str], boost: f64) -> DomainPattern {
    DomainPattern { name: name.to_string(), terms: terms.iter().map(|t| t.to_string()).collect(), boost }
}

impl Default for Lexicon {
    fn default() -> Self {
        let typos = pairs(&[
            // medical
            ("detksi", "deteksi"),
            ("deteksi", "deteksi"),
            ("penykti", "penyakit"),
            ("penykit", "penyakit"),
            ("penyakit", "penyakit"),
            ("jntung", "jantung"),
            ("jantng", "jantung"),
            ("jantung", "jantung"),
            ("diabtes", "diabetes"),
            ("diabetis", "diabetes"),
            ("kankr", "kanker"),
            ("kanker", "kanker"),
            ("strke", "stroke"),
            ("stroke", "stroke"),
            ("dagnosis", "diagnosis"),
            ("diagnosa", "diagnosis"),
            ("diagnosis", "diagnosis"),
            ("kesehtan", "kesehatan"),
            ("kesehatn", "kesehatan"),
            // machine learning
            ("machin", "machine"),
            ("lerning", "learning"),
            ("learnnig", "learning"),
            ("klasifkasi", "klasifikasi"),
            ("klasifikasi", "klasifikasi"),
            ("algortima", "algoritma"),
            ("algoritma", "algoritma"),
            ("predksi", "prediksi"),
            ("prediksi", "prediksi"),
            // systems
            ("sistem", "sistem"),
            ("sistim", "sistem"),
            ("aplikas", "aplikasi"),
            ("aplikasi", "aplikasi"),
            ("rekomndasi", "rekomendasi"),
            ("rekomendasi", "rekomendasi"),
            ("pencaruan", "pencarian"),
            ("pencarian", "pencarian"),
            ("pencrarian", "pencarian"),
            // ui/ux
            ("interfce", "interface"),
            ("interface", "interface"),
            ("antarmka", "antarmuka"),
            ("antarmuka", "antarmuka"),
            ("pengguna", "pengguna"),
            ("pemakai", "pengguna"),
            // other
            ("ontolgi", "ontologi"),
            ("ontologi", "ontologi"),
            ("jaringan", "jaringan"),
            ("jaringn", "jaringan"),
        ]);

        let synonyms = related(&[
            ("sistem", "aplikasi program"),
            ("aplikasi", "sistem program"),
            ("analisis", "analisa"),
            ("analisa", "analisis"),
            ("sentimen", "sentiment"),
            ("pencarian", "search"),
            ("rekomendasi", "recommendation"),
            ("klasifikasi", "classification pengelompokan"),
            ("deteksi", "detection identifikasi pengenalan"),
            ("detection", "deteksi identifikasi"),
            ("pengguna", "user"),
            ("user", "pengguna"),
            ("antarmuka", "interface"),
            ("interface", "antarmuka"),
            ("mobile", "android"),
            ("android", "mobile"),
            ("desain", "design"),
            ("design", "desain"),
            ("keamanan", "security"),
            ("security", "keamanan"),
            ("enkripsi", "encryption"),
            ("penyakit", "disease"),
            ("disease", "penyakit"),
            ("jantung", "heart cardiac"),
            ("heart", "jantung"),
            ("diagnosis", "diagnosa"),
            ("diagnosa", "diagnosis"),
            ("kesehatan", "health"),
            ("health", "kesehatan"),
        ]);

        let domains = vec![
            domain(
                "security",
                &["keamanan", "enkripsi", "pengamanan", "kriptografi", "security", "steganografi", "watermark", "cipher", "citra", "digital"],
                1.9,
            ),
            domain(
                "ml_ai",
                &["machine", "learning", "neural", "deep", "klasifikasi", "prediksi", "algoritma", "cnn", "lstm", "svm", "naive", "bayes"],
                1.8,
            ),
            domain(
                "ui_ux",
                &["user", "interface", "antarmuka", "desain", "ui", "ux", "interaksi", "usability", "centered", "experience"],
                1.7,
            ),
            domain(
                "nlp",
                &["sentimen", "teks", "peringkasan", "topik", "chatbot", "nlp", "text", "mining", "sentiment", "analisis"],
                1.8,
            ),
            domain("recommender", &["rekomendasi", "recommendation", "collaborative", "filtering"], 1.8),
            domain(
                "medical",
                &["penyakit", "medis", "diagnosis", "kesehatan", "deteksi", "jantung", "diabetes", "kanker", "stroke", "hospital"],
                1.7,
            ),
            domain("iot", &["iot", "sensor", "arduino", "monitoring", "embedded"], 1.6),
            domain("business", &["business", "intelligence", "bi", "dashboard", "analitik"], 1.7),
            domain("mobile", &["mobile", "android", "smartphone", "aplikasi"], 1.6),
        ];

        let stopwords = ["dengan", "untuk", "pada", "yang", "dari", "dan", "atau", "ke", "oleh"]
            .iter()
            .map(|w| w.to_string())
            .collect();

        Self { typos, synonyms, domains, stopwords }
    }
}
