//! Retrieval core for the thesis search engine.
//!
//! Everything here is loaded once and then only read: the front-coded term
//! dictionary, the inverted index and the lexicon tables. A [`Ranker`] ties
//! them together behind `search(query, top_k)`.

pub mod analyzer;
pub mod build;
pub mod collector;
pub mod config;
pub mod dictionary;
pub mod edit_distance;
pub mod error;
pub mod eval;
pub mod index;
pub mod lexicon;
pub mod limiter;
pub mod persist;
pub mod preprocess;
pub mod ranker;
pub mod scorer;
pub mod semantic;
pub mod tokenizer;

pub use analyzer::{DomainMatch, QueryAnalysis, Specificity};
pub use config::{Profile, RankerConfig, ResultLimit};
pub use dictionary::TermDictionary;
pub use error::LoadError;
pub use eval::{EvalReport, Judgments, Metrics};
pub use index::{DocId, DocMeta, InvertedIndex, Posting, TermId};
pub use lexicon::{DomainPattern, Lexicon};
pub use preprocess::{Correction, CorrectionStage, PreparedQuery};
pub use ranker::{DictionaryStats, Ranker, ScoredDocument, SearchOutcome};
