use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skripsi_core::persist::{load_meta, IndexPaths, MetaFile};
use skripsi_core::{Correction, DictionaryStats, DocMeta, Lexicon, Profile, Ranker, RankerConfig, ScoredDocument, Specificity};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod history;

use history::{HistoryStats, HistoryStore, SearchRecord};

const MAX_K: usize = 100;

/// Everything needed to start serving.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Directory with `blocks.json`, `frontcoded.json` and `index.json`.
    pub data_dir: PathBuf,
    pub history_path: PathBuf,
    pub profile: Profile,
    /// JSON overrides on top of `profile`.
    pub ranker_config: Option<PathBuf>,
    /// Replacement for the built-in lexicon tables.
    pub lexicon: Option<PathBuf>,
    /// Required in `X-ADMIN-TOKEN` for destructive endpoints; unset disables them.
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub sort: SortOrder,
    /// Keep only results whose detected domain has this name.
    pub domain: Option<String>,
}
fn default_k() -> usize {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ranker order.
    #[default]
    Score,
    /// Document id descending.
    Newest,
    /// Title A-Z.
    Title,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub corrections: Vec<Correction>,
    pub terms: Vec<String>,
    pub domain: Option<String>,
    pub domain_boost: Option<f64>,
    pub specificity: Option<Specificity>,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: ScoredDocument,
    /// Abstract excerpt with searched terms wrapped in `<em>`.
    pub snippet: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub dictionary: DictionaryStats,
    pub build: Option<MetaFile>,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    pub ranker: Arc<Ranker>,
    pub history: Arc<HistoryStore>,
    pub build: Option<MetaFile>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn load(options: &AppOptions) -> Result<Self> {
        let config = match &options.ranker_config {
            Some(path) => RankerConfig::from_json_file(path, options.profile)?,
            None => RankerConfig::for_profile(options.profile),
        };
        let lexicon = match &options.lexicon {
            Some(path) => Lexicon::from_json_file(path)?,
            None => Lexicon::default(),
        };
        let paths = IndexPaths::new(&options.data_dir);
        let ranker = Ranker::load(&paths, Arc::new(lexicon), config)
            .with_context(|| format!("loading index from {}", options.data_dir.display()))?;
        let build = load_meta(&paths)?;
        Ok(Self {
            ranker: Arc::new(ranker),
            history: Arc::new(HistoryStore::new(&options.history_path)),
            build,
            admin_token: options.admin_token.clone(),
        })
    }
}

pub fn build_app(options: AppOptions) -> Result<Router> {
    let state = AppState::load(&options)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/history", get(history_handler).delete(clear_history))
        .route("/history/stats", get(history_stats_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let ranker = Arc::clone(&state.ranker);
    let query = params.q.clone();
    let outcome = tokio::task::spawn_blocking(move || ranker.search_detailed(&query, k))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("search task failed: {e}")))?;
    let elapsed = start.elapsed();
    let documents = arrange(outcome.documents, params.sort, params.domain.as_deref());

    record_search(&state.history, &params.q, documents.len(), elapsed.as_secs_f64()).await;

    let results = documents
        .into_iter()
        .map(|document| {
            let snippet = highlight_terms(&document.abstract_excerpt, &outcome.terms);
            SearchHit { document, snippet }
        })
        .collect::<Vec<_>>();
    let (domain, domain_boost, specificity) = match &outcome.analysis {
        Some(a) => (Some(a.domain.name.clone()), Some(a.domain.boost), Some(a.specificity)),
        None => (None, None, None),
    };
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        corrections: outcome.corrections,
        terms: outcome.terms,
        domain,
        domain_boost,
        specificity,
        results,
    }))
}

/// Domain filter, then a stable re-sort. An empty domain filters nothing.
pub fn arrange(mut documents: Vec<ScoredDocument>, sort: SortOrder, domain: Option<&str>) -> Vec<ScoredDocument> {
    if let Some(domain) = domain.map(str::trim).filter(|d| !d.is_empty()) {
        documents.retain(|d| d.domain == domain);
    }
    match sort {
        SortOrder::Score => {}
        SortOrder::Newest => documents.sort_by(|a, b| b.doc_id.cmp(&a.doc_id)),
        SortOrder::Title => documents.sort_by(|a, b| a.title.cmp(&b.title)),
    }
    documents
}

/// The history file is rewritten whole on every append, so it runs off the
/// async workers.
async fn record_search(history: &Arc<HistoryStore>, query: &str, num_results: usize, search_time: f64) {
    let history = Arc::clone(history);
    let query = query.to_string();
    let appended = tokio::task::spawn_blocking(move || history.append(&query, num_results, search_time)).await;
    match appended {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to record search history"),
        Err(e) => tracing::warn!(error = %e, "search history task failed"),
    }
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<DocMeta>, (StatusCode, String)> {
    state
        .ranker
        .document(&doc_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("document `{doc_id}` not found")))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse { dictionary: state.ranker.stats(), build: state.build.clone() })
}

/// Newest first.
pub async fn history_handler(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Json<Vec<SearchRecord>> {
    let mut records = state.history.load();
    records.reverse();
    if let Some(limit) = params.limit {
        records.truncate(limit);
    }
    Json(records)
}

pub async fn history_stats_handler(State(state): State<AppState>) -> Json<HistoryStats> {
    Json(state.history.stats())
}

async fn clear_history(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, (StatusCode, String)> {
    authorize(&state, &headers)?;
    state
        .history
        .reset()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to reset history: {e}")))?;
    tracing::info!(path = %state.history.path().display(), "search history cleared");
    Ok(StatusCode::NO_CONTENT)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// Wrap every case-insensitive occurrence of `terms` in `<em>`. Longer terms
/// win where two overlap.
fn highlight_terms(text: &str, terms: &[String]) -> String {
    let mut sorted: Vec<&str> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if sorted.is_empty() {
        return text.to_string();
    }
    sorted.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    let alternation = sorted.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    match regex::RegexBuilder::new(&alternation).case_insensitive(true).build() {
        Ok(pat) => pat.replace_all(text, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned(),
        Err(_) => text.to_string(),
    }
}
