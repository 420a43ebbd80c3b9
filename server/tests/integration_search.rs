use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, AppOptions};
use skripsi_core::build::{CorpusDoc, IndexBuilder};
use skripsi_core::persist::{save_blocks, save_frontcoded, save_index, save_meta, IndexPaths, MetaFile};
use skripsi_core::Profile;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const TOKEN: &str = "rahasia";

fn thesis(id: &str, title: &str, keywords: &str, abstract_text: &str) -> CorpusDoc {
    CorpusDoc {
        doc_id: Some(id.to_string()),
        title: title.to_string(),
        keywords: keywords.to_string(),
        abstract_text: abstract_text.to_string(),
        ..CorpusDoc::default()
    }
}

fn build_tiny_index(dir: &Path) {
    let mut builder = IndexBuilder::new();
    builder.add(thesis(
        "wisata",
        "Sistem Rekomendasi Destinasi Wisata Bali",
        "rekomendasi, wisata, collaborative filtering",
        "Sistem rekomendasi destinasi wisata menggunakan metode collaborative filtering berdasarkan rating pengguna.",
    ));
    builder.add(thesis(
        "perpustakaan",
        "Sistem Informasi Perpustakaan Berbasis Web",
        "sistem informasi, perpustakaan, web",
        "Sistem informasi perpustakaan dibangun untuk mempermudah pencatatan peminjaman buku di sekolah.",
    ));
    builder.add(thesis(
        "jantung",
        "Deteksi Penyakit Jantung Koroner Menggunakan Jaringan Syaraf Tiruan",
        "deteksi, penyakit jantung, jaringan syaraf tiruan",
        "Penyakit jantung koroner (cardiac) merupakan penyebab kematian tertinggi. Sistem deteksi dini dibangun \
         menggunakan data rekam medis pasien rumah sakit.",
    ));
    let out = builder.finish();

    let paths = IndexPaths::new(dir);
    save_blocks(&paths, &out.blocks).unwrap();
    save_frontcoded(&paths, &out.frontcoded).unwrap();
    save_index(&paths, &out.index).unwrap();
    let meta = MetaFile {
        num_docs: out.index.num_docs,
        num_terms: out.index.index.len(),
        num_blocks: out.blocks.len(),
        skipped_docs: out.skipped,
        created_at: "2026-01-01T00:00:00Z".into(),
        version: 1,
    };
    save_meta(&paths, &meta).unwrap();
}

/// App over the tiny corpus with the score floor disabled.
fn app(dir: &TempDir) -> Router {
    let data = dir.path().join("index");
    build_tiny_index(&data);
    let config = dir.path().join("ranker.json");
    fs::write(&config, r#"{"min_score_threshold": 0.0}"#).unwrap();
    build_app(AppOptions {
        data_dir: data,
        history_path: dir.path().join("history.json"),
        profile: Profile::Balanced,
        ranker_config: Some(config),
        lexicon: None,
        admin_token: Some(TOKEN.into()),
    })
    .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let (status, body) = get(app, uri).await;
    assert_eq!(status, StatusCode::OK, "{uri}");
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_check() {
    let dir = tempdir().unwrap();
    let app = app(&dir);
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/search?q=wisata%20bali&k=2").await;
    let results = json["results"].as_array().unwrap();
    assert!(!results.is_empty() && results.len() <= 2);
    assert_eq!(results[0]["doc_id"], "wisata");
    assert_eq!(json["total_hits"].as_u64().unwrap() as usize, results.len());
    assert!(results[0]["snippet"].as_str().unwrap().contains("<em>wisata</em>"));
    assert!(json["specificity"].is_string());
    assert!(json["took_s"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn search_reports_corrections() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/search?q=jntung").await;
    assert_eq!(json["corrections"][0]["original"], "jntung");
    assert_eq!(json["corrections"][0]["corrected"], "jantung");
    assert_eq!(json["results"][0]["doc_id"], "jantung");
    assert_eq!(json["domain"], "medical");
}

fn result_ids(json: &Value) -> Vec<String> {
    json["results"].as_array().unwrap().iter().map(|r| r["doc_id"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn results_can_be_resorted() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let by_score = result_ids(&get_json(&app, "/search?q=sistem").await);
    assert!(by_score.len() >= 2, "{by_score:?}");

    let newest = result_ids(&get_json(&app, "/search?q=sistem&sort=newest").await);
    let mut expected = by_score.clone();
    expected.sort_by(|a, b| b.cmp(a));
    assert_eq!(newest, expected);

    let json = get_json(&app, "/search?q=sistem&sort=title").await;
    let titles: Vec<&str> = json["results"].as_array().unwrap().iter().map(|r| r["title"].as_str().unwrap()).collect();
    assert!(titles.windows(2).all(|w| w[0] <= w[1]), "{titles:?}");
    assert_eq!(titles.len(), by_score.len());

    let (status, _) = get(&app, "/search?q=sistem&sort=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn results_can_be_filtered_by_domain() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/search?q=jntung&domain=medical").await;
    assert_eq!(result_ids(&json), ["jantung"]);

    let json = get_json(&app, "/search?q=jntung&domain=ml_ai").await;
    assert_eq!(json["total_hits"], 0);
    // analysis is still reported for the filtered-out query
    assert_eq!(json["domain"], "medical");

    // history keeps the count the user saw
    let history = get_json(&app, "/history").await;
    assert_eq!(history[0]["num_results"], 0);
    assert_eq!(history[1]["num_results"], 1);
}

#[tokio::test]
async fn blank_query_has_no_results() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/search?q=%20%20").await;
    assert_eq!(json["total_hits"], 0);
    assert!(json["specificity"].is_null());
}

#[tokio::test]
async fn k_is_clamped_to_at_least_one() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/search?q=sistem%20informasi%20perpustakaan&k=0").await;
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn document_lookup() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/doc/perpustakaan").await;
    assert_eq!(json["external_id"], "perpustakaan");
    assert!(json["title"].as_str().unwrap().contains("perpustakaan"));

    let (status, _) = get(&app, "/doc/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_include_build_stamp() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    let json = get_json(&app, "/stats").await;
    assert_eq!(json["dictionary"]["num_docs"], 3);
    assert!(json["dictionary"]["num_blocks"].as_u64().unwrap() > 0);
    assert_eq!(json["build"]["created_at"], "2026-01-01T00:00:00Z");
}

#[tokio::test]
async fn searches_are_recorded_in_history() {
    let dir = tempdir().unwrap();
    let app = app(&dir);

    get_json(&app, "/search?q=wisata").await;
    get_json(&app, "/search?q=jantung").await;
    get_json(&app, "/search?q=wisata").await;

    let history = get_json(&app, "/history").await;
    let queries: Vec<&str> = history.as_array().unwrap().iter().map(|r| r["query"].as_str().unwrap()).collect();
    assert_eq!(queries, ["wisata", "jantung", "wisata"]);
    assert_eq!(get_json(&app, "/history?limit=1").await.as_array().unwrap().len(), 1);

    let stats = get_json(&app, "/history/stats").await;
    assert_eq!(stats["total_searches"], 3);
    assert_eq!(stats["unique_queries"], 2);
    assert_eq!(stats["searches_today"], 3);
    assert_eq!(stats["top_queries"][0]["query"], "wisata");
    assert_eq!(stats["top_queries"][0]["count"], 2);
}

#[tokio::test]
async fn clearing_history_needs_admin_token() {
    let dir = tempdir().unwrap();
    let app = app(&dir);
    get_json(&app, "/search?q=wisata").await;

    let req = Request::builder().method(Method::DELETE).uri("/history").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(get_json(&app, "/history").await.as_array().unwrap().len(), 1);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/history")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(get_json(&app, "/history").await.as_array().unwrap().is_empty());
}
