use crate::error::LoadError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `blocks.json`: block key → full terms in that block.
pub type BlocksFile = BTreeMap<String, Vec<String>>;
/// `frontcoded.json`: block key → `"prefix*suf1|suf2|..."`.
pub type FrontcodedFile = BTreeMap<String, String>;

/// Display metadata as written by the indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: String,
}

/// Schema of `index.json`. Unknown keys (e.g. a positional index) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    pub index: BTreeMap<String, BTreeMap<String, u32>>,
    pub doc_len: BTreeMap<String, u32>,
    #[serde(default)]
    pub title_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub keyword_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub doc_metadata: BTreeMap<String, RawDocMeta>,
    pub num_docs: u32,
    pub avg_doc_len: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub num_blocks: usize,
    pub skipped_docs: usize,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn blocks(&self) -> PathBuf { self.root.join("blocks.json") }
    pub fn frontcoded(&self) -> PathBuf { self.root.join("frontcoded.json") }
    pub fn index(&self) -> PathBuf { self.root.join("index.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| LoadError::parse(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    Ok(())
}

pub fn save_blocks(paths: &IndexPaths, blocks: &BlocksFile) -> Result<()> {
    write_json(&paths.blocks(), blocks)
}

pub fn load_blocks(paths: &IndexPaths) -> Result<BlocksFile, LoadError> {
    read_json(&paths.blocks())
}

pub fn save_frontcoded(paths: &IndexPaths, frontcoded: &FrontcodedFile) -> Result<()> {
    write_json(&paths.frontcoded(), frontcoded)
}

pub fn load_frontcoded(paths: &IndexPaths) -> Result<FrontcodedFile, LoadError> {
    read_json(&paths.frontcoded())
}

pub fn save_index(paths: &IndexPaths, index: &IndexFile) -> Result<()> {
    write_json(&paths.index(), index)
}

pub fn load_index(paths: &IndexPaths) -> Result<IndexFile, LoadError> {
    read_json(&paths.index())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

/// The build stamp is informational; a missing one is not an error.
pub fn load_meta(paths: &IndexPaths) -> Result<Option<MetaFile>, LoadError> {
    let path = paths.meta();
    if !path.exists() {
        return Ok(None);
    }
    read_json(&path).map(Some)
}
