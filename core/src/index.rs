use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::LoadError;
use crate::persist::IndexFile;

pub type TermId = u32;
pub type DocId = u32;

/// Display fields kept per document, already truncated by the indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub title: String,
    pub keywords: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: String,
}

impl DocMeta {
    /// Lower-cased title, keywords and abstract joined by spaces.
    pub fn display_text(&self) -> String {
        format!("{} {} {}", self.title, self.keywords, self.abstract_text).to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    /// Raw count in the weighted document text.
    pub tf: u32,
}

/// In-memory inverted index. Document ids are interned in ascending order of
/// their external ids so ties resolve the same way on every load.
#[derive(Debug)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    pub postings: Vec<Vec<Posting>>, // indexed by TermId, sorted by doc_id
    pub title_index: HashMap<String, Vec<DocId>>,
    pub keyword_index: HashMap<String, Vec<DocId>>,
    pub doc_len: Vec<u32>,
    pub docs: Vec<DocMeta>,
    pub doc_id_map: HashMap<String, DocId>,
    pub num_docs: u32,
    pub avg_doc_len: f64,
}

impl InvertedIndex {
    /// Validate and intern a parsed `index.json`.
    pub fn from_file(file: IndexFile) -> Result<Self, LoadError> {
        if !file.avg_doc_len.is_finite() || file.avg_doc_len < 0.0 {
            return Err(LoadError::Schema(format!("avg_doc_len must be a non-negative number, got {}", file.avg_doc_len)));
        }
        if file.num_docs == 0 && !file.index.is_empty() {
            return Err(LoadError::Schema(format!("num_docs is 0 but the index holds {} terms", file.index.len())));
        }

        let mut external: BTreeSet<&str> = BTreeSet::new();
        external.extend(file.doc_len.keys().map(String::as_str));
        external.extend(file.doc_metadata.keys().map(String::as_str));
        for docs in file.index.values() {
            external.extend(docs.keys().map(String::as_str));
        }
        for ids in file.title_index.values().chain(file.keyword_index.values()) {
            external.extend(ids.iter().map(String::as_str));
        }
        let doc_id_map: HashMap<String, DocId> = external
            .iter()
            .enumerate()
            .map(|(i, ext)| (ext.to_string(), i as DocId))
            .collect();
        let intern = |ext: &str| doc_id_map[ext];

        let mut docs: Vec<DocMeta> = external
            .iter()
            .map(|ext| DocMeta { external_id: ext.to_string(), ..DocMeta::default() })
            .collect();
        for (ext, meta) in &file.doc_metadata {
            let doc = &mut docs[intern(ext.as_str()) as usize];
            doc.title = meta.title.clone();
            doc.keywords = meta.keywords.clone();
            doc.abstract_text = meta.abstract_text.clone();
            doc.authors = meta.authors.clone();
        }

        let mut doc_len = vec![0u32; docs.len()];
        for (ext, len) in &file.doc_len {
            doc_len[intern(ext.as_str()) as usize] = *len;
        }

        let mut dictionary = HashMap::with_capacity(file.index.len());
        let mut postings = Vec::with_capacity(file.index.len());
        for (term, by_doc) in &file.index {
            let mut plist: Vec<Posting> = by_doc
                .iter()
                .map(|(ext, tf)| Posting { doc_id: intern(ext.as_str()), tf: *tf })
                .collect();
            plist.sort_by_key(|p| p.doc_id);
            dictionary.insert(term.clone(), postings.len() as TermId);
            postings.push(plist);
        }

        let field_index = |raw: &BTreeMap<String, Vec<String>>| -> HashMap<String, Vec<DocId>> {
            raw.iter()
                .map(|(term, ids)| {
                    let mut ids: Vec<DocId> = ids.iter().map(|ext| intern(ext.as_str())).collect();
                    ids.sort_unstable();
                    ids.dedup();
                    (term.clone(), ids)
                })
                .collect()
        };
        let title_index = field_index(&file.title_index);
        let keyword_index = field_index(&file.keyword_index);

        tracing::info!(
            docs = file.num_docs,
            terms = dictionary.len(),
            avg_doc_len = file.avg_doc_len,
            "index loaded"
        );
        Ok(Self {
            dictionary,
            postings,
            title_index,
            keyword_index,
            doc_len,
            docs,
            doc_id_map,
            num_docs: file.num_docs,
            avg_doc_len: file.avg_doc_len,
        })
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        let tid = *self.dictionary.get(term)?;
        self.postings.get(tid as usize).map(Vec::as_slice)
    }

    /// Number of documents containing `term` in the weighted text.
    pub fn df(&self, term: &str) -> u32 {
        self.postings(term).map_or(0, |p| p.len() as u32)
    }

    /// Raw term frequency of `term` in `doc`, if the term occurs there.
    pub fn tf(&self, term: &str, doc: DocId) -> Option<u32> {
        let plist = self.postings(term)?;
        plist.binary_search_by_key(&doc, |p| p.doc_id).ok().map(|i| plist[i].tf)
    }

    pub fn in_title(&self, term: &str, doc: DocId) -> bool {
        Self::field_contains(&self.title_index, term, doc)
    }

    pub fn in_keywords(&self, term: &str, doc: DocId) -> bool {
        Self::field_contains(&self.keyword_index, term, doc)
    }

    fn field_contains(field: &HashMap<String, Vec<DocId>>, term: &str, doc: DocId) -> bool {
        field.get(term).is_some_and(|ids| ids.binary_search(&doc).is_ok())
    }

    /// Weighted token count; 0 for documents without a stored length.
    pub fn doc_len(&self, doc: DocId) -> u32 {
        self.doc_len.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn doc(&self, doc: DocId) -> Option<&DocMeta> {
        self.docs.get(doc as usize)
    }

    pub fn lookup_external(&self, external_id: &str) -> Option<DocId> {
        self.doc_id_map.get(external_id).copied()
    }
}
