use skripsi_core::dictionary::{block_key, build_blocks, decode_block, TermDictionary};
use skripsi_core::tokenizer::{normalize_field, query_tokens, FieldMode};

#[test]
fn it_normalizes_unicode_and_case() {
    // fullwidth letters fold under NFKC
    let out = normalize_field("ＳＩＳＴＥＭ Informasi", FieldMode::Minimal);
    assert_eq!(out, "sistem informasi");
    assert_eq!(query_tokens("ＳＩＳＴＥＭ"), vec!["sistem"]);
}

#[test]
fn it_filters_body_stopwords() {
    let out = normalize_field("Sistem yang dibangun dengan metode dan data dari sekolah", FieldMode::Aggressive);
    let words: Vec<&str> = out.split_whitespace().collect();
    assert!(!words.contains(&"yang"));
    assert!(!words.contains(&"dengan"));
    assert!(!words.contains(&"dari"));
    assert!(words.contains(&"sekolah"));
}

#[test]
fn field_tokens_survive_front_coding() {
    let text = normalize_field(
        "Sistem Informasi Akademik; sistematis, sistemik dan E-Learning untuk siswa",
        FieldMode::Minimal,
    );
    let (blocks, frontcoded) = build_blocks(text.split_whitespace());
    for (key, encoded) in &frontcoded {
        let mut decoded = decode_block(encoded);
        decoded.sort();
        assert_eq!(&decoded, &blocks[key], "block {key}");
    }

    let dict = TermDictionary::from_parts(blocks, frontcoded).unwrap();
    for term in text.split_whitespace() {
        assert!(dict.contains(term), "{term}");
        assert!(dict.lookup_block(term).unwrap().iter().any(|t| t == term));
    }
    assert_eq!(dict.lookup_block("sistem").unwrap().len(), 4);
    assert_eq!(block_key("e-learning"), "e-l");
}
