use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref NON_WORD_KEEP_HYPHEN: Regex = Regex::new(r"[^\w\s-]").expect("valid regex");
    static ref BODY_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "yang", "dan", "di", "dengan", "untuk", "pada", "dari",
            "dalam", "ini", "itu", "atau", "juga", "dapat", "akan",
            "ada", "adalah", "ke", "oleh", "sebagai", "tersebut",
            "karena", "namun", "tetapi", "sehingga", "maka", "bagi",
        ];
        words.iter().copied().collect()
    };
}

/// How hard a document field is cleaned before indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Title and keywords: keep hyphenated words, drop single characters.
    Minimal,
    /// Body fields: drop punctuation, stopwords and tokens of two characters or fewer.
    Aggressive,
}

fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    WHITESPACE.replace_all(&lowered, " ").into_owned()
}

/// Clean a document field into space-separated index tokens.
pub fn normalize_field(text: &str, mode: FieldMode) -> String {
    let text = normalize(text);
    let cleaned = match mode {
        FieldMode::Minimal => NON_WORD_KEEP_HYPHEN.replace_all(&text, " "),
        FieldMode::Aggressive => NON_WORD.replace_all(&text, " "),
    };
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| match mode {
            FieldMode::Minimal => w.chars().count() > 1,
            FieldMode::Aggressive => !BODY_STOPWORDS.contains(w) && w.chars().count() > 2,
        })
        .collect();
    tokens.join(" ")
}

/// Split a raw query into lower-cased tokens longer than one character.
/// Punctuation is kept; tokens are matched against the vocabulary as typed.
pub fn query_tokens(query: &str) -> Vec<String> {
    let normalized = query.nfkc().collect::<String>().to_lowercase();
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}
