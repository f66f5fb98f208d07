use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashSet;

/// Coarse part-of-speech classes, just enough for the concept grammar
/// and for stripping sentence-root verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    Adjective,
    Noun,
    Hyphen,
    Verb,
    Other,
}

/// NLTK English stopword list, used both as chunk delimiters and as a
/// closed-class lexicon for tagging.
pub const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

const AUXILIARIES: &[&str] = &[
    "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
    "do", "does", "did", "doing", "can", "could", "will", "would", "shall", "should", "may",
    "might", "must",
];

// Base forms of verbs common in scholarly prose. Inflected forms are
// reduced back to these before lookup.
const VERBS: &[&str] = &[
    "present", "show", "propose", "describe", "demonstrate", "develop", "introduce", "analyze",
    "analyse", "evaluate", "investigate", "use", "report", "discuss", "address", "consider",
    "provide", "require", "improve", "enable", "perform", "conduct", "apply", "explore",
    "examine", "achieve", "obtain", "remove", "protect", "allow", "support", "compare",
    "observe", "make", "take", "give", "find", "work", "produce", "ensure", "carry",
];

// Adjectives that the suffix rules miss.
const ADJECTIVES: &[&str] = &[
    "new", "novel", "large", "small", "high", "low", "online", "anonymous", "robust", "smart",
    "big", "deep", "main", "key", "major", "minor", "modern", "scholarly", "early", "relevant",
    "timely", "structured", "automatic", "manual", "expert", "crucial", "real",
];

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "ical", "able", "ible", "ous", "ive", "ful", "less", "ary", "al", "ic",
];

lazy_static! {
    static ref STOPWORD_SET: FxHashSet<&'static str> = STOPWORDS.iter().copied().collect();
    static ref AUXILIARY_SET: FxHashSet<&'static str> = AUXILIARIES.iter().copied().collect();
    static ref VERB_SET: FxHashSet<&'static str> = VERBS.iter().copied().collect();
    static ref ADJECTIVE_SET: FxHashSet<&'static str> = ADJECTIVES.iter().copied().collect();
    static ref TOKEN_RE: Regex =
        Regex::new(r"[A-Za-z0-9_()'’%][A-Za-z0-9_()'’%-]*|[.,:;!?]|[-–—]").unwrap();
    static ref SYNTACTIC_TOKEN_RE: Regex = Regex::new(r"[\w\-\(\)]+").unwrap();
    static ref GRAMMAR_RE: Regex = Regex::new(r"J*H*J*H*N*H*N+").unwrap();
    static ref LEAF_PUNCT_RE: Regex = Regex::new("[=,…’'+\\-–“”\"/‘\\[\\]®™%]").unwrap();
    static ref DOT_RUN_RE: Regex = Regex::new(r"\.+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

pub fn tag(token: &str) -> PosTag {
    if matches!(token, "-" | "–" | "—") {
        return PosTag::Hyphen;
    }
    let bare = token.trim_matches(|c| c == '(' || c == ')');
    if bare.is_empty() || !bare.chars().any(char::is_alphanumeric) {
        return PosTag::Other;
    }
    let lower = bare.to_lowercase();
    if lower.starts_with(|c: char| c.is_ascii_digit()) {
        return PosTag::Other;
    }
    if AUXILIARY_SET.contains(lower.as_str()) {
        return PosTag::Verb;
    }
    if STOPWORD_SET.contains(lower.as_str()) {
        return PosTag::Other;
    }
    if is_lexical_verb(&lower) {
        return PosTag::Verb;
    }
    if ADJECTIVE_SET.contains(lower.as_str()) {
        return PosTag::Adjective;
    }
    if lower.ends_with("ly") {
        return PosTag::Other;
    }
    if ADJECTIVE_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return PosTag::Adjective;
    }
    PosTag::Noun
}

fn is_lexical_verb(lower: &str) -> bool {
    if VERB_SET.contains(lower) {
        return true;
    }
    for suffix in ["s", "es", "ed", "d"] {
        if let Some(base) = lower.strip_suffix(suffix) {
            if VERB_SET.contains(base) {
                return true;
            }
        }
    }
    false
}

pub fn tag_text(text: &str) -> Vec<(String, PosTag)> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| {
            let token = m.as_str().to_string();
            let tag = tag(&token);
            (token, tag)
        })
        .collect()
}

/// Drops the first verb of every sentence, standing in for the dependency
/// root. The verb is replaced by a full stop, as the tagger pipeline does
/// before syntactic chunking.
pub fn strip_root_verbs(tagged: &[(String, PosTag)]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(tagged.len());
    let mut root_seen = false;

    for (token, tag) in tagged {
        if matches!(token.as_str(), "." | "!" | "?" | ";") {
            root_seen = false;
            parts.push(token);
            continue;
        }
        if *tag == PosTag::Verb && !root_seen {
            root_seen = true;
            parts.push(".");
            continue;
        }
        parts.push(token);
    }
    parts.join(" ")
}

/// Extracts concept chunks with the grammar `JJ* HYPH* JJ* HYPH* NN* HYPH* NN+`
/// over the tagged tokens, then normalizes punctuation inside the leaves.
pub fn semantic_grammar_chunks(tagged: &[(String, PosTag)]) -> Vec<String> {
    let symbols: String = tagged
        .iter()
        .map(|(_, tag)| match tag {
            PosTag::Adjective => 'J',
            PosTag::Noun => 'N',
            PosTag::Hyphen => 'H',
            _ => 'x',
        })
        .collect();

    let mut chunks = Vec::new();
    for m in GRAMMAR_RE.find_iter(&symbols) {
        let mut chunk = String::new();
        for (token, _) in &tagged[m.start()..m.end()] {
            let replaced = LEAF_PUNCT_RE.replace_all(token, " ");
            let leaf: &str = replaced.as_ref();
            let leaf = leaf.strip_prefix('.').unwrap_or(leaf);
            let leaf = leaf.strip_suffix('.').unwrap_or(leaf);
            let leaf = leaf.to_lowercase();
            chunk.push(' ');
            chunk.push_str(leaf.trim());
        }
        let chunk = DOT_RUN_RE.replace_all(&chunk, ".");
        let chunk = WHITESPACE_RE.replace_all(&chunk, " ");
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
    }
    chunks
}

/// Splits the text into chunks, with English stopwords acting as delimiters.
/// The stopword comparison is case sensitive; chunks are lowercased afterwards.
pub fn stopword_split_chunks(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = SYNTACTIC_TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();

    let mut chunks = Vec::new();
    for (is_delimiter, run) in &tokens
        .iter()
        .chunk_by(|token| STOPWORD_SET.contains(**token))
    {
        if !is_delimiter {
            let chunk = run.copied().collect::<Vec<_>>().join(" ").to_lowercase();
            chunks.push(chunk);
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_domain_vocabulary() {
        assert_eq!(tag("semantic"), PosTag::Adjective);
        assert_eq!(tag("web"), PosTag::Noun);
        assert_eq!(tag("mining"), PosTag::Noun);
        assert_eq!(tag("scholarly"), PosTag::Adjective);
        assert_eq!(tag("typically"), PosTag::Other);
        assert_eq!(tag("is"), PosTag::Verb);
        assert_eq!(tag("presents"), PosTag::Verb);
        assert_eq!(tag("-"), PosTag::Hyphen);
        assert_eq!(tag("the"), PosTag::Other);
        assert_eq!(tag("12"), PosTag::Other);
    }

    #[test]
    fn grammar_extracts_adjective_noun_chunks() {
        let tagged = tag_text("We use semantic web technologies to classify proceedings");
        let chunks = semantic_grammar_chunks(&tagged);
        assert!(chunks.contains(&"semantic web technologies".to_string()));
    }

    #[test]
    fn grammar_normalizes_hyphenated_leaves() {
        let tagged = tag_text("novel real-time systems");
        let chunks = semantic_grammar_chunks(&tagged);
        assert_eq!(chunks, vec!["novel real time systems".to_string()]);
    }

    #[test]
    fn stopwords_delimit_chunks() {
        let chunks = stopword_split_chunks("Privacy . typically protected by anonymization .");
        assert_eq!(
            chunks,
            vec![
                "privacy".to_string(),
                "typically protected".to_string(),
                "anonymization".to_string(),
            ]
        );
    }

    #[test]
    fn stopword_comparison_is_case_sensitive() {
        // "We" is not lowercased before the membership test, so it survives.
        let chunks = stopword_split_chunks("We analyze graphs");
        assert_eq!(chunks, vec!["we analyze graphs".to_string()]);
    }

    #[test]
    fn root_verb_is_dropped_once_per_sentence() {
        let tagged = tag_text("Privacy is typically protected. We present a framework");
        let stripped = strip_root_verbs(&tagged);
        assert!(!stripped.contains("is"));
        assert!(!stripped.contains("present"));
        assert!(stripped.contains("protected"));
        assert!(stripped.contains("framework"));
    }
}
