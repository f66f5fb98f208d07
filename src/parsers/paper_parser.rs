use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::TaxotagError;
use crate::utils::pos_tagger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Modules {
    Syntactic,
    Semantic,
    Both,
}

impl Modules {
    pub fn syntactic_enabled(self) -> bool {
        matches!(self, Modules::Syntactic | Modules::Both)
    }

    pub fn semantic_enabled(self) -> bool {
        matches!(self, Modules::Semantic | Modules::Both)
    }
}

impl FromStr for Modules {
    type Err = TaxotagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syntactic" => Ok(Modules::Syntactic),
            "semantic" => Ok(Modules::Semantic),
            "both" => Ok(Modules::Both),
            other => Err(TaxotagError::Validation(format!(
                "modules must be 'syntactic', 'semantic' or 'both', got '{other}'"
            ))),
        }
    }
}

/// Keyword field of an input record: either one comma-separated string or a
/// list of keyword strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    fn flatten(&self) -> String {
        match self {
            Keywords::One(keywords) => keywords.clone(),
            Keywords::Many(list) => list.join(", "),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Option<Keywords>,
}

#[derive(Debug, Clone)]
pub enum PaperInput {
    Record(PaperRecord),
    Text(String),
}

impl From<PaperRecord> for PaperInput {
    fn from(record: PaperRecord) -> Self {
        PaperInput::Record(record)
    }
}

impl From<&str> for PaperInput {
    fn from(text: &str) -> Self {
        PaperInput::Text(text.to_string())
    }
}

/// A preprocessed document. Built once per request, never mutated after.
#[derive(Debug, Default, Clone)]
pub struct Paper {
    text: String,
    semantic_chunks: Vec<String>,
    syntactic_chunks: Vec<String>,
}

impl Paper {
    pub fn new(input: &PaperInput, modules: Modules) -> Self {
        let text = match input {
            PaperInput::Text(text) => text.trim().to_string(),
            PaperInput::Record(record) => join_fields(record),
        };
        let mut paper = Paper {
            text,
            ..Paper::default()
        };
        paper.preprocess(modules);
        paper
    }

    fn preprocess(&mut self, modules: Modules) {
        let tagged = pos_tagger::tag_text(&self.text);
        if modules.syntactic_enabled() {
            let filtered = pos_tagger::strip_root_verbs(&tagged);
            self.syntactic_chunks = pos_tagger::stopword_split_chunks(&filtered);
        }
        if modules.semantic_enabled() {
            self.semantic_chunks = pos_tagger::semantic_grammar_chunks(&tagged);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn semantic_chunks(&self) -> &[String] {
        &self.semantic_chunks
    }

    pub fn syntactic_chunks(&self) -> &[String] {
        &self.syntactic_chunks
    }
}

fn join_fields(record: &PaperRecord) -> String {
    let keywords = record.keywords.as_ref().map(Keywords::flatten);
    [
        record.title.as_deref(),
        record.abstract_text.as_deref(),
        keywords.as_deref(),
    ]
    .iter()
    .flatten()
    .map(|field| field.trim_end_matches('.'))
    .collect::<Vec<_>>()
    .join(". ")
}
