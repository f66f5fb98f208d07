use rustc_hash::{FxHashMap, FxHashSet};

use crate::parsers::ontology_parser::Ontology;
use crate::utils::similarity::normalized_levenshtein;

pub const DEFAULT_MIN_SIMILARITY: f64 = 0.94;

/// Matches n-grams of the stopword-delimited chunks against ontology labels
/// through the stem buckets. A matched bigram or trigram blocks the smaller
/// n-grams that overlap its token positions.
pub struct SyntacticMatcher<'a> {
    ontology: &'a Ontology,
    min_similarity: f64,
    explanation: FxHashMap<String, FxHashSet<String>>,
    weights: FxHashMap<String, f64>,
}

impl<'a> SyntacticMatcher<'a> {
    pub fn new(ontology: &'a Ontology) -> Self {
        Self {
            ontology,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            explanation: FxHashMap::default(),
            weights: FxHashMap::default(),
        }
    }

    pub fn set_min_similarity(&mut self, min_similarity: f64) {
        self.min_similarity = min_similarity;
    }

    /// Grams that produced each reported topic.
    pub fn explanation(&self) -> &FxHashMap<String, FxHashSet<String>> {
        &self.explanation
    }

    /// Best match ratio observed per reported topic.
    pub fn topic_weights(&self) -> &FxHashMap<String, f64> {
        &self.weights
    }

    pub fn classify(&mut self, chunks: &[String]) -> Vec<String> {
        self.explanation.clear();
        self.weights.clear();

        let mut found = FxHashSet::default();
        let mut found_order = Vec::new();

        for chunk in chunks {
            let tokens: Vec<&str> = chunk.split_whitespace().collect();
            let mut matched_bigrams: FxHashSet<usize> = FxHashSet::default();
            let mut matched_trigrams: FxHashSet<usize> = FxHashSet::default();

            for n in (1..=3usize).rev() {
                if n > tokens.len() {
                    continue;
                }
                for (position, window) in tokens.windows(n).enumerate() {
                    if blocked(&matched_bigrams, position, 2)
                        || blocked(&matched_trigrams, position, 3)
                    {
                        continue;
                    }
                    let gram = window.join(" ");
                    for topic in self.ontology.closest_matches(&gram) {
                        let ratio = normalized_levenshtein(topic, &gram);
                        if ratio < self.min_similarity {
                            continue;
                        }
                        let primary = self.ontology.primary_label(topic).to_string();
                        if found.insert(primary.clone()) {
                            found_order.push(primary.clone());
                        }
                        let weight = self.weights.entry(primary.clone()).or_insert(0.0);
                        if ratio > *weight {
                            *weight = ratio;
                        }

                        if n == 2 {
                            matched_bigrams.insert(position);
                        } else if n == 3 {
                            matched_trigrams.insert(position);
                        }

                        self.explanation
                            .entry(primary)
                            .or_default()
                            .insert(gram.clone());
                    }
                }
            }
        }
        found_order
    }
}

/// An n-gram at `position` overlaps a previously matched gram of `size`
/// when it starts on any of the positions that gram spans.
fn blocked(matched: &FxHashSet<usize>, position: usize, size: usize) -> bool {
    (0..size).any(|offset| position >= offset && matched.contains(&(position - offset)))
}
