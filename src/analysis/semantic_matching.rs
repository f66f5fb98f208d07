use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::knee_detection::score_cutoff;
use crate::parsers::model_parser::{EmbeddingStore, NeighborTopic, TOP_SIMILAR_WORDS};
use crate::parsers::ontology_parser::{space_form, underscore, Ontology};
use crate::utils::similarity::normalized_levenshtein;

pub const DEFAULT_MIN_SIMILARITY: f64 = 0.94;

#[derive(Debug, Default, Clone)]
struct TopicTally {
    times: usize,
    grams: FxHashMap<String, usize>,
    gram_similarity: Vec<f64>,
    embedding_similarity: f64,
    embedding_matched: String,
    syntactic: bool,
}

/// Maps n-grams of the concept chunks to ontology topics through the word
/// embedding neighborhood, then ranks the accumulated candidates and cuts
/// the ranking at its knee.
pub struct SemanticMatcher<'a> {
    ontology: &'a Ontology,
    store: &'a EmbeddingStore,
    fast_classification: bool,
    min_similarity: f64,
    explanation: FxHashMap<String, FxHashSet<String>>,
    weights: FxHashMap<String, f64>,
}

impl<'a> SemanticMatcher<'a> {
    pub fn new(ontology: &'a Ontology, store: &'a EmbeddingStore, fast_classification: bool) -> Self {
        Self {
            ontology,
            store,
            fast_classification,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            explanation: FxHashMap::default(),
            weights: FxHashMap::default(),
        }
    }

    pub fn set_min_similarity(&mut self, min_similarity: f64) {
        self.min_similarity = min_similarity;
    }

    pub fn explanation(&self) -> &FxHashMap<String, FxHashSet<String>> {
        &self.explanation
    }

    /// Knee-normalized score per retained topic, in [0, 1].
    pub fn topic_weights(&self) -> &FxHashMap<String, f64> {
        &self.weights
    }

    pub fn classify(&mut self, chunks: &[String]) -> Vec<String> {
        self.explanation.clear();
        self.weights.clear();

        let mut found: FxHashMap<String, TopicTally> = FxHashMap::default();
        let mut temp_explanation: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();

        for chunk in chunks {
            let tokens: Vec<&str> = chunk.split_whitespace().collect();
            let max_n = tokens.len().min(3);
            for n in 1..=max_n {
                for window in tokens.windows(n) {
                    let gram_u = window.join("_");
                    let gram = window.join(" ");

                    let candidates = if self.fast_classification {
                        self.cached_candidates(&gram_u, window)
                    } else {
                        self.live_candidates(&gram_u, window)
                    };

                    for item in candidates {
                        if item.sim_t < self.min_similarity
                            || !self.ontology.is_topic_wu(&item.topic)
                        {
                            continue;
                        }
                        let tally = found.entry(item.topic.clone()).or_default();
                        tally.times += 1;
                        tally.gram_similarity.push(item.sim_w);
                        *tally.grams.entry(gram_u.clone()).or_insert(0) += 1;
                        if item.sim_t > tally.embedding_similarity {
                            tally.embedding_similarity = item.sim_t;
                            tally.embedding_matched = item.wet.clone();
                        }
                        if item.sim_w == 1.0 {
                            tally.syntactic = true;
                        }

                        let primary = self.ontology.primary_label_wu(&item.topic).to_string();
                        temp_explanation
                            .entry(primary)
                            .or_default()
                            .insert(gram.clone());
                    }
                }
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            for (topic, tally) in &found {
                log::debug!(
                    "candidate {topic}: times={} grams={} best '{}' ({:.2}) word sims {:?}",
                    tally.times,
                    tally.grams.len(),
                    tally.embedding_matched,
                    tally.embedding_similarity,
                    tally.gram_similarity,
                );
            }
        }

        self.rank(&found, &temp_explanation)
    }

    /// Cached-model lookup. A miss on a multi-token gram falls back to the
    /// unigram entries, keeping only topics supported by every token.
    fn cached_candidates(&self, gram_u: &str, window: &[&str]) -> Vec<NeighborTopic> {
        if self.store.has_cached(gram_u) {
            return self.store.neighbors(gram_u).to_vec();
        }
        if window.len() > 1 {
            self.merged_unigram_candidates(window)
        } else {
            Vec::new()
        }
    }

    fn merged_unigram_candidates(&self, window: &[&str]) -> Vec<NeighborTopic> {
        let mut support: FxHashMap<String, usize> = FxHashMap::default();
        let mut last_match: FxHashMap<String, NeighborTopic> = FxHashMap::default();

        for token in window {
            for item in self.store.neighbors(token) {
                *support.entry(item.topic.clone()).or_insert(0) += 1;
                last_match.insert(item.topic.clone(), item.clone());
            }
        }

        let mut merged: Vec<NeighborTopic> = support
            .iter()
            .filter(|(_, &count)| count >= window.len())
            .map(|(topic, _)| last_match[topic].clone())
            .collect();
        merged.sort_by(|a, b| a.topic.cmp(&b.topic));
        merged
    }

    /// Live vector lookup: nearest vocabulary words of the gram (or of its
    /// tokens when the joined gram has no vector), plus the gram itself,
    /// refined against the stem buckets.
    fn live_candidates(&self, gram_u: &str, window: &[&str]) -> Vec<NeighborTopic> {
        let mut similar = if self.store.has_vector(gram_u) {
            self.store.similar_words(&[gram_u], TOP_SIMILAR_WORDS)
        } else {
            self.store.similar_words(window, TOP_SIMILAR_WORDS)
        };
        similar.push((gram_u.to_string(), 1.0));

        let mut identified = Vec::new();
        for (word, sim_w) in similar {
            for topic in self.ontology.closest_matches(&space_form(&word)) {
                let topic_wu = underscore(topic);
                let sim_t = normalized_levenshtein(&topic_wu, &word);
                if sim_t >= self.min_similarity {
                    identified.push(NeighborTopic {
                        topic: topic_wu,
                        sim_t,
                        wet: word.clone(),
                        sim_w,
                    });
                }
            }
        }
        identified
    }

    fn rank(
        &mut self,
        found: &FxHashMap<String, TopicTally>,
        explanation: &FxHashMap<String, FxHashSet<String>>,
    ) -> Vec<String> {
        if found.is_empty() {
            return Vec::new();
        }

        let mut scores: FxHashMap<&String, f64> = found
            .iter()
            .map(|(topic, tally)| (topic, (tally.times * tally.grams.len()) as f64))
            .collect();
        let max_score = scores.values().cloned().fold(0.0, f64::max);

        // A topic whose exact token was in the vocabulary ties with the top
        // of the ranking.
        for (topic, tally) in found {
            if tally.syntactic {
                scores.insert(topic, max_score);
            }
        }

        // Collapse clusters to their primary label, keeping the best score.
        let mut unique: FxHashMap<String, f64> = FxHashMap::default();
        for (topic, score) in &scores {
            let primary = self.ontology.primary_label_wu(topic).to_string();
            let entry = unique.entry(primary).or_insert(f64::MIN);
            if *score > *entry {
                *entry = *score;
            }
        }

        let mut ranked: Vec<(String, f64)> = unique.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let values: Vec<f64> = ranked.iter().map(|(_, score)| *score).collect();
        let cutoff = score_cutoff(&values);

        let mut selected = Vec::new();
        for (label_wu, score) in &ranked {
            if *score < cutoff {
                continue;
            }
            let topic = self.ontology.topic_from_wu(label_wu).to_string();
            let weight = if max_score > 0.0 { score / max_score } else { 0.0 };
            self.weights.insert(topic.clone(), weight);
            if let Some(grams) = explanation.get(label_wu) {
                self.explanation.insert(topic.clone(), grams.clone());
            }
            selected.push(topic);
        }
        selected
    }
}
