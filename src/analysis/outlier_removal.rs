use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::analysis::result_assembly::ResultSet;
use crate::parsers::model_parser::EmbeddingStore;
use crate::parsers::ontology_parser::{underscore, ClimbMode, Ontology};
use crate::utils::similarity::{cosine_similarity, metric_lcs};

/// Multiplier on the topic count when picking the edge threshold.
pub const NETWORK_THRESHOLD: f64 = 1.0;

/// Metric-LCS distance under which an excluded topic is rescued by string
/// similarity to a kept one.
const RESCUE_LCS_DISTANCE: f64 = 0.5;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\w+").unwrap();
}

/// Removes topics that are weakly connected to the rest of the union in both
/// the taxonomy graph and the embedding space, then climbs the taxonomy to
/// enhance the survivors.
pub struct PostProcessor<'a> {
    ontology: &'a Ontology,
    store: &'a EmbeddingStore,
    enhancement: ClimbMode,
    delete_outliers: bool,
    network_threshold: f64,
}

impl<'a> PostProcessor<'a> {
    pub fn new(
        ontology: &'a Ontology,
        store: &'a EmbeddingStore,
        enhancement: ClimbMode,
        delete_outliers: bool,
    ) -> Self {
        Self {
            ontology,
            store,
            enhancement,
            delete_outliers,
            network_threshold: NETWORK_THRESHOLD,
        }
    }

    pub fn process(&self, result: &mut ResultSet) {
        if self.delete_outliers && result.union().len() > 1 {
            let kept = self.filter_outliers(result);
            result.retain(&kept);
        }
        let union: Vec<String> = result.union().to_vec();
        let climbed = self.ontology.climb(&union, self.enhancement);
        result.set_enhanced(&climbed);
    }

    fn filter_outliers(&self, result: &ResultSet) -> FxHashSet<String> {
        let topics: Vec<&String> = result.union().iter().collect();
        let n = topics.len();

        let joined = self.joined_matrix(&topics);
        let threshold = self.edge_threshold(&joined);

        // A topic stays when its row clears the threshold more than once
        // (the diagonal always does).
        let selected: Vec<&String> = (0..n)
            .filter(|&i| joined[i].iter().filter(|&&sim| sim >= threshold).count() > 1)
            .map(|i| topics[i])
            .collect();
        let selected_set: FxHashSet<&String> = selected.iter().copied().collect();
        let excluded: Vec<&String> = topics
            .iter()
            .filter(|topic| !selected_set.contains(*topic))
            .copied()
            .collect();

        let mut spared: FxHashSet<String> = FxHashSet::default();
        // Excluded topics that are ancestors of a kept one survive.
        for kept in &selected {
            if let Some(broaders) = self.ontology.all_broaders_of(kept) {
                for topic in &excluded {
                    if broaders.contains(*topic) {
                        spared.insert((*topic).clone());
                    }
                }
            }
        }
        // So do excluded topics close in string space to a kept one.
        for topic in &excluded {
            if selected
                .iter()
                .any(|kept| metric_lcs(topic, kept) < RESCUE_LCS_DISTANCE)
            {
                spared.insert((*topic).clone());
            }
        }

        let mut kept: FxHashSet<String> =
            selected.into_iter().cloned().collect();
        // Multiword syntactic matches are reliable enough to keep outright.
        for topic in result.syntactic() {
            if WORD_RE.find_iter(topic).count() > 1 {
                kept.insert(topic.clone());
            }
        }
        kept.extend(spared);
        kept
    }

    fn joined_matrix(&self, topics: &[&String]) -> Vec<Vec<f64>> {
        let taxonomy = self.taxonomy_matrix(topics);
        let embedding = self.embedding_matrix(topics);

        taxonomy
            .into_iter()
            .zip(embedding)
            .map(|(taxonomy_row, embedding_row)| {
                taxonomy_row
                    .into_iter()
                    .zip(embedding_row)
                    .map(|(a, b)| a.max(b))
                    .collect()
            })
            .collect()
    }

    /// Similarity from taxonomy hop distances: 1 - d / d_max, with the
    /// diagonal at 1. Disconnected pairs enter with distance 99 and end up
    /// near zero.
    fn taxonomy_matrix(&self, topics: &[&String]) -> Vec<Vec<f64>> {
        let n = topics.len();
        let mut distances = vec![vec![0.0f64; n]; n];
        let mut max_distance = 0.0f64;

        for i in 0..n {
            for j in i + 1..n {
                let distance = self.ontology.graph_distance(topics[i], topics[j]) as f64;
                distances[i][j] = distance;
                distances[j][i] = distance;
                if distance > max_distance {
                    max_distance = distance;
                }
            }
        }

        for row in &mut distances {
            for value in row.iter_mut() {
                let normalized = if max_distance > 0.0 {
                    *value / max_distance
                } else {
                    0.0
                };
                *value = 1.0 - normalized;
            }
        }
        distances
    }

    /// Cosine similarity of the label vectors, diagonal at 1. Labels with no
    /// known token have a zero vector and zero similarity to everything.
    fn embedding_matrix(&self, topics: &[&String]) -> Vec<Vec<f64>> {
        let n = topics.len();
        let vectors: Vec<Vec<f32>> = topics
            .iter()
            .map(|topic| self.store.label_vector(&underscore(topic)))
            .collect();

        let mut matrix = vec![vec![0.0f64; n]; n];
        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in i + 1..n {
                let similarity = cosine_similarity(&vectors[i], &vectors[j]);
                matrix[i][j] = similarity;
                matrix[j][i] = similarity;
            }
        }
        matrix
    }

    /// The k-th largest strict-upper-triangle value, k = ceil(threshold * n).
    /// Out-of-range indexes clamp to the weakest edge.
    fn edge_threshold(&self, joined: &[Vec<f64>]) -> f64 {
        let n = joined.len();
        let mut edges: Vec<f64> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| joined[i][j]))
            .collect();
        edges.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let k = (self.network_threshold * n as f64).ceil() as usize;
        edges
            .get(k)
            .copied()
            .unwrap_or_else(|| *edges.last().unwrap())
    }
}
