use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::parsers::ontology_parser::EnhancedTopic;

/// Final shape of one classification, serialized as the caller-facing JSON.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ClassificationOutput {
    pub syntactic: Vec<String>,
    pub semantic: Vec<String>,
    pub union: Vec<String>,
    pub enhanced: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<FxHashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntactic_weights: Option<FxHashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_weights: Option<FxHashMap<String, f64>>,
}

/// Incrementally built result of one classification. The union tracks the
/// two module outputs; the explanation accumulates until finalization
/// restricts it to the reported topics.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    syntactic: Vec<String>,
    semantic: Vec<String>,
    union: Vec<String>,
    enhanced: Vec<String>,
    explanation: FxHashMap<String, FxHashSet<String>>,
    explanation_enabled: bool,
    weights_enabled: bool,
    syntactic_weights: FxHashMap<String, f64>,
    semantic_weights: FxHashMap<String, f64>,
}

impl ResultSet {
    pub fn new(explanation_enabled: bool, weights_enabled: bool) -> Self {
        Self {
            explanation_enabled,
            weights_enabled,
            ..Self::default()
        }
    }

    pub fn set_syntactic(&mut self, topics: Vec<String>) {
        self.syntactic = topics;
        self.merge();
    }

    pub fn set_semantic(&mut self, topics: Vec<String>) {
        self.semantic = topics;
        self.merge();
    }

    pub fn syntactic(&self) -> &[String] {
        &self.syntactic
    }

    pub fn semantic(&self) -> &[String] {
        &self.semantic
    }

    pub fn union(&self) -> &[String] {
        &self.union
    }

    pub fn enhanced(&self) -> &[String] {
        &self.enhanced
    }

    fn merge(&mut self) {
        let mut seen = FxHashSet::default();
        self.union = self
            .syntactic
            .iter()
            .chain(self.semantic.iter())
            .filter(|topic| seen.insert((*topic).clone()))
            .cloned()
            .collect();
    }

    /// Keeps only the given topics in the module outputs and the union,
    /// preserving their order.
    pub fn retain(&mut self, kept: &FxHashSet<String>) {
        self.syntactic.retain(|topic| kept.contains(topic));
        self.semantic.retain(|topic| kept.contains(topic));
        self.union.retain(|topic| kept.contains(topic));
    }

    pub fn dump_temporary_explanation(
        &mut self,
        temporary: &FxHashMap<String, FxHashSet<String>>,
    ) {
        if !self.explanation_enabled {
            return;
        }
        for (topic, chunks) in temporary {
            self.explanation
                .entry(topic.clone())
                .or_default()
                .extend(chunks.iter().cloned());
        }
    }

    pub fn set_syntactic_weights(&mut self, weights: FxHashMap<String, f64>) {
        self.syntactic_weights = weights;
    }

    pub fn set_semantic_weights(&mut self, weights: FxHashMap<String, f64>) {
        self.semantic_weights = weights;
    }

    /// Records the climbed topics that are not already in the union, and
    /// finalizes the explanation map.
    pub fn set_enhanced(&mut self, climbed: &FxHashMap<String, EnhancedTopic>) {
        let union_set: FxHashSet<&String> = self.union.iter().collect();
        let mut enhanced: Vec<String> = climbed
            .keys()
            .filter(|topic| !union_set.contains(topic))
            .cloned()
            .collect();
        enhanced.sort();
        self.enhanced = enhanced;
        self.complete_explanation(climbed);
    }

    /// An enhanced topic inherits the explanations of the narrowers that
    /// induced it; afterwards the map is restricted to the reported topics.
    fn complete_explanation(&mut self, climbed: &FxHashMap<String, EnhancedTopic>) {
        if !self.explanation_enabled {
            return;
        }

        let mut updates: Vec<(String, FxHashSet<String>)> = Vec::new();
        for (topic, enhanced) in climbed {
            let mut merged = self.explanation.get(topic).cloned().unwrap_or_default();
            for narrower in &enhanced.broader_of {
                if let Some(chunks) = self.explanation.get(narrower) {
                    merged.extend(chunks.iter().cloned());
                }
            }
            updates.push((topic.clone(), merged));
        }
        for (topic, merged) in updates {
            self.explanation.insert(topic, merged);
        }

        let reported: FxHashSet<&String> =
            self.union.iter().chain(self.enhanced.iter()).collect();
        self.explanation.retain(|topic, _| reported.contains(topic));
    }

    pub fn into_output(self) -> ClassificationOutput {
        let explanation = self.explanation_enabled.then(|| {
            self.explanation
                .into_iter()
                .map(|(topic, chunks)| {
                    let mut chunks: Vec<String> = chunks.into_iter().collect();
                    chunks.sort();
                    (topic, chunks)
                })
                .collect()
        });

        ClassificationOutput {
            syntactic: self.syntactic,
            semantic: self.semantic,
            union: self.union,
            enhanced: self.enhanced,
            explanation,
            syntactic_weights: self.weights_enabled.then_some(self.syntactic_weights),
            semantic_weights: self.weights_enabled.then_some(self.semantic_weights),
        }
    }
}
