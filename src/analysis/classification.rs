use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::analysis::outlier_removal::PostProcessor;
use crate::analysis::result_assembly::{ClassificationOutput, ResultSet};
use crate::analysis::semantic_matching::SemanticMatcher;
use crate::analysis::syntactic_matching::SyntacticMatcher;
use crate::errors::{Result, TaxotagError};
use crate::parsers::model_parser::EmbeddingStore;
use crate::parsers::ontology_parser::{ClimbMode, Ontology};
use crate::parsers::paper_parser::{Modules, Paper, PaperInput, PaperRecord};

#[derive(Debug, Clone)]
pub struct ClassifierParams {
    pub modules: Modules,
    pub enhancement: ClimbMode,
    pub explanation: bool,
    pub delete_outliers: bool,
    pub fast_classification: bool,
    pub get_weights: bool,
    pub silent: bool,
    pub workers: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            modules: Modules::Both,
            enhancement: ClimbMode::First,
            explanation: false,
            delete_outliers: true,
            fast_classification: true,
            get_weights: false,
            silent: false,
            workers: 1,
        }
    }
}

impl ClassifierParams {
    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 {
            return Err(TaxotagError::Validation(
                "workers must be 1 or greater".to_string(),
            ));
        }
        Ok(())
    }

    /// The full vector store is only needed for outlier removal or for the
    /// live semantic mode.
    pub fn use_full_model(&self) -> bool {
        self.delete_outliers || !self.fast_classification
    }
}

/// Drives the pipeline: preprocessing, the enabled matchers, merge, and
/// post-processing. The ontology and the embedding store are loaded once and
/// shared read-only across batch workers.
pub struct TopicClassifier {
    ontology: Arc<Ontology>,
    store: Arc<EmbeddingStore>,
    params: ClassifierParams,
}

impl TopicClassifier {
    pub fn new(
        ontology: Arc<Ontology>,
        store: Arc<EmbeddingStore>,
        params: ClassifierParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            ontology,
            store,
            params,
        })
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn run(&self, input: &PaperInput) -> ClassificationOutput {
        let paper = Paper::new(input, self.params.modules);
        self.classify_paper(&paper)
    }

    fn classify_paper(&self, paper: &Paper) -> ClassificationOutput {
        let mut result = ResultSet::new(self.params.explanation, self.params.get_weights);

        if self.params.modules.syntactic_enabled() {
            let mut matcher = SyntacticMatcher::new(&self.ontology);
            result.set_syntactic(matcher.classify(paper.syntactic_chunks()));
            if self.params.explanation {
                result.dump_temporary_explanation(matcher.explanation());
            }
            if self.params.get_weights {
                result.set_syntactic_weights(matcher.topic_weights().clone());
            }
        }

        if self.params.modules.semantic_enabled() {
            let mut matcher = SemanticMatcher::new(
                &self.ontology,
                &self.store,
                self.params.fast_classification,
            );
            result.set_semantic(matcher.classify(paper.semantic_chunks()));
            if self.params.explanation {
                result.dump_temporary_explanation(matcher.explanation());
            }
            if self.params.get_weights {
                result.set_semantic_weights(matcher.topic_weights().clone());
            }
        }

        let postprocess = PostProcessor::new(
            &self.ontology,
            &self.store,
            self.params.enhancement,
            self.params.delete_outliers,
        );
        postprocess.process(&mut result);

        result.into_output()
    }

    /// Classifies a map of documents, partitioned into `ceil(N / workers)`
    /// sized chunks. Each worker builds its own matcher state; results merge
    /// by document id and match the single-document runs exactly.
    pub fn batch(
        &self,
        papers: &FxHashMap<String, PaperRecord>,
    ) -> FxHashMap<String, ClassificationOutput> {
        let mut entries: Vec<(&String, &PaperRecord)> = papers.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let chunk_size = entries.len().div_ceil(self.params.workers).max(1);

        entries
            .par_chunks(chunk_size)
            .flat_map_iter(|chunk| {
                chunk.iter().map(|(id, record)| {
                    if !self.params.silent {
                        println!("Processing: {id}");
                    }
                    let input = PaperInput::Record((*record).clone());
                    ((*id).clone(), self.run(&input))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::model_parser::NeighborCache;
    use crate::parsers::ontology_parser::OntologyData;
    use std::str::FromStr;

    fn classifier(params: ClassifierParams) -> Result<TopicClassifier> {
        let mut data = OntologyData::default();
        data.topics.insert("data mining".to_string());
        data.topics_wu
            .insert("data_mining".to_string(), "data mining".to_string());
        let ontology = Ontology::from_data(data);
        let store = EmbeddingStore::from_parts(NeighborCache::default(), Default::default());
        TopicClassifier::new(Arc::new(ontology), Arc::new(store), params)
    }

    #[test]
    fn zero_workers_is_rejected() {
        let params = ClassifierParams {
            workers: 0,
            ..ClassifierParams::default()
        };
        assert!(matches!(
            classifier(params),
            Err(TaxotagError::Validation(_))
        ));
    }

    #[test]
    fn unknown_option_values_are_rejected() {
        assert!(Modules::from_str("syntactical").is_err());
        assert!(ClimbMode::from_str("always").is_err());
        assert!(Modules::from_str("both").is_ok());
        assert!(ClimbMode::from_str("no").is_ok());
    }

    #[test]
    fn full_model_requirement_follows_the_flags() {
        let mut params = ClassifierParams::default();
        assert!(params.use_full_model());

        params.delete_outliers = false;
        assert!(!params.use_full_model());

        params.fast_classification = false;
        assert!(params.use_full_model());
    }

    #[test]
    fn empty_document_produces_empty_sets() {
        let params = ClassifierParams {
            explanation: true,
            silent: true,
            ..ClassifierParams::default()
        };
        let classifier = classifier(params).unwrap();
        let record = PaperRecord::default();
        let output = classifier.run(&record.into());

        assert!(output.syntactic.is_empty());
        assert!(output.semantic.is_empty());
        assert!(output.union.is_empty());
        assert!(output.enhanced.is_empty());
        assert!(output.explanation.unwrap().is_empty());
    }
}
