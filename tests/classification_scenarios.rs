use std::io::Write;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use taxotag::analysis::classification::{ClassifierParams, TopicClassifier};
use taxotag::analysis::result_assembly::ClassificationOutput;
use taxotag::parsers::model_parser::{EmbeddingStore, NeighborCache, NeighborTopic};
use taxotag::parsers::ontology_parser::{ClimbMode, Ontology};
use taxotag::parsers::paper_parser::{Keywords, Modules, PaperRecord};

const TAXONOMY_TRIPLES: &str = "\
computer science;rdfs:label;computer science
artificial intelligence;rdfs:label;artificial intelligence
knowledge representation;rdfs:label;knowledge representation
ontology;rdfs:label;ontology
semantic web;rdfs:label;semantic web
world wide web;rdfs:label;world wide web
social networks;rdfs:label;social networks
social networking;rdfs:label;social networking
social networking (online);rdfs:label;social networking (online)
scholarly communication;rdfs:label;scholarly communication
computer security;rdfs:label;computer security
data privacy;rdfs:label;data privacy
anonymization;rdfs:label;anonymization
data mining;rdfs:label;data mining
theoretical computer science;rdfs:label;theoretical computer science
graph theory;rdfs:label;graph theory
quantum physics;rdfs:label;quantum physics
quantum computing;rdfs:label;quantum computing
computer science;klink:broaderGeneric;artificial intelligence
artificial intelligence;klink:broaderGeneric;knowledge representation
knowledge representation;klink:broaderGeneric;ontology
semantic web;klink:broaderGeneric;ontology
world wide web;klink:broaderGeneric;semantic web
computer science;klink:broaderGeneric;world wide web
world wide web;klink:broaderGeneric;social networks
social networks;klink:broaderGeneric;social networking
world wide web;klink:broaderGeneric;scholarly communication
computer science;klink:broaderGeneric;computer security
computer security;klink:broaderGeneric;data privacy
data privacy;klink:broaderGeneric;anonymization
computer science;klink:broaderGeneric;data mining
computer science;klink:broaderGeneric;theoretical computer science
theoretical computer science;klink:broaderGeneric;graph theory
quantum physics;klink:broaderGeneric;quantum computing
social networking;klink:relatedEquivalent;social networking (online)
social networking (online);klink:relatedEquivalent;social networking
social networking (online);klink:primaryLabel;social networking
";

fn build_ontology() -> Ontology {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TAXONOMY_TRIPLES.as_bytes()).unwrap();
    Ontology::from_triple_file(file.path()).unwrap()
}

fn exact(topic: &str) -> Vec<NeighborTopic> {
    vec![NeighborTopic {
        topic: topic.to_string(),
        sim_t: 1.0,
        wet: topic.to_string(),
        sim_w: 1.0,
    }]
}

fn build_store(inject_outlier: bool) -> EmbeddingStore {
    let mut cache = NeighborCache::default();
    cache.insert("anonymization".to_string(), exact("anonymization"));
    cache.insert("social_networks".to_string(), exact("social_networks"));
    cache.insert("ontology".to_string(), exact("ontology"));
    cache.insert("semantic_web".to_string(), exact("semantic_web"));
    cache.insert(
        "scholarly_communication".to_string(),
        exact("scholarly_communication"),
    );
    if inject_outlier {
        // A synthetic entry steering a common token of the privacy paper
        // towards an unrelated topic.
        cache.insert(
            "networks".to_string(),
            vec![NeighborTopic {
                topic: "quantum_computing".to_string(),
                sim_t: 0.95,
                wet: "networks".to_string(),
                sim_w: 0.9,
            }],
        );
    }
    EmbeddingStore::from_parts(cache, FxHashMap::default())
}

fn deanonymization_paper() -> PaperRecord {
    PaperRecord {
        title: Some("De-anonymizing Social Networks".to_string()),
        abstract_text: Some(
            "Operators of online social networks are increasingly sharing potentially \
             sensitive information about users and their relationships with advertisers, \
             application developers, and data-mining researchers. Privacy is typically \
             protected by anonymization, i.e., removing names, addresses, etc. We present \
             a framework for analyzing privacy and anonymity in social networks and develop \
             a new re-identification algorithm targeting anonymized social-network graphs. \
             To demonstrate its effectiveness on real-world networks, we show that a third \
             of the users who can be verified to have accounts on both Twitter, a popular \
             microblogging service, and Flickr, an online photo-sharing site, can be \
             re-identified in the anonymous Twitter graph with only a 12% error rate."
                .to_string(),
        ),
        keywords: Some(Keywords::One(
            "data mining, data privacy, graph theory, social networking (online)".to_string(),
        )),
    }
}

fn smart_topic_miner_paper() -> PaperRecord {
    PaperRecord {
        title: Some(
            "Automatic Classification of Springer Nature Proceedings with Smart Topic Miner"
                .to_string(),
        ),
        abstract_text: Some(
            "The process of classifying scholarly outputs is crucial to ensure timely access \
             to knowledge. In this paper we present Smart Topic Miner, a novel solution which \
             uses semantic web technologies to classify scholarly publications on the basis \
             of a very large automatically generated ontology of research areas."
                .to_string(),
        ),
        keywords: Some(Keywords::Many(vec![
            "scholarly communication".to_string(),
            "semantic web".to_string(),
            "ontology learning".to_string(),
            "bibliographic data".to_string(),
        ])),
    }
}

fn classifier(params: ClassifierParams, inject_outlier: bool) -> TopicClassifier {
    TopicClassifier::new(
        Arc::new(build_ontology()),
        Arc::new(build_store(inject_outlier)),
        params,
    )
    .unwrap()
}

fn contains(topics: &[String], expected: &str) -> bool {
    topics.iter().any(|topic| topic == expected)
}

fn assert_output_invariants(output: &ClassificationOutput) {
    // union == syntactic ∪ semantic (when pruning is off the merge order is
    // first-seen; either way membership must agree)
    for topic in output.syntactic.iter().chain(output.semantic.iter()) {
        assert!(contains(&output.union, topic), "union misses {topic}");
    }
    for topic in &output.enhanced {
        assert!(!contains(&output.union, topic), "enhanced overlaps union");
    }
}

#[test]
fn deanonymization_paper_is_classified() {
    let params = ClassifierParams {
        explanation: true,
        silent: true,
        ..ClassifierParams::default()
    };
    let classifier = classifier(params, false);
    let output = classifier.run(&deanonymization_paper().into());

    for expected in [
        "data mining",
        "data privacy",
        "graph theory",
        "social networking",
    ] {
        assert!(
            contains(&output.syntactic, expected),
            "syntactic misses {expected}: {:?}",
            output.syntactic
        );
    }
    assert!(contains(&output.semantic, "anonymization"));

    // A broader of "social networking" (or higher) must be inferred.
    assert!(
        contains(&output.enhanced, "social networks")
            || contains(&output.enhanced, "world wide web"),
        "enhanced misses a broader of social networking: {:?}",
        output.enhanced
    );
    assert_output_invariants(&output);

    // The clustered keyword label is reported under its primary label.
    assert!(!contains(&output.union, "social networking (online)"));

    // Every reported topic carries an explanation.
    let explanation = output.explanation.as_ref().unwrap();
    for topic in output.union.iter().chain(output.enhanced.iter()) {
        let chunks = explanation
            .get(topic)
            .unwrap_or_else(|| panic!("no explanation for {topic}"));
        assert!(!chunks.is_empty());
    }
    assert!(explanation["data mining"].contains(&"data mining".to_string()));
}

#[test]
fn smart_topic_miner_paper_is_classified() {
    let params = ClassifierParams {
        delete_outliers: false,
        silent: true,
        ..ClassifierParams::default()
    };
    let classifier = classifier(params, false);
    let output = classifier.run(&smart_topic_miner_paper().into());

    for expected in ["ontology", "semantic web", "scholarly communication"] {
        assert!(
            contains(&output.union, expected),
            "union misses {expected}: {:?}",
            output.union
        );
    }
    // "knowledge representation" is a broader of "ontology" outside the union.
    assert!(
        contains(&output.enhanced, "knowledge representation"),
        "enhanced misses a broader of ontology: {:?}",
        output.enhanced
    );
    assert_output_invariants(&output);
}

#[test]
fn empty_input_produces_empty_output() {
    let params = ClassifierParams {
        explanation: true,
        silent: true,
        ..ClassifierParams::default()
    };
    let classifier = classifier(params, false);
    let record = PaperRecord {
        title: Some(String::new()),
        abstract_text: Some(String::new()),
        keywords: Some(Keywords::One(String::new())),
    };
    let output = classifier.run(&record.into());

    assert!(output.syntactic.is_empty());
    assert!(output.semantic.is_empty());
    assert!(output.union.is_empty());
    assert!(output.enhanced.is_empty());
    assert!(output.explanation.unwrap().is_empty());
}

#[test]
fn batch_matches_individual_runs() {
    let params = ClassifierParams {
        explanation: true,
        silent: true,
        workers: 2,
        ..ClassifierParams::default()
    };
    let classifier = classifier(params, false);

    let mut papers = FxHashMap::default();
    papers.insert("paper1".to_string(), deanonymization_paper());
    papers.insert("paper2".to_string(), smart_topic_miner_paper());

    let batch = classifier.batch(&papers);
    assert_eq!(batch.len(), 2);

    for (id, record) in &papers {
        let single = classifier.run(&record.clone().into());
        let batched = &batch[id];
        assert_eq!(batched.syntactic, single.syntactic, "syntactic of {id}");
        assert_eq!(batched.semantic, single.semantic, "semantic of {id}");
        assert_eq!(batched.union, single.union, "union of {id}");
        assert_eq!(batched.enhanced, single.enhanced, "enhanced of {id}");
    }
}

#[test]
fn injected_outlier_is_pruned_only_when_enabled() {
    let pruning = ClassifierParams {
        silent: true,
        ..ClassifierParams::default()
    };
    let keeping = ClassifierParams {
        delete_outliers: false,
        silent: true,
        ..ClassifierParams::default()
    };

    let with_pruning = classifier(pruning, true).run(&deanonymization_paper().into());
    assert!(
        !contains(&with_pruning.union, "quantum computing"),
        "outlier survived pruning: {:?}",
        with_pruning.union
    );

    let without_pruning = classifier(keeping, true).run(&deanonymization_paper().into());
    assert!(
        contains(&without_pruning.union, "quantum computing"),
        "outlier missing without pruning: {:?}",
        without_pruning.union
    );

    // Pruning is monotone: it only ever removes topics.
    for topic in &with_pruning.union {
        assert!(contains(&without_pruning.union, topic));
    }
}

#[test]
fn enhancement_all_is_a_superset_of_first() {
    let first = ClassifierParams {
        delete_outliers: false,
        silent: true,
        ..ClassifierParams::default()
    };
    let all = ClassifierParams {
        enhancement: ClimbMode::All,
        delete_outliers: false,
        silent: true,
        ..ClassifierParams::default()
    };

    let paper = smart_topic_miner_paper();
    let first_output = classifier(first, false).run(&paper.clone().into());
    let all_output = classifier(all, false).run(&paper.into());

    assert_eq!(first_output.union, all_output.union);
    for topic in &first_output.enhanced {
        assert!(
            contains(&all_output.enhanced, topic),
            "all-enhancement misses {topic}"
        );
    }
    assert!(contains(&all_output.enhanced, "computer science"));
    assert_output_invariants(&first_output);
    assert_output_invariants(&all_output);
}

#[test]
fn syntactic_only_module_selection() {
    let params = ClassifierParams {
        modules: Modules::Syntactic,
        delete_outliers: false,
        silent: true,
        ..ClassifierParams::default()
    };
    let classifier = classifier(params, false);
    let output = classifier.run(&deanonymization_paper().into());

    assert!(output.semantic.is_empty());
    assert_eq!(output.syntactic, output.union);
}

#[test]
fn ontology_load_creates_and_reuses_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let triple_path = dir.path().join("taxonomy.csv");
    std::fs::write(&triple_path, TAXONOMY_TRIPLES).unwrap();
    let cache_path = dir.path().join("taxonomy.cache.json");

    let ontology = Ontology::load(&triple_path, Some(&cache_path)).unwrap();
    assert!(cache_path.exists());

    let reloaded = Ontology::load(&triple_path, Some(&cache_path)).unwrap();
    assert_eq!(reloaded.topic_count(), ontology.topic_count());
    assert_eq!(
        reloaded.primary_label("social networking (online)"),
        "social networking"
    );
}
