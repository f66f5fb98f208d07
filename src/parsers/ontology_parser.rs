use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use csv::ReaderBuilder;
use log::warn;
use petgraph::graph::{NodeIndex, UnGraph};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaxotagError};

/// Hop count reported for node pairs that are absent or unreachable.
pub const DISCONNECTED_DISTANCE: usize = 99;

const STEM_LENGTH: usize = 4;

const BROADER_PREDICATE: &str = "klink:broaderGeneric";
const EQUIVALENT_PREDICATE: &str = "klink:relatedEquivalent";
const LABEL_PREDICATE: &str = "rdfs:label";
const PRIMARY_LABEL_PREDICATE: &str = "klink:primaryLabel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClimbMode {
    No,
    First,
    All,
}

impl FromStr for ClimbMode {
    type Err = TaxotagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no" => Ok(ClimbMode::No),
            "first" => Ok(ClimbMode::First),
            "all" => Ok(ClimbMode::All),
            other => Err(TaxotagError::Validation(format!(
                "enhancement must be 'first', 'all' or 'no', got '{other}'"
            ))),
        }
    }
}

pub fn underscore(label: &str) -> String {
    label.replace(' ', "_")
}

pub fn space_form(label: &str) -> String {
    label.replace('_', " ")
}

/// Derived taxonomy structures. Serialized as-is for the disk cache; the
/// undirected graph is rebuilt from `broaders` on load.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OntologyData {
    pub topics: FxHashSet<String>,
    pub topics_wu: FxHashMap<String, String>,
    pub broaders: FxHashMap<String, Vec<String>>,
    pub narrowers: FxHashMap<String, Vec<String>>,
    pub same_as: FxHashMap<String, Vec<String>>,
    pub primary_labels: FxHashMap<String, String>,
    pub primary_labels_wu: FxHashMap<String, String>,
    pub topic_stems: FxHashMap<String, Vec<String>>,
    pub all_broaders: FxHashMap<String, FxHashSet<String>>,
}

impl OntologyData {
    /// Builds the stem buckets and the transitive-ancestor index.
    pub fn finalise(&mut self) {
        self.topic_stems.clear();
        for topic in &self.topics {
            let stem: String = topic.chars().take(STEM_LENGTH).collect();
            self.topic_stems.entry(stem).or_default().push(topic.clone());
        }
        for bucket in self.topic_stems.values_mut() {
            bucket.sort();
        }

        let topics: Vec<&String> = self.topics.iter().collect();
        self.all_broaders = topics
            .par_iter()
            .map(|topic| {
                (
                    (*topic).clone(),
                    transitive_broaders(&self.broaders, topic.as_str()),
                )
            })
            .collect();
    }
}

fn transitive_broaders(
    broaders: &FxHashMap<String, Vec<String>>,
    topic: &str,
) -> FxHashSet<String> {
    let mut ancestors = FxHashSet::default();
    let mut to_visit: Vec<&String> = broaders
        .get(topic)
        .map(|parents| parents.iter().collect())
        .unwrap_or_default();

    while let Some(current) = to_visit.pop() {
        if ancestors.insert(current.clone()) {
            if let Some(parents) = broaders.get(current) {
                to_visit.extend(parents.iter());
            }
        }
    }
    ancestors
}

/// Topics discovered by climbing, keyed by their primary label.
#[derive(Debug, Clone)]
pub struct EnhancedTopic {
    pub matched: usize,
    pub broader_of: Vec<String>,
}

#[derive(Debug)]
pub struct Ontology {
    pub data: OntologyData,
    graph: UnGraph<(), ()>,
    node_indices: FxHashMap<String, NodeIndex>,
}

pub fn parse_triple_file(path: impl AsRef<Path>) -> Result<OntologyData> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TaxotagError::AssetMissing(path.to_path_buf()));
    }
    let file = File::open(path)?;
    parse_triples(BufReader::with_capacity(1024 * 1024, file))
}

fn parse_triples<R: Read>(reader: R) -> Result<OntologyData> {
    let mut data = OntologyData::default();
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("discarding malformed triple: {e}");
                continue;
            }
        };
        let (Some(subject), Some(predicate), Some(object)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            warn!("discarding triple with missing fields: {record:?}");
            continue;
        };

        match predicate {
            // subject is the broader topic, object the narrower one
            BROADER_PREDICATE => {
                data.broaders
                    .entry(object.to_string())
                    .or_default()
                    .push(subject.to_string());
                data.narrowers
                    .entry(subject.to_string())
                    .or_default()
                    .push(object.to_string());
            }
            EQUIVALENT_PREDICATE => {
                data.same_as
                    .entry(object.to_string())
                    .or_default()
                    .push(subject.to_string());
            }
            LABEL_PREDICATE => {
                data.topics.insert(subject.to_string());
                data.topics_wu.insert(underscore(subject), subject.to_string());
            }
            PRIMARY_LABEL_PREDICATE => {
                data.primary_labels
                    .insert(subject.to_string(), object.to_string());
                data.primary_labels_wu
                    .insert(underscore(subject), underscore(object));
            }
            other => warn!("discarding triple with unknown predicate: {other}"),
        }
    }
    Ok(data)
}

impl Ontology {
    pub fn from_data(mut data: OntologyData) -> Self {
        if data.topic_stems.is_empty() || data.all_broaders.is_empty() {
            data.finalise();
        }

        let mut graph = UnGraph::<(), ()>::new_undirected();
        let mut node_indices =
            FxHashMap::with_capacity_and_hasher(data.topics.len(), Default::default());
        for topic in &data.topics {
            node_indices.insert(topic.clone(), graph.add_node(()));
        }
        for (narrower, broaders) in &data.broaders {
            let Some(&source) = node_indices.get(narrower) else {
                continue;
            };
            for broader in broaders {
                let Some(&target) = node_indices.get(broader) else {
                    continue;
                };
                graph.add_edge(source, target, ());
            }
        }

        Self {
            data,
            graph,
            node_indices,
        }
    }

    pub fn from_triple_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut data = parse_triple_file(path)?;
        data.finalise();
        Ok(Self::from_data(data))
    }

    pub fn from_cache_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TaxotagError::AssetMissing(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let data: OntologyData = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::from_data(data))
    }

    /// Loads the ontology, preferring the derived-structure cache when it
    /// exists. A cache miss parses the triple source and writes the cache
    /// back, best effort.
    pub fn load(triple_path: impl AsRef<Path>, cache_path: Option<&Path>) -> Result<Self> {
        if let Some(cache) = cache_path {
            if cache.exists() {
                return Self::from_cache_file(cache);
            }
        }
        let ontology = Self::from_triple_file(triple_path)?;
        if let Some(cache) = cache_path {
            if let Err(e) = ontology.write_cache(cache) {
                warn!("could not write ontology cache to {}: {e}", cache.display());
            }
        }
        Ok(ontology)
    }

    pub fn write_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &self.data)?;
        Ok(())
    }

    pub fn topic_count(&self) -> usize {
        self.data.topics.len()
    }

    pub fn is_topic(&self, label: &str) -> bool {
        self.data.topics.contains(label)
    }

    pub fn is_topic_wu(&self, label_wu: &str) -> bool {
        self.data.topics_wu.contains_key(label_wu)
    }

    /// Cluster representative of a topic; the topic itself when unclustered.
    pub fn primary_label<'a>(&'a self, topic: &'a str) -> &'a str {
        self.data
            .primary_labels
            .get(topic)
            .map(String::as_str)
            .unwrap_or(topic)
    }

    pub fn primary_label_wu<'a>(&'a self, topic_wu: &'a str) -> &'a str {
        self.data
            .primary_labels_wu
            .get(topic_wu)
            .map(String::as_str)
            .unwrap_or(topic_wu)
    }

    /// Space-form label for an underscore-form topic; identity when unknown.
    pub fn topic_from_wu<'a>(&'a self, topic_wu: &'a str) -> &'a str {
        self.data
            .topics_wu
            .get(topic_wu)
            .map(String::as_str)
            .unwrap_or(topic_wu)
    }

    /// Topics sharing the first four characters with the given word.
    pub fn closest_matches(&self, word: &str) -> &[String] {
        let stem: String = word.chars().take(STEM_LENGTH).collect();
        self.data
            .topic_stems
            .get(&stem)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_broaders_of(&self, topic: &str) -> Option<&FxHashSet<String>> {
        self.data.all_broaders.get(topic)
    }

    /// Shortest hop count between two topics on the undirected taxonomy
    /// graph. 99 when either node is absent or no path exists.
    pub fn graph_distance(&self, a: &str, b: &str) -> usize {
        let (Some(&start), Some(&goal)) = (self.node_indices.get(a), self.node_indices.get(b))
        else {
            return DISCONNECTED_DISTANCE;
        };
        if start == goal {
            return 0;
        }

        let mut distances: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut queue = VecDeque::new();
        distances.insert(start, 0);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let distance = distances[&current];
            for neighbor in self.graph.neighbors(current) {
                if neighbor == goal {
                    return distance + 1;
                }
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, distance + 1);
                    queue.push_back(neighbor);
                }
            }
        }
        DISCONNECTED_DISTANCE
    }

    /// Collects the broader topics of the given set. `First` takes one step
    /// up, `All` repeats the step until no new broader appears. The result
    /// maps each broader, resolved to its primary label, to the narrowers
    /// that selected it.
    pub fn climb(&self, found: &[String], mode: ClimbMode) -> FxHashMap<String, EnhancedTopic> {
        let all_broaders = match mode {
            ClimbMode::No => return FxHashMap::default(),
            ClimbMode::First => self.broaders_of_topics(found, FxHashMap::default()),
            ClimbMode::All => {
                let mut current = FxHashMap::default();
                loop {
                    let next = self.broaders_of_topics(found, current.clone());
                    if next == current {
                        break next;
                    }
                    current = next;
                }
            }
        };

        let mut inferred: FxHashMap<String, EnhancedTopic> = FxHashMap::default();
        for (broader, narrowers) in all_broaders {
            if narrowers.is_empty() {
                continue;
            }
            let primary = self.primary_label(&broader).to_string();
            let entry = inferred.entry(primary).or_insert_with(|| EnhancedTopic {
                matched: 0,
                broader_of: Vec::new(),
            });
            for narrower in narrowers {
                if !entry.broader_of.contains(&narrower) {
                    entry.broader_of.push(narrower);
                }
            }
            entry.matched = entry.broader_of.len();
        }
        for enhanced in inferred.values_mut() {
            enhanced.broader_of.sort();
        }
        inferred
    }

    /// One climbing step: every topic in `found` (and every broader found so
    /// far) contributes itself and its accumulated narrowers to each of its
    /// direct broaders.
    fn broaders_of_topics(
        &self,
        found: &[String],
        mut all_broaders: FxHashMap<String, FxHashSet<String>>,
    ) -> FxHashMap<String, FxHashSet<String>> {
        let mut topics: Vec<String> = found.to_vec();
        let mut accumulated: Vec<String> = all_broaders.keys().cloned().collect();
        accumulated.sort();
        topics.extend(accumulated);

        for topic in topics {
            let Some(broaders) = self.data.broaders.get(&topic) else {
                continue;
            };
            for broader in broaders {
                let inherited = all_broaders.get(&topic).cloned();
                let entry = all_broaders.entry(broader.clone()).or_default();
                entry.insert(topic.clone());
                if let Some(extra) = inherited {
                    entry.extend(extra);
                }
            }
        }
        all_broaders
    }
}
