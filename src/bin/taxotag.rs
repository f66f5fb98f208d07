use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dirs::home_dir;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use taxotag::analysis::classification::{ClassifierParams, TopicClassifier};
use taxotag::parsers::model_parser::EmbeddingStore;
use taxotag::parsers::ontology_parser::{ClimbMode, Ontology};
use taxotag::parsers::paper_parser::{Modules, PaperRecord};

fn default_asset_path(filename: &str) -> String {
    home_dir()
        .map(|home| home.join(".taxotag").join(filename))
        .unwrap_or_else(|| PathBuf::from(filename))
        .to_string_lossy()
        .into_owned()
}

lazy_static! {
    static ref DEFAULT_ONTOLOGY_PATH: String = default_asset_path("taxonomy.csv");
    static ref DEFAULT_ONTOLOGY_CACHE_PATH: String = default_asset_path("taxonomy.cache.json");
    static ref DEFAULT_MODEL_PATH: String = default_asset_path("token-to-topic.json");
}

#[derive(Parser, Debug)]
#[command(name = "taxotag", about, version)]
struct CliArgs {
    #[arg(
        long = "ontology",
        value_name = "FILE",
        help = "Path to the taxonomy triple file (subject;predicate;object).",
        default_value_t = DEFAULT_ONTOLOGY_PATH.to_string(),
    )]
    ontology_file: String,

    #[arg(
        long = "ontology-cache",
        value_name = "FILE",
        help = "Path of the derived-ontology cache. Created on first load.",
        default_value_t = DEFAULT_ONTOLOGY_CACHE_PATH.to_string(),
    )]
    ontology_cache: String,

    #[arg(
        long = "model",
        value_name = "FILE",
        help = "Path to the cached word-to-topic neighbor model (JSON).",
        default_value_t = DEFAULT_MODEL_PATH.to_string(),
    )]
    model_file: String,

    #[arg(
        long = "vectors",
        value_name = "FILE",
        help = "Optional full vector store. Needed when removing outliers or running the live semantic mode.",
    )]
    vectors_file: Option<String>,

    #[arg(
        short = 'p',
        long = "papers",
        value_name = "FILE",
        help = "JSON file mapping paper ids to {title, abstract, keywords} records.",
        required = true
    )]
    papers_file: String,

    #[arg(
        short = 'd',
        long = "output",
        value_name = "FILE",
        help = "File to write the classification JSON. Prints to standard output when omitted.",
    )]
    output_file: Option<String>,

    #[arg(
        short = 'm',
        long = "modules",
        value_enum,
        help = "Which matching modules to run.",
        default_value_t = Modules::Both
    )]
    modules: Modules,

    #[arg(
        short = 'e',
        long = "enhancement",
        value_enum,
        help = "How far to climb the taxonomy for super-topics.",
        default_value_t = ClimbMode::First
    )]
    enhancement: ClimbMode,

    #[arg(
        long = "explanation",
        help = "Include the text chunks that justified each reported topic.",
        default_value_t = false
    )]
    explanation: bool,

    #[arg(
        long = "keep-outliers",
        help = "Skip the outlier-removal step of the post-processing.",
        default_value_t = false
    )]
    keep_outliers: bool,

    #[arg(
        long = "live-semantic",
        help = "Query the full vector store instead of the cached neighbor map.",
        default_value_t = false
    )]
    live_semantic: bool,

    #[arg(
        short = 'w',
        long = "workers",
        value_name = "NUMBER",
        help = "Number of batch workers. Uses all available cores by default.",
        default_value_t = num_cpus::get()
    )]
    workers: usize,

    #[arg(
        short = 's',
        long = "silent",
        help = "Suppress progress output.",
        default_value_t = false
    )]
    silent: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli_args = CliArgs::parse();

    let params = ClassifierParams {
        modules: cli_args.modules,
        enhancement: cli_args.enhancement,
        explanation: cli_args.explanation,
        delete_outliers: !cli_args.keep_outliers,
        fast_classification: !cli_args.live_semantic,
        get_weights: false,
        silent: cli_args.silent,
        workers: cli_args.workers,
    };
    if let Err(e) = params.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(params.workers)
        .build_global()
    {
        eprintln!("Failed to initialize the worker thread pool: {e:?}");
    }

    if !cli_args.silent {
        println!("\nReading taxonomy from: {}", cli_args.ontology_file);
    }
    let ontology = match Ontology::load(
        &cli_args.ontology_file,
        Some(Path::new(&cli_args.ontology_cache)),
    ) {
        Ok(ontology) => ontology,
        Err(e) => {
            eprintln!("\nError loading taxonomy '{}':", cli_args.ontology_file);
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if !cli_args.silent {
        println!("Loaded taxonomy with {} topics\n", ontology.topic_count());
    }

    let vectors_path = if params.use_full_model() {
        cli_args.vectors_file.as_deref().map(Path::new)
    } else {
        None
    };
    let store = match EmbeddingStore::load(&cli_args.model_file, vectors_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("\nError loading embedding model '{}':", cli_args.model_file);
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if !cli_args.silent {
        println!("Reading papers from: {}\n", cli_args.papers_file);
    }
    let papers: FxHashMap<String, PaperRecord> = match fs::read_to_string(&cli_args.papers_file)
        .map_err(anyhow::Error::from)
        .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
    {
        Ok(papers) => papers,
        Err(e) => {
            eprintln!("\nError reading papers file '{}':", cli_args.papers_file);
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let classifier = match TopicClassifier::new(Arc::new(ontology), Arc::new(store), params) {
        Ok(classifier) => classifier,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let results = classifier.batch(&papers);

    let json = match serde_json::to_string_pretty(&results) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing results: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &cli_args.output_file {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                eprintln!("Error: Failed to write results to '{path}': {e}");
                return ExitCode::FAILURE;
            }
            if !cli_args.silent {
                println!("Results written to: {path}\n");
            }
        }
        None => println!("{json}"),
    }

    ExitCode::SUCCESS
}
