use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sift_retriever::{
    config::RetrieverConfig,
    retrieval::{
        corpus::{CorpusEntry, DirectoryCorpus},
        index_manager::{BuildOutcome, BuildReport, IndexManager},
        vector_index::SearchHit,
    },
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Configuration file picked up from the working directory when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "sift.toml";

/// Incrementally index a folder of documents and ask questions about it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file (defaults to ./sift.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index new and modified documents, reusing the existing index
    Index {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Rebuild the index from every document, dropping stale chunks
    Rebuild {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Find the chunks closest to a query
    Search {
        /// Query text
        query: String,
        /// Number of results (defaults to answer.top_k from the config)
        #[arg(short, long)]
        k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer a question from the most relevant chunks
    Ask {
        /// The question
        question: String,
        /// Number of chunks to retrieve (defaults to answer.top_k from the config)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show index and configuration status
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RetrieverConfig> {
    match path {
        Some(path) => RetrieverConfig::load(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            RetrieverConfig::load(DEFAULT_CONFIG_FILE)
        }
        None => Ok(RetrieverConfig::default()),
    }
}

fn list_corpus(config: &RetrieverConfig) -> anyhow::Result<Vec<CorpusEntry>> {
    let corpus = DirectoryCorpus::new(&config.corpus.folder)
        .with_extensions(&config.corpus.extensions)
        .with_recursive(config.corpus.recursive);
    corpus
        .list()
        .with_context(|| format!("failed to list {}", config.corpus.folder.display()))
}

fn open_manager(config: &RetrieverConfig) -> anyhow::Result<IndexManager> {
    let embedder = config.embedding.build_provider()?;
    Ok(IndexManager::new(config, embedder)?)
}

/// Load the persisted index for query-only commands.
fn open_for_queries(config: &RetrieverConfig) -> anyhow::Result<IndexManager> {
    let mut manager = open_manager(config)?;
    if !manager.load()? {
        anyhow::bail!(
            "index not found at {}; run `sift index` first",
            config.index.prefix.display()
        );
    }
    Ok(manager)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Index { format } => {
            let listing = list_corpus(&config)?;
            let mut manager = open_manager(&config)?;
            let report = manager.build_or_update(&listing).await?;
            print_report(&report, &format)
        }
        Commands::Rebuild { format } => {
            let listing = list_corpus(&config)?;
            let mut manager = open_manager(&config)?;
            let report = manager.rebuild(&listing).await?;
            print_report(&report, &format)
        }
        Commands::Search { query, k, format } => {
            let manager = open_for_queries(&config)?;
            let hits = manager
                .retrieve(&query, k.unwrap_or(manager.default_top_k()))
                .await?;
            print_hits(&hits, &format)
        }
        Commands::Ask { question, k } => {
            let completion = config.completion.build_provider()?;
            let manager = open_for_queries(&config)?.with_completion(completion);
            let answer = manager
                .answer(&question, k.unwrap_or(manager.default_top_k()))
                .await?;
            println!("{answer}");
            Ok(())
        }
        Commands::Status { format } => {
            let mut manager = open_manager(&config)?;
            manager.load()?;
            let status = manager.status();

            match format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct StatusOutput<'a> {
                        index: &'a sift_retriever::retrieval::index_manager::IndexStatus,
                        config: &'a RetrieverConfig,
                    }
                    let output = StatusOutput {
                        index: &status,
                        config: &config,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Sift Index Status");
                    println!("=================");
                    println!(
                        "  Index: {}",
                        if status.loaded {
                            "loaded"
                        } else if status.exists_on_disk {
                            "on disk, not loaded"
                        } else {
                            "not built"
                        }
                    );
                    println!("  Chunks: {}", status.chunk_count);
                    match status.dimension {
                        Some(dimension) => println!("  Dimension: {dimension}"),
                        None => println!("  Dimension: unknown"),
                    }
                    println!("  Tracked documents: {}", status.tracked_documents);
                    println!("  Embedding provider: {}", status.embedding_provider);

                    if format == OutputFormat::Full {
                        println!("\nFiles:");
                        println!("  Vectors: {}", status.vectors_path.display());
                        println!("  Chunks: {}", status.chunks_path.display());
                        println!("  Ledger: {}", status.ledger_path.display());
                        println!("\nConfiguration:");
                        println!("  Corpus folder: {}", config.corpus.folder.display());
                        println!("  Extensions: {}", config.corpus.extensions.join(", "));
                        println!(
                            "  Chunk size: {} (overlap {})",
                            config.chunking.chunk_size, config.chunking.overlap
                        );
                        println!("  Top k: {}", config.answer.top_k);
                        println!("  Max context chars: {}", config.answer.max_context_chars);
                        println!("  Completion model: {}", config.completion.model);
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_report(report: &BuildReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Summary | OutputFormat::Full => {
            match report.outcome {
                BuildOutcome::Unchanged => {
                    println!("Index unchanged: {} chunks", report.total_chunks)
                }
                BuildOutcome::Built => println!(
                    "Index built: {} chunks from {} documents",
                    report.total_chunks,
                    report.changed_documents.len()
                ),
                BuildOutcome::Appended => println!(
                    "Index updated: {} chunks added from {} documents, {} total",
                    report.chunks_added(),
                    report.changed_documents.len(),
                    report.total_chunks
                ),
            }
            if *format == OutputFormat::Full {
                for id in &report.changed_documents {
                    println!("  indexed: {id}");
                }
            }
            if !report.missing_documents.is_empty() {
                println!(
                    "{} documents are no longer in the corpus; run `sift rebuild` to drop their chunks",
                    report.missing_documents.len()
                );
                if *format == OutputFormat::Full {
                    for id in &report.missing_documents {
                        println!("  missing: {id}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_hits(hits: &[SearchHit], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(hits)?);
        }
        OutputFormat::Summary => {
            println!("Found {} chunks:", hits.len());
            for hit in hits {
                println!(
                    "  Distance: {:.4} | Chunk: {} | {}",
                    hit.distance,
                    hit.chunk.ordinal,
                    hit.chunk.text.chars().take(80).collect::<String>()
                );
            }
        }
        OutputFormat::Full => {
            for hit in hits {
                println!("Distance: {:.4}", hit.distance);
                println!("Chunk: {}", hit.chunk.ordinal);
                println!("Content:\n{}", hit.chunk.text);
                println!("---");
            }
        }
    }
    Ok(())
}
