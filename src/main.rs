//! # noema CLI
//!
//! Thin command-line surface over the noema library.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `noema demo` | Run the full pipeline offline on sample text |
//! | `noema search --chunks <jsonl> "<query>"` | Index a JSONL chunk file and run one hybrid query |
//! | `noema analyze --graph <json>` | Load an objects/links JSON file and print insights |
//!
//! All commands accept `--config` pointing to a TOML file; when the file is
//! absent, built-in defaults apply. See `config/noema.example.toml`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use noema::config::{load_config, Config};
use noema::embedding::{create_embedder, Embedder, HashEmbedder};
use noema::engine::HybridSearchEngine;
use noema::extraction::{ExtractionResult, RuleExtractor};
use noema::graph::KnowledgeGraph;
use noema::ingest::{ingest_chunks, ingest_note};
use noema::intelligence::IntelligenceLayer;
use noema::models::{Chunk, Insight, InsightPayload};

/// noema: hybrid retrieval and knowledge-graph reasoning over notes.
#[derive(Parser)]
#[command(
    name = "noema",
    about = "A note intelligence core: hybrid search plus knowledge-graph insights",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when absent.
    #[arg(long, global = true, default_value = "./config/noema.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on built-in sample text, entirely offline.
    Demo,

    /// Index a JSONL chunk file and run one hybrid query against it.
    ///
    /// Each line is a chunk record: `{"id", "text", "token_count"?,
    /// "embedding"?}`. Records without an embedding are embedded by the
    /// configured provider.
    Search {
        /// Path to the JSONL chunk file.
        #[arg(long)]
        chunks: PathBuf,
        /// The query text.
        query: String,
        /// Maximum number of results.
        #[arg(long, short = 'k')]
        limit: Option<usize>,
    },

    /// Load an objects/links JSON file and print the insights it yields.
    Analyze {
        /// Path to a JSON file: `{"objects": [...], "links": [...]}`.
        #[arg(long)]
        graph: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "noema=info".into()))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Demo => run_demo(&config).await,
        Commands::Search {
            chunks,
            query,
            limit,
        } => run_search(&config, &chunks, &query, limit).await,
        Commands::Analyze { graph } => run_analyze(&config, &graph),
    }
}

fn resolve_config(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path).with_context(|| format!("failed to load config: {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

/// Configured embedder, substituting the offline hash embedder when none is
/// configured so the CLI stays usable without credentials.
fn resolve_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    if config.embedding.is_enabled() {
        Ok(create_embedder(&config.embedding)?)
    } else {
        tracing::info!("no embedding provider configured, using offline hash embedder");
        Ok(Box::new(HashEmbedder::new(64)))
    }
}

async fn run_demo(config: &Config) -> Result<()> {
    let raw_text = "The earth is round. This claim is supported by scientific evidence.\n\
        However, some people believe the earth is flat, which contradicts the consensus.\n\
        Key idea: gravity pulls everything towards the center of mass.\n\
        What causes the tides?";

    println!("== noema demo ==\n");
    println!("input:\n{raw_text}\n");

    let embedder = HashEmbedder::new(64);
    let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(64)), config);
    let mut graph = KnowledgeGraph::new();

    let stats = ingest_note(
        &engine,
        &mut graph,
        &embedder,
        &RuleExtractor,
        "note-demo",
        raw_text,
        config,
    )
    .await?;
    println!(
        "ingested: {} chunk(s), {} object(s), {} link(s)\n",
        stats.indexed, stats.objects_added, stats.links_added
    );

    let query = "earth shape";
    println!("query: \"{query}\"");
    let results = engine.search(query, 5).await?;
    print_results(&results);

    println!("\ninsights:");
    let layer = IntelligenceLayer::new(&graph, config.insights.clone());
    print_insights(&layer.generate_insights());

    Ok(())
}

async fn run_search(
    config: &Config,
    chunks_path: &Path,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let content = std::fs::read_to_string(chunks_path)
        .with_context(|| format!("failed to read chunk file: {}", chunks_path.display()))?;

    let mut chunks = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line)
            .with_context(|| format!("bad chunk record on line {}", lineno + 1))?;
        chunks.push(chunk);
    }

    let embedder = resolve_embedder(config)?;
    let engine = HybridSearchEngine::new(resolve_embedder(config)?, config);

    let stats = ingest_chunks(&engine, embedder.as_ref(), chunks, false, config).await?;
    tracing::info!(
        indexed = stats.indexed,
        failed = stats.failed,
        "chunk file indexed"
    );

    let k = limit.unwrap_or(config.retrieval.final_limit);
    let results = engine.search(query, k).await?;
    if results.is_empty() {
        println!("No results.");
    } else {
        print_results(&results);
    }
    Ok(())
}

fn run_analyze(config: &Config, graph_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(graph_path)
        .with_context(|| format!("failed to read graph file: {}", graph_path.display()))?;
    let extraction: ExtractionResult = {
        #[derive(serde::Deserialize)]
        struct GraphFile {
            #[serde(default)]
            objects: Vec<noema::models::Object>,
            #[serde(default)]
            links: Vec<noema::models::Link>,
        }
        let file: GraphFile = serde_json::from_str(&content)?;
        ExtractionResult {
            objects: file.objects,
            links: file.links,
        }
    };

    let mut graph = KnowledgeGraph::new();
    graph.add_objects(extraction.objects)?;
    let mut rejected = 0usize;
    for link in extraction.links {
        match graph.check_link(&link) {
            Ok(()) => {
                graph.add_links(vec![link])?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejecting link");
                rejected += 1;
            }
        }
    }

    println!(
        "graph: {} object(s), {} rejected link(s)\n",
        graph.len(),
        rejected
    );

    let layer = IntelligenceLayer::new(&graph, config.insights.clone());
    print_insights(&layer.generate_insights());
    Ok(())
}

fn print_results(results: &[noema::models::SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        let channels = match (result.matched_in.vector, result.matched_in.keyword) {
            (true, true) => "vector+keyword",
            (true, false) => "vector",
            (false, true) => "keyword",
            (false, false) => "none",
        };
        println!(
            "{}. [{:.3}] {} ({}; vector {:.3}, keyword {:.3})",
            i + 1,
            result.fused_score,
            result.id,
            channels,
            result.vector_score,
            result.keyword_score
        );
    }
}

fn print_insights(insights: &[Insight]) {
    if insights.is_empty() {
        println!("  (none)");
        return;
    }
    for insight in insights {
        match &insight.payload {
            InsightPayload::Contradiction {
                src_text, dst_text, ..
            } => {
                println!(
                    "  [{}] {}: \"{}\" vs \"{}\"",
                    insight.severity, insight.insight_type, src_text, dst_text
                );
            }
            InsightPayload::StaleThread { question_id, text } => {
                println!(
                    "  [{}] {}: {}: \"{}\"",
                    insight.severity, insight.insight_type, question_id, text
                );
            }
            InsightPayload::ConsolidationOpportunity {
                object_id,
                text,
                centrality,
            } => {
                println!(
                    "  [{}] {}: {} (centrality {:.2}): \"{}\"",
                    insight.severity, insight.insight_type, object_id, centrality, text
                );
            }
        }
    }
}
