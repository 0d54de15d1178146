//! memstore-ctl: maintenance CLI for the lifecycle engine (§4.6) — prune,
//! re-embed, and duplicate-detection sweeps run out-of-band from the HTTP
//! surface, against the same Vector Store and Embedding Service.

use clap::{Parser, Subcommand};
use colored::Colorize;
use memstore_core::config::Config;
use memstore_core::embeddings::{EmbeddingBackend, EmbeddingClient};
use memstore_core::lifecycle::LifecycleEngine;
use memstore_core::records::RecordManager;
use memstore_core::stores::{GraphStoreClient, HttpGraphStoreClient, QdrantVectorStoreClient, VectorStoreClient};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "memstore-ctl", version, about = "Maintenance CLI for the memstore lifecycle engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pruning sweep. Dry-run unless --apply is passed.
    Prune {
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        older_than_days: Option<i64>,
    },
    /// Re-compute vectors for every record with the current embedding pipeline.
    Reembed {
        #[arg(long)]
        no_composite: bool,
    },
    /// Scan all records for near-duplicates (report-only).
    Dedup,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let embeddings: Arc<dyn EmbeddingClient> = Arc::new(EmbeddingBackend::from_config(&config));
    let vectors: Arc<dyn VectorStoreClient> =
        match QdrantVectorStoreClient::new(&config.vector_store_host, config.vector_store_port) {
            Ok(c) => Arc::new(c),
            Err(err) => {
                eprintln!("{} failed to connect to vector store: {err}", "error:".red().bold());
                std::process::exit(1);
            }
        };

    let graph: Option<Arc<dyn GraphStoreClient>> = config
        .graph_store_url
        .as_ref()
        .map(|url| Arc::new(HttpGraphStoreClient::new(url.clone())) as Arc<dyn GraphStoreClient>);

    let lifecycle = LifecycleEngine::new(embeddings.clone(), vectors.clone(), graph.clone(), config.clone());

    match cli.command {
        Command::Prune { apply, older_than_days } => {
            let report = match lifecycle.prune(older_than_days, !apply).await {
                Ok(r) => r,
                Err(err) => {
                    eprintln!("{} prune failed: {err}", "error:".red().bold());
                    std::process::exit(1);
                }
            };
            println!(
                "{} {} candidates, {} deleted (dry_run={})",
                "prune:".green().bold(),
                report.candidate_ids.len(),
                report.deleted_ids.len(),
                report.dry_run
            );
        }
        Command::Reembed { no_composite } => {
            match lifecycle.reembed_all(!no_composite).await {
                Ok(count) => println!("{} re-embedded {count} records", "reembed:".green().bold()),
                Err(err) => {
                    eprintln!("{} reembed failed: {err}", "error:".red().bold());
                    std::process::exit(1);
                }
            }
        }
        Command::Dedup => {
            let records = RecordManager::new(embeddings.clone(), vectors.clone(), graph.clone(), config.clone());
            let (mut page, mut cursor) = match records.list(200, None).await {
                Ok(p) => p,
                Err(err) => {
                    eprintln!("{} dedup failed: {err}", "error:".red().bold());
                    std::process::exit(1);
                }
            };
            let mut total_flagged = 0usize;
            loop {
                for record in &page {
                    match lifecycle.find_duplicates(record).await {
                        Ok(superseders) if !superseders.is_empty() => {
                            total_flagged += 1;
                            println!(
                                "{} {} is superseded by {:?}",
                                "dedup:".yellow().bold(),
                                record.id,
                                superseders
                            );
                        }
                        Ok(_) => {}
                        Err(err) => eprintln!("{} dedup check failed for {}: {err}", "warn:".yellow(), record.id),
                    }
                }
                let Some(next) = cursor else { break };
                (page, cursor) = match records.list(200, Some(next)).await {
                    Ok(p) => p,
                    Err(err) => {
                        eprintln!("{} dedup failed: {err}", "error:".red().bold());
                        std::process::exit(1);
                    }
                };
            }
            println!("{} {total_flagged} records flagged", "dedup:".green().bold());
        }
    }
}
