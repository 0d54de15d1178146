//! memstore-server: HTTP surface for the semantic memory store. Wires the
//! embedding backend, Vector Store, and optional Graph Store into the
//! core's service objects, then serves the HTTP surface (§4.8) alongside
//! the lifecycle sweep and document ingestor background loops.

mod server;

use memstore_core::config::Config;
use memstore_core::embeddings::{EmbeddingBackend, EmbeddingClient};
use memstore_core::ingest::DocumentIngestor;
use memstore_core::lifecycle::LifecycleEngine;
use memstore_core::records::RecordManager;
use memstore_core::relationships::AutoLinker;
use memstore_core::retrieval::HybridRetriever;
use memstore_core::stores::{GraphStoreClient, HttpGraphStoreClient, QdrantVectorStoreClient, VectorStoreClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LIFECYCLE_SWEEP_INTERVAL_SECS: u64 = 3600;

fn init_logging(config: &Config) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    match config.log_format {
        memstore_core::config::LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        memstore_core::config::LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn ingest_state_path() -> PathBuf {
    directories::ProjectDirs::from("com", "memstore", "core")
        .map(|dirs| dirs.data_dir().join("ingest_state.json"))
        .unwrap_or_else(|| PathBuf::from("ingest_state.json"))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_logging(&config);

    info!("memstore-server v{} starting", env!("CARGO_PKG_VERSION"));

    let embeddings: Arc<dyn EmbeddingClient> = Arc::new(EmbeddingBackend::from_config(&config));

    let vectors: Arc<dyn VectorStoreClient> =
        match QdrantVectorStoreClient::new(&config.vector_store_host, config.vector_store_port) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                error!(error = %err, "failed to connect to vector store");
                std::process::exit(1);
            }
        };

    if let Err(err) = vectors
        .ensure_collection(embeddings.config().dimensions, config.sparse_enabled)
        .await
    {
        error!(error = %err, "failed to ensure vector store collection");
        std::process::exit(1);
    }

    let graph: Option<Arc<dyn GraphStoreClient>> = config
        .graph_store_url
        .as_ref()
        .map(|url| Arc::new(HttpGraphStoreClient::new(url.clone())) as Arc<dyn GraphStoreClient>);

    let records = Arc::new(RecordManager::new(
        embeddings.clone(),
        vectors.clone(),
        graph.clone(),
        config.clone(),
    ));
    let retriever = Arc::new(HybridRetriever::new(embeddings.clone(), vectors.clone()));
    let lifecycle = Arc::new(LifecycleEngine::new(
        embeddings.clone(),
        vectors.clone(),
        graph.clone(),
        config.clone(),
    ));
    let auto_linker = graph
        .clone()
        .map(|g| Arc::new(AutoLinker::new(embeddings.clone(), vectors.clone(), g, config.clone())));

    let ingestor = if config.ingest_folders.is_empty() {
        None
    } else {
        Some(Arc::new(DocumentIngestor::new(records.clone(), config.clone(), ingest_state_path())))
    };

    server::spawn_background_tasks(
        lifecycle.clone(),
        ingestor,
        std::time::Duration::from_secs(LIFECYCLE_SWEEP_INTERVAL_SECS),
    );

    let state = Arc::new(server::AppState {
        records,
        retriever,
        graph,
        auto_linker,
        lifecycle,
        embeddings,
        config: config.clone(),
        started_at: chrono::Utc::now(),
    });

    let app = server::router(state);

    let listener = match tokio::net::TcpListener::bind(&config.http_bind_addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, addr = %config.http_bind_addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };
    info!(addr = %config.http_bind_addr, "listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server error");
        std::process::exit(1);
    }
}
