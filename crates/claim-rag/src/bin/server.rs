//! Claim server binary
//!
//! Run with: cargo run -p claim-rag --bin claim-rag-server -- --config claim-rag.toml

use std::path::PathBuf;

use claim_rag::{
    config::RagConfig,
    providers,
    server::{state::AppState, ClaimServer},
    ClaimPipeline,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claim_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                   SmartClaims Claim RAG                   ║
║        Policy-grounded claim approval decisions           ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let config = RagConfig::load(config_path().as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Embedding: {:?} / {} ({} dims)",
        config.embeddings.backend,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - LLM: {:?} / {}", config.llm.backend, config.llm.model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap, top {}",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.retrieval.top_k
    );

    let embedder = providers::embedder_from_config(&config.embeddings)?;
    let reasoner = providers::reasoner_from_config(&config.llm)?;

    // Check external services; the server still starts if they are down
    match embedder.health_check().await {
        Ok(true) => tracing::info!("Embedding service {} is reachable", embedder.name()),
        _ => tracing::warn!(
            "Embedding service {} not available at {}",
            embedder.name(),
            config.embeddings.base_url
        ),
    }
    match reasoner.health_check().await {
        Ok(true) => tracing::info!("Reasoning service {} is reachable", reasoner.name()),
        _ => {
            tracing::warn!(
                "Reasoning service {} not available at {}",
                reasoner.name(),
                config.llm.base_url
            );
            tracing::warn!("For a local setup:");
            tracing::warn!("  1. Start: ollama serve");
            tracing::warn!(
                "  2. Pull models: ollama pull {} && ollama pull {}",
                config.embeddings.model,
                config.llm.model
            );
        }
    }

    let pipeline = ClaimPipeline::new(&config, embedder, reasoner)?;
    let server = ClaimServer::with_state(AppState::with_pipeline(config, pipeline));

    println!("\nServer starting...");
    println!("  API: http://{}/api/v1/hackrx", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/v1/hackrx/run                  - Assess a claim");
    println!("  POST /api/v1/hackrx/upload               - Assess against an uploaded policy");
    println!("  GET  /api/v1/hackrx/status/:claim_id     - Last outcome of a claim");
    println!("  POST /api/v1/hackrx/reload-policy/:id    - Rebuild a policy index");
    println!("  GET  /api/v1/hackrx/policies             - List cached policies");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

/// Value of `--config <path>` or `--config=<path>`
fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
