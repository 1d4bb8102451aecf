//! Command-line claim assessment
//!
//! Run with: cargo run -p claim-rag --features cli --bin claim-rag -- assess --document policy.pdf --query "46M, knee surgery"

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use claim_rag::{
    config::RagConfig,
    ingestion::{DocumentSource, FileDocumentLoader, TextChunker},
    ClaimPipeline, PolicyDocument,
};

#[derive(Parser, Debug)]
#[command(name = "claim-rag", version, about = "Assess insurance claims against a policy document")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one claim through the full pipeline and print the JSON result
    Assess {
        /// Policy document (.pdf, .txt or .md)
        #[arg(long)]
        document: PathBuf,

        /// Free-text claim description
        #[arg(long)]
        query: String,

        /// Number of clauses to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print how a document is split into chunks
    Chunks {
        #[arg(long)]
        document: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claim_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Assess {
            document,
            query,
            top_k,
        } => assess(config, document, &query, top_k).await,
        Command::Chunks { document } => chunks(config, document).await,
    }
}

async fn assess(
    config: RagConfig,
    document: PathBuf,
    query: &str,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let mut pipeline = ClaimPipeline::from_config(&config)?;
    if let Some(k) = top_k {
        pipeline = pipeline.with_top_k(k);
    }
    let source = PolicyDocument::path(document);

    let spinner = spinner(format!("Indexing {}", source.label()));
    let index = match pipeline.build_index(&source).await {
        Ok(index) => index,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    spinner.set_message(format!("Assessing claim against {} chunks", index.len()));

    let result = pipeline.assess_with_index(&index, query).await;
    spinner.finish_and_clear();
    let assessment = result?;

    let verdict = match (assessment.decision.structured(), assessment.decision.json()) {
        (Some(decision), _) => style(decision.decision.to_string()).green().bold(),
        (None, Some(value)) => style(
            value
                .get("decision")
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unrecognised".to_string()),
        )
        .yellow()
        .bold(),
        (None, None) => style("unparsed".to_string()).yellow().bold(),
    };
    eprintln!("{} {}", style("Decision:").bold(), verdict);
    for (rank, hit) in assessment.clauses.iter().enumerate() {
        eprintln!(
            "  {} chunk {} (distance {:.4})",
            style(format!("#{}", rank + 1)).cyan(),
            hit.chunk.index,
            hit.distance
        );
    }

    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

async fn chunks(config: RagConfig, document: PathBuf) -> anyhow::Result<()> {
    let chunker = TextChunker::from_config(&config.chunking)?;
    let loaded = FileDocumentLoader::new().load(&document).await?;
    let chunks = chunker.chunk(&loaded.text);

    eprintln!(
        "{} {} chars, {} chunks (size {}, overlap {})",
        style(&loaded.source).bold(),
        loaded.char_len(),
        chunks.len(),
        chunker.chunk_size(),
        chunker.overlap()
    );
    for chunk in &chunks {
        println!(
            "{} [{}..{}] {}",
            style(format!("#{}", chunk.index)).cyan(),
            chunk.char_start,
            chunk.char_end,
            chunk.text.replace('\n', " ")
        );
    }
    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
