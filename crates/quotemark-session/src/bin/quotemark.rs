//! quotemark: locate quotes in a plain-text document and ask grounded
//! questions about it from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotemark_core::DocumentSource;
use quotemark_inference::OllamaBackend;
use quotemark_locate::{locate, FragmentStore};
use quotemark_session::{PlainTextDocument, Session, SessionConfig, TracingVisualLayer};

#[derive(Parser)]
#[command(name = "quotemark")]
#[command(author, version, about = "Grounded answers with verbatim quote highlighting")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find where a verbatim quote occurs in a document
    Locate {
        /// Plain-text document, pages separated by form feed
        #[arg(short, long)]
        file: PathBuf,

        /// Exact text to find
        #[arg(short, long)]
        quote: String,
    },

    /// Ask a question and highlight the supporting quote
    Ask {
        /// Plain-text document, pages separated by form feed
        #[arg(short, long)]
        file: PathBuf,

        /// Question about the document
        #[arg(short = 'Q', long)]
        question: String,

        /// Generation model (overrides OLLAMA_GEN_MODEL)
        #[arg(short, long)]
        model: Option<String>,
    },
}

fn init_tracing() {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // RUST_LOG   - standard env filter (default: "quotemark=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "quotemark=info,quotemark_session=info,quotemark_inference=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Locate { file, quote } => cmd_locate(&file, &quote).await,
        Commands::Ask {
            file,
            question,
            model,
        } => cmd_ask(&file, &question, model).await,
    }
}

async fn cmd_locate(file: &Path, quote: &str) -> anyhow::Result<()> {
    let document = PlainTextDocument::open(file).await?;
    let mut store = FragmentStore::new(document.page_count());
    for page in 1..=document.page_count() {
        store.index_page(page, document.extract_page(page).await?)?;
    }

    let output = serde_json::json!({
        "quote": quote,
        "location": locate(quote, &store, store.page_count()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_ask(file: &Path, question: &str, model: Option<String>) -> anyhow::Result<()> {
    let config = SessionConfig::from_env()?;
    let mut backend = OllamaBackend::from_env()?;
    if let Some(model) = model {
        backend.set_gen_model(model);
    }

    let settle = config.scroll_settle();
    let (handle, task) = Session::spawn(Arc::new(backend), TracingVisualLayer, config);

    let document = PlainTextDocument::open(file).await?;
    handle.load_source(&document).await?;

    let answer = handle
        .ask_and_wait(question)
        .await
        .context("grounding request failed")?;

    // Let the scroll settle so the highlight command is issued.
    tokio::time::sleep(settle + Duration::from_millis(50)).await;
    let snapshot = handle.snapshot().await?;

    let output = serde_json::json!({
        "answer": answer.text,
        "quote": answer.quote,
        "location": snapshot.highlight.location(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    handle.shutdown().await?;
    task.await?;
    Ok(())
}
