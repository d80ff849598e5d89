use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rag_cli::{App, EmbeddingMode, IngestOptions, RagConfig};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag")]
#[command(about = "Ingest documents and answer questions over them", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./rag.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Override the embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbeddingMode>,

    /// Override the index file location
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split files into chunks and store their embeddings
    Ingest(IngestArgs),

    /// Show the stored chunks closest to a query
    Search(SearchArgs),

    /// Answer a question using the stored chunks as evidence
    Ask(AskArgs),

    /// Delete every stored vector
    Reset,

    /// Report store state and capabilities
    Stats,
}

#[derive(Args)]
struct IngestArgs {
    /// Files to ingest; .html/.htm files are stripped of markup
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Treat every file as HTML
    #[arg(long)]
    html: bool,

    /// Owner recorded with every chunk
    #[arg(long)]
    owner: Option<String>,

    /// Subject recorded with every chunk
    #[arg(long)]
    subject: Option<String>,

    /// Timestamp recorded with every chunk
    #[arg(long)]
    timestamp: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    /// Number of matches (defaults to retrieval.top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
}

#[derive(Args)]
struct AskArgs {
    question: String,
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper are chatty at debug
    if !cli.verbose {
        builder.filter_module("hyper_util", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = RagConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode;
    }
    if let Some(path) = cli.index_path {
        config.store.index_path = path;
    }

    let with_llm = matches!(cli.command, Commands::Ask(_));
    let app = App::new(config, with_llm)?;

    match cli.command {
        Commands::Ingest(args) => {
            let options = IngestOptions {
                html: args.html,
                owner: args.owner,
                subject: args.subject,
                timestamp: args.timestamp,
            };
            print_json(&app.ingest(&args.files, &options).await?)
        }
        Commands::Search(args) => print_json(&app.search(&args.query, args.top_k).await?),
        Commands::Ask(args) => print_json(&app.ask(&args.question).await),
        Commands::Reset => {
            app.reset().await?;
            print_json(&serde_json::json!({ "status": "ok" }))
        }
        Commands::Stats => print_json(&app.stats().await?),
    }
}
