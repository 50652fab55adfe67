//! # TextSleuth CLI (`sleuth`)
//!
//! The `sleuth` binary runs both analysis tools from the terminal, manages
//! the analysis history, and starts the HTTP server for browser front ends.
//!
//! ## Usage
//!
//! ```bash
//! sleuth --config ./config/sleuth.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sleuth init` | Create the SQLite database and run schema migrations |
//! | `sleuth detect [TEXT]` | Check text (or `--file`) for AI authorship |
//! | `sleuth plagiarism [TEXT]` | Check text (or `--file`) for plagiarism |
//! | `sleuth history list` | List past analyses |
//! | `sleuth history show <id>` | Show one past analysis |
//! | `sleuth history delete <id>` | Remove one past analysis |
//! | `sleuth history export` | Print the whole history as JSON |
//! | `sleuth serve` | Start the JSON HTTP server |
//! | `sleuth completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Paste text directly
//! sleuth detect "The quick brown fox jumps over the lazy dog."
//!
//! # Analyze a document, showing the raw model output too
//! sleuth plagiarism --file essay.docx --raw
//!
//! # Pipe text in
//! cat essay.txt | sleuth detect
//! ```

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use text_sleuth::config::{self, Config};
use text_sleuth::dispatch::Dispatcher;
use text_sleuth::history::{HistoryStore, SqliteHistoryStore};
use text_sleuth::llm::{create_provider, AnalysisProvider};
use text_sleuth::migrate;
use text_sleuth::models::{AnalysisKind, InputSource, UploadedFile};
use text_sleuth::present::{history_line, present, present_result};
use text_sleuth::progress::ProgressMode;
use text_sleuth::server;

/// TextSleuth: AI-generated text detection and plagiarism checking.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, a local database and a disabled model are used.
#[derive(Parser)]
#[command(
    name = "sleuth",
    about = "TextSleuth: detect AI-generated text and check for plagiarism",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sleuth.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Check whether text was written by an AI.
    Detect(AnalyzeArgs),

    /// Check text against online sources for plagiarism.
    Plagiarism(AnalyzeArgs),

    /// Inspect or edit the analysis history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Input and output options shared by both tools.
#[derive(Args)]
struct AnalyzeArgs {
    /// Text to analyze. Read from stdin when neither TEXT nor --file is given.
    text: Option<String>,

    /// Analyze a .txt, .pdf, or .docx document instead of TEXT.
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Also print the raw JSON returned by the model.
    #[arg(long)]
    raw: bool,

    /// Print the result as JSON instead of the rendered view.
    #[arg(long)]
    json: bool,

    /// Do not record this analysis in the history.
    #[arg(long)]
    no_history: bool,

    /// Progress output on stderr: off, human, or json.
    /// Defaults to human on a terminal and off otherwise.
    #[arg(long)]
    progress: Option<ProgressMode>,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List past analyses, oldest first.
    List,
    /// Show one analysis with its rendered result.
    Show {
        id: String,
        /// Also print the stored raw JSON.
        #[arg(long)]
        raw: bool,
    },
    /// Delete one analysis.
    Delete { id: String },
    /// Print every record as a JSON array.
    Export,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "sleuth", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let cfg = config::load_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Detect(args) => return run_analysis(&cfg, AnalysisKind::AiDetection, args).await,
        Commands::Plagiarism(args) => {
            return run_analysis(&cfg, AnalysisKind::Plagiarism, args).await
        }
        Commands::History { action } => return run_history(&cfg, action).await,
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_source(args: &AnalyzeArgs) -> Result<InputSource> {
    if let Some(path) = &args.file {
        return Ok(InputSource::UploadedDocument(UploadedFile::from_path(path)?));
    }
    let text = match &args.text {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            buf
        }
    };
    Ok(InputSource::FreeText(text))
}

async fn run_analysis(cfg: &Config, kind: AnalysisKind, args: AnalyzeArgs) -> Result<ExitCode> {
    let source = read_source(&args)?;
    let provider: Arc<dyn AnalysisProvider> = Arc::from(create_provider(&cfg.llm)?);
    let progress = args.progress.unwrap_or_else(ProgressMode::default_for_tty);

    let mut dispatcher = Dispatcher::new(provider)
        .with_upload_limit(cfg.limits.max_upload_bytes)
        .with_progress(Arc::from(progress.reporter()));

    let store = if args.no_history {
        None
    } else {
        let store = Arc::new(SqliteHistoryStore::open(cfg).await?);
        dispatcher = dispatcher.with_history(store.clone());
        Some(store)
    };

    let outcome = dispatcher.analyze(kind, source).await;
    if let Some(store) = &store {
        store.close().await;
    }

    match outcome {
        Ok(analysis) => {
            if args.json {
                let body = serde_json::json!({
                    "id": analysis.record_id,
                    "type": kind,
                    "result": analysis.result,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", kind.title());
                println!();
                print!("{}", present_result(&analysis.result).render_text(args.raw));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if args.json {
                let body = serde_json::json!({ "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprintln!("Error: {}", e);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_history(cfg: &Config, action: HistoryAction) -> Result<ExitCode> {
    let store = SqliteHistoryStore::open(cfg).await?;
    let code = match action {
        HistoryAction::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("No analyses yet.");
            }
            for record in &records {
                println!("{}", history_line(record));
            }
            ExitCode::SUCCESS
        }
        HistoryAction::Show { id, raw } => match store.get(&id).await? {
            Some(record) => {
                println!("{}", history_line(&record));
                println!();
                println!("{}", record.text);
                println!();
                print!("{}", present(&record.result).render_text(raw));
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("No history record with id: {}", id);
                ExitCode::FAILURE
            }
        },
        HistoryAction::Delete { id } => {
            if store.delete(&id).await? {
                println!("Deleted {}", id);
                ExitCode::SUCCESS
            } else {
                eprintln!("No history record with id: {}", id);
                ExitCode::FAILURE
            }
        }
        HistoryAction::Export => {
            let records = store.list().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            ExitCode::SUCCESS
        }
    };
    store.close().await;
    Ok(code)
}
