//! The `autograde` command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "autograde",
    version,
    about = "Extract question-answer pairs from documents and grade them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Report formats written by `grade`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Markdown,
    All,
}

/// Output formats for `extract`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExtractFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one or more text documents
    Grade {
        /// Plain-text documents to grade
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Evaluator model (e.g. "gemini/gemini-2.5-flash" or "anthropic/claude-sonnet-4-20250514")
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Max documents graded concurrently (overrides config)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value = "json")]
        format: ReportFormat,
    },

    /// Show the question-answer pairs found in a document
    Extract {
        /// Plain-text document
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ExtractFormat,
    },

    /// Compute the grade for a saved analysis
    Score {
        /// Report JSON or bare analysis array
        analysis: PathBuf,

        /// Config file path (for custom thresholds)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available evaluator models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autograde=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            files,
            model,
            config,
            parallelism,
            output,
            format,
        } => commands::grade::execute(files, model, config, parallelism, output, format).await,
        Commands::Extract { file, format } => commands::extract::execute(file, format),
        Commands::Score { analysis, config } => commands::score::execute(analysis, config),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
