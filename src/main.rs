//! CLI entry point for the document similarity pipeline.
//!
//! Provides commands for initializing configuration, inspecting active
//! settings, and running the embed-and-search pipeline over one
//! partition of OCR-extracted documents.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use docsim::config::{self, Settings};
use docsim::exit_code::ExitCode;
use docsim::{
    FastEmbedEmbedder, PipelineError, ResultSink, SimilarityResolver, TextFolderSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "docsim",
    version,
    about = "Nearest-neighbor document similarity for OCR-extracted text",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up .docsim directory with a default configuration
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Rank every document of a partition against its nearest neighbors
    Similar {
        /// Partition (user) whose documents are compared
        #[arg(short, long)]
        partition: String,

        /// Neighbors to retrieve per document
        #[arg(short = 'k', long)]
        neighbors: Option<usize>,

        /// Drop each document from its own neighbor list
        #[arg(long)]
        exclude_self: bool,

        /// Session identifier used in the result file name
        /// (defaults to "<partition>_<timestamp>")
        #[arg(long)]
        session: Option<String>,

        /// Override the output directory for the result file
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            for suggestion in e.recovery_suggestions() {
                eprintln!("  hint: {suggestion}");
            }
            ExitCode::from_error(&e)
        }
    };
    std::process::exit(code.into());
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<Settings, PipelineError> {
    let result = match config_path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    result.map_err(|e| PipelineError::Config {
        reason: e.to_string(),
    })
}

fn execute(cli: Cli) -> Result<ExitCode, PipelineError> {
    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| PipelineError::Config {
                reason: e.to_string(),
            })?;
            println!("Configuration ready at {}", path.display());
            Ok(ExitCode::Success)
        }

        Commands::Config => {
            if cli.config.is_none() && Settings::check_init().is_err() {
                eprintln!("Note: no configuration file found, showing defaults.");
                eprintln!("Run 'docsim init' to create one.");
            }
            let settings = load_settings(cli.config.as_ref())?;
            let rendered = toml::to_string_pretty(&settings).map_err(|e| PipelineError::Config {
                reason: format!("failed to render settings: {e}"),
            })?;
            println!("{rendered}");
            Ok(ExitCode::Success)
        }

        Commands::Similar {
            partition,
            neighbors,
            exclude_self,
            session,
            output_dir,
        } => {
            let mut settings = load_settings(cli.config.as_ref())?;
            if let Some(k) = neighbors {
                settings.search.neighbors = k;
            }
            if exclude_self {
                settings.search.exclude_self = true;
            }
            if let Some(dir) = output_dir {
                settings.output.json_dir = dir;
            }
            config::set_global_debug(settings.debug);

            // Session ids embed the partition plus a timestamp, so
            // concurrent runs of different sessions write distinct files.
            let session_id = session.unwrap_or_else(|| {
                format!(
                    "{partition}_{}",
                    chrono::Local::now().format("%Y%m%d%H%M%S")
                )
            });

            let source = TextFolderSource::new(&settings.source.text_root);
            let embedder = FastEmbedEmbedder::from_settings(&settings)?;
            let sink = ResultSink::create(&settings.output.json_dir)?;
            let resolver = SimilarityResolver::new(source, embedder, Arc::new(settings));

            let cancel = CancellationToken::new();
            let started = Instant::now();
            let path = resolver.run(&partition, &session_id, &sink, &cancel)?;

            println!("Similarity results written to {}", path.display());
            println!("Completed in {:.2}s", started.elapsed().as_secs_f64());
            Ok(ExitCode::Success)
        }
    }
}
