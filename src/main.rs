use clap::{Parser, Subcommand};
use hn_rag::Result;
use hn_rag::commands::{clear_index, import_documents, search, show_status};
use hn_rag::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

const DEFAULT_TOP_K: usize = 5;

#[derive(Parser)]
#[command(name = "hn-rag")]
#[command(about = "Chunk, embed and search Hacker News style documents")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.hn-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the encoder, Ollama connection and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Add documents from a JSON array file to the index
    Add {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Search the index
    Search {
        /// Free text query
        query: String,
        /// Number of results to return
        #[arg(long, short = 'k', default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index size and encoder status
    Status,
    /// Remove every entry from the index
    Clear,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir().map_err(|e| hn_rag::RagError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Add { file } => {
            import_documents(&config_dir, &file)?;
        }
        Commands::Search { query, top_k, json } => {
            search(&config_dir, &query, top_k, json)?;
        }
        Commands::Status => {
            show_status(&config_dir)?;
        }
        Commands::Clear => {
            clear_index(&config_dir)?;
        }
    }

    Ok(())
}
