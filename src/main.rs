use clap::{Parser, Subcommand};
use std::path::PathBuf;
use travel_rag::Result;
use travel_rag::commands::{ask, chat, run_index, serve, show_status};
use travel_rag::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "travel-rag")]
#[command(about = "A travel guide chatbot answering questions from an indexed text document")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the query service, Ollama connection and indexing settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector store from the source document
    Index,
    /// Start the HTTP query service
    Serve,
    /// Ask the running query service a single question
    Ask {
        /// The question to ask
        question: String,
    },
    /// Start an interactive chat with the query service
    Chat,
    /// Show the state of the embedding model, vector store and query service
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load(&cli.config_dir)?);
            } else {
                run_interactive_config(&cli.config_dir)?;
            }
        }
        Commands::Index => {
            run_index(&Config::load(&cli.config_dir)?).await?;
        }
        Commands::Serve => {
            serve(Config::load(&cli.config_dir)?).await?;
        }
        Commands::Ask { question } => {
            ask(&Config::load(&cli.config_dir)?, &question).await?;
        }
        Commands::Chat => {
            chat(&Config::load(&cli.config_dir)?).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&cli.config_dir)?).await?;
        }
    }

    Ok(())
}
