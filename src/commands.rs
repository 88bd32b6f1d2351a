use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::{ChatClient, ClientError, ConnectionStatus};
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{Indexer, load_document};

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

/// Build the vector store from the source document
#[inline]
pub async fn run_index(config: &Config) -> Result<()> {
    let source = &config.store.source_path;
    let document = load_document(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))?
        .with_context(|| format!("Source document not found: {}", source.display()))?;

    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    let check = client.clone();
    tokio::task::spawn_blocking(move || check.health_check())
        .await
        .context("Health check task failed")?
        .context("Ollama is not ready; use 'travel-rag config' to update connection settings")?;

    let embedder: Arc<dyn Embedder> = Arc::new(client);
    let indexer = Indexer::new(config.clone(), embedder);

    println!("📚 Indexing {}", style(source.display()).cyan());
    let (_store, stats) = indexer
        .build(&document)
        .await
        .context("Failed to build vector store")?;

    println!("✅ Indexing complete");
    println!("   📄 Chunks created: {}", stats.chunks_created);
    println!("   🧮 Embeddings generated: {}", stats.embeddings_generated);
    println!("   ⏱  Duration: {:.2?}", stats.duration);
    println!(
        "   💾 Stored in: {}",
        style(config.store.persist_dir.display()).cyan()
    );

    Ok(())
}

/// Start the query service
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    match tokio::task::spawn_blocking(move || client.health_check()).await {
        Ok(Ok(())) => {
            info!(
                "Ollama connected at {}:{} with model {}",
                config.ollama.host, config.ollama.port, config.ollama.model
            );
        }
        Ok(Err(e)) => {
            warn!("Ollama is not ready: {:#}", e);
            println!("⚠️  Warning: Ollama may not be ready. Indexing and queries may fail.");
        }
        Err(e) => warn!("Ollama health check did not complete: {}", e),
    }

    println!(
        "🌐 Starting query service on {}:{}",
        config.server.host, config.server.port
    );
    println!("Press Ctrl+C to stop the server");

    crate::server::serve(config).await?;

    println!("✅ Shutdown complete");
    Ok(())
}

/// Ask a single question and print the answer
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let Some(question) = question_text(question) else {
        eprintln!("{}", style("Please enter a question.").yellow());
        return Ok(());
    };
    let question = question.to_string();
    let client = ChatClient::from_config(&config.client).context("Invalid backend URL")?;

    tokio::task::spawn_blocking(move || {
        if let Some(answer) = ask_with_spinner(&client, &question) {
            println!("{}", answer);
        }
    })
    .await
    .context("Query task failed")
}

/// Interactive question loop against the query service
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let client = ChatClient::from_config(&config.client).context("Invalid backend URL")?;

    tokio::task::spawn_blocking(move || chat_loop(&client))
        .await
        .context("Chat task failed")?
}

fn chat_loop(client: &ChatClient) -> Result<()> {
    println!("{}", style("🌍 Travel Guide Chatbot").bold().cyan());
    println!("Ask me anything about travel destinations!");
    print_connection_status(client.connection_status());
    println!("Type 'exit' to leave.");
    println!();

    loop {
        let input: String = match Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(input) => input,
            // Ctrl-C or a closed terminal
            Err(_) => break,
        };

        let Some(question) = question_text(&input) else {
            continue;
        };
        if EXIT_COMMANDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        if let Some(answer) = ask_with_spinner(client, question) {
            println!("{} {}", style("Assistant:").bold().green(), answer);
        }
        println!();
    }

    println!("👋 Goodbye!");
    Ok(())
}

/// Trimmed question, or `None` when there is nothing to send
fn question_text(input: &str) -> Option<&str> {
    let question = input.trim();
    (!question.is_empty()).then_some(question)
}

/// Returns the answer, or prints the failure and returns `None`
fn ask_with_spinner(client: &ChatClient, question: &str) -> Option<String> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("Searching...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = client.query(question);
    spinner.finish_and_clear();

    match result {
        Ok(response) => Some(response.answer),
        Err(e) => {
            print_client_error(&e);
            None
        }
    }
}

fn print_client_error(error: &ClientError) {
    warn!("Query failed: {}", error);
    eprintln!("{}", style(error.user_message()).red());
    if error.is_connection() {
        eprintln!("Start it with 'travel-rag serve' or check the backend URL in 'travel-rag config'.");
    }
}

fn print_connection_status(status: ConnectionStatus) {
    if status.is_connected() {
        println!("{}", style("✅ Connected to backend").green());
    } else {
        println!("{}", style("❌ Backend not connected").red());
    }
}

/// Show configuration, embedding model, vector store and backend state
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Travel RAG Status").bold().cyan());
    println!();

    println!("⚙️  Configuration:");
    let config_path = config.config_file_path();
    if config_path.exists() {
        println!("   📁 File: {}", config_path.display());
    } else {
        println!("   📁 File: {} (using defaults)", config_path.display());
    }

    println!();
    println!("🤖 Embedding Model:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let url = client.base_url().clone();
            let model = config.ollama.model.clone();
            match tokio::task::spawn_blocking(move || client.health_check()).await {
                Ok(Ok(())) => println!("   ✅ {} available at {}", model, url),
                Ok(Err(e)) => println!("   ❌ {} not ready at {}: {:#}", model, url, e),
                Err(e) => println!("   ❌ Health check did not complete: {}", e),
            }
        }
        Err(e) => println!("   ❌ Invalid Ollama settings: {:#}", e),
    }

    println!();
    println!("📄 Source Document:");
    let source = &config.store.source_path;
    if source.is_file() {
        println!("   ✅ {}", source.display());
    } else {
        println!("   ⚠️  {} not found", source.display());
    }

    println!();
    println!("💾 Vector Store:");
    let persist_dir = &config.store.persist_dir;
    match VectorStore::open(persist_dir, &config.store.table_name).await {
        Ok(Some(store)) => match store.count_embeddings().await {
            Ok(count) => {
                println!("   ✅ {} ({} chunks)", store.path().display(), count);
                if let Some(dim) = store.dimension() {
                    println!("   📐 Dimension: {}", dim);
                }
            }
            Err(e) => println!("   ❌ {} is unreadable: {}", store.path().display(), e),
        },
        Ok(None) => println!("   📭 No vector store at {}", persist_dir.display()),
        Err(e) => println!("   ❌ Failed to open {}: {}", persist_dir.display(), e),
    }

    println!();
    println!("🌐 Query Service:");
    let client = ChatClient::from_config(&config.client).context("Invalid backend URL")?;
    let backend = client.base_url().clone();
    let status = tokio::task::spawn_blocking(move || client.connection_status())
        .await
        .context("Health check task failed")?;
    if status.is_connected() {
        println!("   ✅ Running at {}", backend);
    } else {
        println!("   ❌ Not reachable at {}", backend);
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'travel-rag index' to rebuild the vector store");
    println!("   • Use 'travel-rag serve' to start the query service");
    println!("   • Use 'travel-rag chat' to ask questions");

    Ok(())
}
