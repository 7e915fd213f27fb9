#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use delta::config::Config;
use delta::error::Result;
use delta::inference::{server, Backend};
use delta::models::{ModelDownloader, ModelRegistry};
use delta::search::{ContextSource, SearchClient};
use std::path::Path;

#[derive(Parser)]
#[command(name = "delta")]
#[command(version)]
#[command(about = "Run LLMs locally with llama.cpp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download model weights and register them under an alias
    Pull {
        /// User-chosen model alias
        alias: String,
        /// Hugging Face repo id, e.g. TheBloke/Llama-3-8B-GGUF
        #[arg(long)]
        repo: String,
        /// GGUF filename within the repo
        #[arg(long = "file")]
        filename: String,
    },
    /// List installed models
    List,
    /// Forget an alias (model file is left on disk)
    Remove {
        /// Alias to forget
        alias: String,
    },
    /// Start an interactive chat session
    Run {
        /// Model alias (or server-side model name with --backend server)
        alias: String,
        /// Augment each question with Wikipedia context
        #[arg(long, conflicts_with_all = ["arxiv", "ddg"])]
        wiki: bool,
        /// Augment each question with arXiv context
        #[arg(long, conflicts_with_all = ["wiki", "ddg"])]
        arxiv: bool,
        /// Augment each question with DuckDuckGo context
        #[arg(long, conflicts_with_all = ["wiki", "arxiv"])]
        ddg: bool,
        /// Override the configured backend ("local" or "server")
        #[arg(long)]
        backend: Option<String>,
    },
    /// Fetch context for a query and ask the model about it
    Search {
        /// Model alias
        alias: String,
        /// Free-text query
        query: String,
        /// Knowledge source: wiki, arxiv, or ddg
        #[arg(long, default_value = "wiki")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Pull {
            alias,
            repo,
            filename,
        } => run_pull(&alias, &repo, &filename).await,
        Commands::List => run_list(&config).await,
        Commands::Remove { alias } => run_remove(&alias),
        Commands::Run {
            alias,
            wiki,
            arxiv,
            ddg,
            backend,
        } => {
            let source = flag_source(wiki, arxiv, ddg);
            run_chat(&config, &alias, source, backend.as_deref()).await
        }
        Commands::Search {
            alias,
            query,
            source,
        } => run_search(&config, &alias, &query, &source).await,
    }
}

fn flag_source(wiki: bool, arxiv: bool, ddg: bool) -> Option<ContextSource> {
    if wiki {
        Some(ContextSource::Wikipedia)
    } else if arxiv {
        Some(ContextSource::Arxiv)
    } else if ddg {
        Some(ContextSource::DuckDuckGo)
    } else {
        None
    }
}

fn parse_source(name: &str) -> Result<ContextSource> {
    match name {
        "wiki" | "wikipedia" => Ok(ContextSource::Wikipedia),
        "arxiv" => Ok(ContextSource::Arxiv),
        "ddg" | "duckduckgo" => Ok(ContextSource::DuckDuckGo),
        _ => Err(delta::DeltaError::Config(format!(
            "Unknown source '{name}'. Must be wiki, arxiv, or ddg"
        ))),
    }
}

async fn run_pull(alias: &str, repo: &str, filename: &str) -> Result<()> {
    let mut registry = ModelRegistry::open_default()?;

    // The downloader only runs for a previously-unknown alias
    if let Ok(existing) = registry.resolve(alias) {
        println!("Model '{alias}' already exists at {}", existing.display());
        return Ok(());
    }

    let downloader = ModelDownloader::new()?;
    let path = downloader.download(alias, repo, filename).await?;
    let registered = registry.register(alias, path)?;

    println!("Model '{alias}' pulled to {}", registered.display());
    Ok(())
}

async fn run_list(config: &Config) -> Result<()> {
    let registry = ModelRegistry::open_default()?;

    if registry.is_empty() {
        println!("No models. Pull one with 'delta pull'.");
    } else {
        println!("Models:");
        for (alias, path) in registry.list_all() {
            println!("  {alias}: {}", display_path(path));
        }
    }

    // With a server backend configured, also show what the server offers.
    // Best effort: an unreachable server is not a listing failure.
    if config.backend.kind == "server" {
        match server::list_models(config).await {
            Ok(models) if !models.is_empty() => {
                println!("Server models:");
                for name in models {
                    println!("  {name}");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Server listing skipped: {e}"),
        }
    }

    Ok(())
}

fn run_remove(alias: &str) -> Result<()> {
    let mut registry = ModelRegistry::open_default()?;
    let path = registry.forget(alias)?;

    println!("Removed '{alias}' from the registry");
    println!("Note: the model file remains at {}", display_path(&path));
    Ok(())
}

async fn run_chat(
    config: &Config,
    alias: &str,
    source: Option<ContextSource>,
    backend_override: Option<&str>,
) -> Result<()> {
    let registry = ModelRegistry::open_default()?;
    let backend = Backend::from_config(config, &registry, alias, backend_override)?;

    let mut search_client = SearchClient::new(&config.search);
    let search = source.map(|s| (&mut search_client, s));

    delta::chat::run_interactive(&backend, &config.chat.system_prompt, search).await
}

async fn run_search(config: &Config, alias: &str, query: &str, source: &str) -> Result<()> {
    let source = parse_source(source)?;
    let registry = ModelRegistry::open_default()?;
    let backend = Backend::from_config(config, &registry, alias, None)?;

    let mut search_client = SearchClient::new(&config.search);
    let Some(snippet) = search_client.fetch(source, query).await? else {
        println!("No {} context found for '{query}'.", source.label());
        return Ok(());
    };

    println!("{}: {}\n", source.label(), snippet.summary);

    let response =
        delta::chat::ask_with_context(&backend, &config.chat.system_prompt, query, &snippet)
            .await?;
    println!("Delta: {response}");

    for (i, citation) in snippet.citations.iter().enumerate() {
        println!("{}. {citation}", i + 1);
    }

    Ok(())
}

/// Show paths relative to home where possible, matching `~/...` habits
fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rel) = path.strip_prefix(&home) {
            return format!("~/{}", rel.display());
        }
    }
    path.display().to_string()
}
