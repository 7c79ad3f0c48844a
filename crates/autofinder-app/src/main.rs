//! AutoFinder application binary - composition root.
//!
//! 1. Load configuration (TOML, then environment, then CLI flags)
//! 2. Build the embedding backend and the shared catalog index
//! 3. Wire the chat orchestrator to the index and the llama.cpp client
//! 4. Run the requested command

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use autofinder_chat::{ChatOrchestrator, LlamaServerGenerator};
use autofinder_core::config::AutoFinderConfig;
use autofinder_core::error::AutoFinderError;
use autofinder_core::types::Turn;
use autofinder_vector::{reset_index, CatalogIndex, DynEmbeddingService, HashEmbedding, OnnxEmbeddingService};

use cli::{CliArgs, Command};

/// Select the embedding backend named in the configuration.
fn build_embedder(
    config: &AutoFinderConfig,
) -> Result<Arc<dyn DynEmbeddingService>, AutoFinderError> {
    match config.embedding.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedding::with_dimensions(
            config.embedding.dimensions,
        ))),
        "onnx" => {
            let service = OnnxEmbeddingService::from_directory(
                &config.embedding.model_dir,
                &config.embedding.model_name,
            )?;
            tracing::info!(
                model = %config.embedding.model_name,
                dir = %config.embedding.model_dir.display(),
                "ONNX embedding model loaded"
            );
            Ok(Arc::new(service))
        }
        other => Err(AutoFinderError::Config(format!(
            "unknown embedding provider {other:?} (expected \"hash\" or \"onnx\")"
        ))),
    }
}

fn build_index(config: &AutoFinderConfig) -> Result<Arc<CatalogIndex>, AutoFinderError> {
    let embedder = build_embedder(config)?;
    Ok(Arc::new(CatalogIndex::new(
        &config.catalog.path,
        &config.catalog.index_dir,
        embedder,
    )))
}

/// Build the index handle and refuse to start without a catalog file.
fn open_index(config: &AutoFinderConfig) -> Result<Arc<CatalogIndex>, AutoFinderError> {
    let index = build_index(config)?;
    if let Err(e) = index.check_catalog() {
        tracing::error!(path = %config.catalog.path.display(), error = %e, "Catalog unavailable");
        return Err(e);
    }
    Ok(index)
}

fn build_orchestrator(
    config: &AutoFinderConfig,
    index: Arc<CatalogIndex>,
) -> Result<ChatOrchestrator, AutoFinderError> {
    let generator = Arc::new(LlamaServerGenerator::new(&config.generation)?);
    tracing::info!(url = %generator.url(), "Generation endpoint configured");
    Ok(ChatOrchestrator::new(index, generator, config))
}

fn load_config(path: &Path) -> Result<AutoFinderConfig, AutoFinderError> {
    if path.exists() {
        AutoFinderConfig::load(path)
    } else {
        Ok(AutoFinderConfig::default())
    }
}

async fn run_index(config: &AutoFinderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let index = open_index(config)?;
    let report = index.warmup().await?;
    println!(
        "Index ready: {} vehicles ({}) in {} ms",
        report.entries,
        if report.rebuilt { "rebuilt" } else { "reused" },
        report.elapsed_ms
    );
    Ok(())
}

fn run_reset_index(config: &AutoFinderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dir = &config.catalog.index_dir;
    if reset_index(dir)? {
        println!("Index removed: {}", dir.display());
    } else {
        println!("No index at {}", dir.display());
    }
    Ok(())
}

async fn run_ask(
    config: &AutoFinderConfig,
    history_path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let index = open_index(config)?;

    let content = std::fs::read_to_string(history_path)?;
    let history: Vec<Turn> = serde_json::from_str(&content)?;

    let orchestrator = build_orchestrator(config, index)?;
    let reply = orchestrator.handle_turn_detailed(&history).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{}", reply.reply);
    }
    Ok(())
}

async fn run_chat(config: &AutoFinderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let index = open_index(config)?;

    // Warm the index off the request path; a turn arriving first waits on it.
    let warm = Arc::clone(&index);
    tokio::spawn(async move {
        match warm.warmup().await {
            Ok(report) => tracing::info!(
                entries = report.entries,
                rebuilt = report.rebuilt,
                elapsed_ms = report.elapsed_ms as u64,
                "Warm-up done"
            ),
            Err(e) => tracing::error!(error = %e, "Warm-up failed"),
        }
    });

    let orchestrator = build_orchestrator(config, index)?;
    let mut history: Vec<Turn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("AutoFinder. /reset to start over, /quit to exit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                history.clear();
                println!("(conversation reset)");
                continue;
            }
            _ => {}
        }

        history.push(Turn::user(message));
        match orchestrator.handle_turn(&history).await {
            Ok(reply) => {
                println!("{reply}");
                history.push(Turn::assistant(reply));
            }
            Err(e) => {
                eprintln!("error: {e}");
                history.pop();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = load_config(&config_file)?;
    config.apply_env_overrides()?;
    config.general.log_level = args.resolve_log_level(&config.general.log_level);
    config.validate()?;

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting AutoFinder v{}", env!("CARGO_PKG_VERSION"));
    if config_file.exists() {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    match args.command {
        Command::Index => run_index(&config).await,
        Command::ResetIndex => run_reset_index(&config),
        Command::Ask { history, json } => run_ask(&config, &history, json).await,
        Command::Chat => run_chat(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG: &str = r#"[
        {"id": 1, "marque": "Dacia", "modele": "Logan", "annee": 2021, "kilometrage_km": 20000,
         "carburant": "diesel", "transmission": "manuelle", "prix": 75000, "options": []}
    ]"#;

    fn config_in(dir: &TempDir) -> AutoFinderConfig {
        let mut config = AutoFinderConfig::default();
        config.catalog.path = dir.path().join("voitures.json");
        config.catalog.index_dir = dir.path().join("catalog_index");
        config
    }

    fn write_history(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"[{"role": "user", "content": "bonjour"}]"#).unwrap();
        path
    }

    fn is_catalog_missing(err: &(dyn std::error::Error + 'static)) -> bool {
        matches!(
            err.downcast_ref::<AutoFinderError>(),
            Some(AutoFinderError::CatalogMissing(_))
        )
    }

    // ---- Startup without a catalog ----

    #[tokio::test]
    async fn test_index_command_requires_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_index(&config_in(&dir)).await.unwrap_err();
        assert!(is_catalog_missing(err.as_ref()), "{err}");
        assert!(!dir.path().join("catalog_index").exists());
    }

    #[tokio::test]
    async fn test_ask_command_requires_catalog_even_for_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(&dir);
        let err = run_ask(&config_in(&dir), &history, false).await.unwrap_err();
        assert!(is_catalog_missing(err.as_ref()), "{err}");
    }

    #[tokio::test]
    async fn test_chat_command_requires_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_chat(&config_in(&dir)).await.unwrap_err();
        assert!(is_catalog_missing(err.as_ref()), "{err}");
    }

    // ---- Composition ----

    #[test]
    fn test_open_index_accepts_existing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.catalog.path, CATALOG).unwrap();

        let index = open_index(&config).unwrap();
        assert!(!index.is_ready());
    }

    #[test]
    fn test_unknown_embedding_provider_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.embedding.provider = "word2vec".to_string();
        assert!(matches!(
            build_index(&config),
            Err(AutoFinderError::Config(ref m)) if m.contains("word2vec")
        ));
    }

    #[tokio::test]
    async fn test_index_command_builds_from_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.catalog.path, CATALOG).unwrap();

        run_index(&config).await.unwrap();
        assert!(config.catalog.index_dir.is_dir());
    }
}
