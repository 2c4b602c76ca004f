//! JSON-lines transport over stdin/stdout.
//!
//! Each input line is one action request; each output line is either a
//! response or an `{"event": ...}` broadcast from the engine. EOF on
//! stdin suspends the engine and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use pagesense::analysis::{AnalysisProvider, OllamaProvider};
use pagesense::{Action, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("pagesense starting up...");

    let data_dir = match std::env::var_os("PAGESENSE_DATA") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("resolving working directory")?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    // The Ollama provider is opt-in; without it every analysis takes the
    // heuristic path and chat answers with the fixed apology.
    let provider: Option<Arc<dyn AnalysisProvider>> =
        if std::env::var_os("PAGESENSE_OLLAMA_URL").is_some() {
            Some(Arc::new(OllamaProvider::from_env()))
        } else {
            None
        };

    let engine = Engine::open(&data_dir, provider).context("opening engine")?;

    // Broadcast events interleave with responses on stdout, one JSON
    // object per line either way.
    let mut events = engine.subscribe();
    let event_printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => log::warn!("failed to serialize event: {err}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Action>(line) {
            Ok(action) => engine.dispatch(action).await,
            Err(err) => {
                log::warn!("rejected malformed request: {err}");
                pagesense::ActionResponse::failure(format!("malformed request: {err}"))
            }
        };
        println!(
            "{}",
            serde_json::to_string(&response).context("serializing response")?
        );
    }

    log::info!("stdin closed, suspending");
    engine.suspend().await?;
    event_printer.abort();
    Ok(())
}
