//! Loads and validates a settings file, then prints the effective settings.
//!
//! Usage: `validate_config [path]`; the path falls back to `AGENTIC_RAG_CONFIG`,
//! then to built-in defaults. Environment overrides apply either way.

use agentic_rag::config::{Settings, CONFIG_PATH_ENV};
use agentic_rag::documents::list_documents;
use anyhow::Context;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

    let settings = Settings::load(path.as_deref()).with_context(|| match path {
        Some(ref p) => format!("invalid settings in {}", p.display()),
        None => "invalid settings (defaults + environment)".to_string(),
    })?;
    agentic_rag::logging::init(&settings.logging).context("cannot initialize logging")?;

    match path {
        Some(ref p) => println!("Settings file: {}", p.display()),
        None => println!("Settings file: <none, using defaults>"),
    }
    println!("Application:   {} ({:?})", settings.app_name, settings.environment);
    println!(
        "LLM:           {} / {} (temperature {}, {}s timeout)",
        settings.llm.provider, settings.llm.model_name, settings.llm.temperature, settings.llm.timeout_secs
    );
    println!(
        "Embedding:     {} (batches of {})",
        settings.embedding.model_name, settings.embedding.batch_size
    );
    println!("Agent mode:    {} (tool retrieval above {} tools)", settings.agent.mode, settings.agent.tool_retrieval_threshold);
    println!(
        "Cache:         {} (max {} entries, ttl {}s)",
        if settings.cache.enabled { "enabled" } else { "disabled" },
        settings.cache.max_size,
        settings.cache.ttl_secs
    );
    println!(
        "Retry:         {} retries, {}ms base, {}ms cap",
        settings.retry.max_retries, settings.retry.base_delay_ms, settings.retry.max_delay_ms
    );
    match settings.circuit_breaker.to_config() {
        Some(cb) => println!(
            "Breaker:       opens after {} failures, {}s cooldown",
            cb.failure_threshold,
            cb.cooldown.as_secs()
        ),
        None => println!("Breaker:       disabled"),
    }
    println!(
        "Chunking:      {} words, {} overlap",
        settings.chunking.chunk_size, settings.chunking.chunk_overlap
    );

    match list_documents(&settings.docs_dir, &["txt", "md"]) {
        Ok(docs) => println!("Documents:     {} in {}", docs.len(), settings.docs_dir.display()),
        Err(e) => println!("Documents:     cannot read {}: {}", settings.docs_dir.display(), e),
    }

    println!("\nSettings are valid.");
    Ok(())
}
