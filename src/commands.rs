use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{Config, EncoderStrategy};
use crate::database::{SearchHit, VectorStore};
use crate::document::Document;
use crate::document::cleaner::{clean_extracted_text, clean_html};
use crate::document::format::{format_age, format_score, reading_time_minutes, truncate_text};
use crate::embeddings::OllamaClient;

const SNIPPET_LENGTH: usize = 200;

/// Import documents from a JSON array file into the index
#[inline]
pub fn import_documents(config_dir: &Path, file: &Path) -> Result<()> {
    info!("Importing documents from {}", file.display());

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read documents file: {}", file.display()))?;
    let documents: Vec<Document> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse documents file: {}", file.display()))?;

    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let mut store = VectorStore::new(&config).context("Failed to open vector store")?;

    let existing_ids = store.existing_ids();
    let total = documents.len();
    let new_documents: Vec<Document> = documents
        .into_iter()
        .filter(|doc| !existing_ids.contains(&doc.id))
        .map(prepare_document)
        .collect();

    if new_documents.is_empty() {
        println!("No new documents to add ({} already indexed).", total);
        return Ok(());
    }

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Indexing {} documents", new_documents.len()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = store.add_documents(&new_documents);
    bar.finish_and_clear();

    let added = result.context("Failed to add documents")?;

    println!(
        "Added {} new documents ({} entries). Skipped {} already indexed.",
        new_documents.len(),
        added,
        total - new_documents.len()
    );
    println!(
        "Index now holds {} entries from {} documents.",
        store.count(),
        store.document_count()
    );

    Ok(())
}

/// Run a query against the index and print the hits
#[inline]
pub fn search(config_dir: &Path, query: &str, top_k: usize, json: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let store = VectorStore::new(&config).context("Failed to open vector store")?;

    let hits = match store.search(query, top_k) {
        Ok(hits) => hits,
        Err(e) => {
            error!("Search failed: {}", e);
            Vec::new()
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&hits).context("Failed to serialize results")?
        );
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found for \"{}\".", query);
        return Ok(());
    }

    println!("Results for \"{}\" ({} found):", query, hits.len());
    println!();

    let now = Utc::now();
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}", format_hit(rank + 1, hit, now));
        println!();
    }

    Ok(())
}

/// Show index size, encoder and file locations
#[inline]
pub fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let store = VectorStore::new(&config).context("Failed to open vector store")?;

    println!("📊 HN RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Index:");
    println!("   Encoder: {}", store.encoder_name());
    println!("   Entries: {}", store.count());
    println!("   Documents: {}", store.document_count());
    println!("   Index file: {}", store.index_path().display());
    println!("   Metadata file: {}", store.metadata_path().display());

    if config.encoder.strategy == EncoderStrategy::Ollama {
        println!();
        println!("🤖 Ollama Status:");
        match OllamaClient::new(&config) {
            Ok(client) => match client.health_check() {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Model: {}", config.ollama.model);
                    println!("   🔢 Batch Size: {}", config.ollama.batch_size);
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
                }
            },
            Err(e) => {
                println!("   ❌ Ollama: Failed to create client - {}", e);
            }
        }
    }

    Ok(())
}

/// Remove every entry and both index files
#[inline]
pub fn clear_index(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let mut store = VectorStore::new(&config).context("Failed to open vector store")?;

    let previous = store.count();
    store.clear().context("Failed to clear vector store")?;

    println!("Cleared {} entries from the index.", previous);
    Ok(())
}

/// Clean markup and escaped whitespace out of an incoming document
fn prepare_document(mut document: Document) -> Document {
    document.text = clean_html(&document.text);
    for comment in &mut document.comments {
        comment.text = clean_html(&comment.text);
    }
    document.extracted_content = document
        .extracted_content
        .map(|content| clean_extracted_text(&content, false))
        .filter(|content| !content.is_empty());
    document
}

fn format_hit(rank: usize, hit: &SearchHit, now: DateTime<Utc>) -> String {
    let document = &hit.document;
    let mut lines = vec![format!(
        "{}. {} (similarity {:.3})",
        rank, document.title, hit.similarity_score
    )];

    let mut details = vec![format!("{} points", format_score(document.score))];
    if !document.author.is_empty() {
        details.push(format!("by {}", document.author));
    }
    if let Some(created_at) = document.created_at() {
        details.push(format_age(created_at, now));
    }
    if let Some(domain) = document.domain() {
        details.push(domain);
    }
    lines.push(format!("   {}", details.join(" | ")));

    if !document.text.is_empty() {
        lines.push(format!(
            "   {} ({} min read)",
            truncate_text(&document.text, SNIPPET_LENGTH),
            reading_time_minutes(&document.text)
        ));
    }

    lines.join("\n")
}
