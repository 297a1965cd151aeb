
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, EncoderStrategy, OllamaConfig};
use crate::embeddings::ChunkingConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 HN RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Encoder").bold().yellow());
    eprintln!("Choose how documents are turned into vectors for search.");
    eprintln!();

    config.encoder.strategy = select_strategy(config.encoder.strategy)?;

    if config.encoder.strategy == EncoderStrategy::Ollama {
        eprintln!();
        eprintln!("{}", style("Ollama Configuration").bold().yellow());
        eprintln!("Configure your local Ollama instance for embedding generation.");
        eprintln!();

        configure_ollama(&mut config.ollama)?;

        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.ollama) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before adding documents.");
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());
    configure_chunking(&mut config.chunking)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
        if config.index_path().exists() {
            eprintln!(
                "{}",
                style("Note: an index built with a different encoder is discarded on next load.")
                    .dim()
            );
        }
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    for (section, entries) in config_summary(&config) {
        eprintln!("{}", style(format!("{section}:")).bold().yellow());
        for (label, value) in entries {
            eprintln!("  {label}: {}", style(value).cyan());
        }
        eprintln!();
    }

    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Labelled settings grouped by section, in display order
pub(crate) fn config_summary(config: &Config) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    let mut sections = vec![(
        "Encoder",
        vec![("Strategy", config.encoder.strategy.to_string())],
    )];

    if config.encoder.strategy == EncoderStrategy::Ollama {
        let url = config
            .ollama_url()
            .map_or_else(|e| format!("Invalid ({e})"), |url| url.to_string());
        sections.push((
            "Ollama Settings",
            vec![
                ("URL", url),
                ("Model", config.ollama.model.clone()),
                ("Batch Size", config.ollama.batch_size.to_string()),
                (
                    "Embedding Dimension",
                    config.ollama.embedding_dimension.to_string(),
                ),
            ],
        ));
    }

    sections.push((
        "Chunking",
        vec![
            ("Chunk Size", config.chunking.chunk_size.to_string()),
            ("Chunk Overlap", config.chunking.chunk_overlap.to_string()),
        ],
    ));
    sections.push((
        "Store",
        vec![
            ("Index File", config.index_path().display().to_string()),
            ("Metadata File", config.metadata_path().display().to_string()),
        ],
    ));

    sections
}

fn load_existing_config(config_dir: &Path) -> Config {
    if config_dir.join("config.toml").exists() {
        if let Ok(config) = Config::load(config_dir) {
            eprintln!("{}", style("Found existing configuration.").green());
            return config;
        }
        eprintln!(
            "{}",
            style("Existing configuration is invalid. Using defaults.").yellow()
        );
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }

    Config {
        base_dir: config_dir.to_path_buf(),
        ..Config::default()
    }
}

fn select_strategy(current: EncoderStrategy) -> Result<EncoderStrategy> {
    let strategies = [EncoderStrategy::Tfidf, EncoderStrategy::Ollama];
    let labels = &[
        "tfidf  - local term statistics, no server needed",
        "ollama - dense vectors from an Ollama embedding model",
    ];
    let default_index = strategies
        .iter()
        .position(|&s| s == current)
        .unwrap_or(0);

    let index = Select::new()
        .with_prompt("Encoder strategy")
        .default(default_index)
        .items(labels)
        .interact()?;

    Ok(strategies[index])
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            candidate.ollama_url()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (50..=8192).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 50 and 8192")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    chunking.set_sizes(chunk_size, chunk_overlap)?;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
