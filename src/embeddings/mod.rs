// Embeddings module
// Chunking, the encoder strategies and similarity ranking


pub mod chunking;
pub mod ollama;
pub mod similarity;
pub mod tfidf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{Config, EncoderStrategy};

pub use chunking::{ChunkingConfig, chunk_document, split_text};
pub use ollama::{ModelInfo, OllamaClient};
pub use similarity::{RankedEntry, cosine_similarity, rank};
pub use tfidf::TfIdfEncoder;

/// Vector representation of a piece of text.
///
/// Dense vectors come from a pretrained model, sparse vectors map terms to
/// tf-idf weights. Both serialize to their natural JSON shape (array or object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    Dense(Vec<f32>),
    Sparse(BTreeMap<String, f32>),
}

impl Embedding {
    /// Euclidean norm over the present dimensions
    #[inline]
    pub fn magnitude(&self) -> f32 {
        match self {
            Self::Dense(values) => values.iter().map(|v| v * v).sum::<f32>().sqrt(),
            Self::Sparse(weights) => weights.values().map(|v| v * v).sum::<f32>().sqrt(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Dense(values) => values.is_empty(),
            Self::Sparse(weights) => weights.is_empty(),
        }
    }
}

/// Side state kept by frequency-statistics encoders and persisted with the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    #[serde(default)]
    pub vocabulary: BTreeMap<String, u32>,
    #[serde(default)]
    pub idf_scores: BTreeMap<String, f32>,
    #[serde(default)]
    pub documents_seen: usize,
}

/// Maps text to vectors comparable with cosine similarity
pub trait Encoder {
    /// Identifier stored with the index; an index built by another encoder is discarded on load
    fn name(&self) -> &str;

    /// Encode a batch of document texts, one embedding per input in order.
    ///
    /// Frequency-statistics encoders extend their vocabulary and idf table here.
    fn encode(&mut self, texts: &[String]) -> crate::Result<Vec<Embedding>>;

    /// Encode a search query without touching encoder state
    fn encode_query(&self, query: &str) -> crate::Result<Embedding>;

    #[inline]
    fn state(&self) -> EncoderState {
        EncoderState::default()
    }

    #[inline]
    fn restore(&mut self, _state: EncoderState) {}
}

/// Build the encoder selected in the configuration
#[inline]
pub fn encoder_from_config(config: &Config) -> anyhow::Result<Box<dyn Encoder>> {
    match config.encoder.strategy {
        EncoderStrategy::Tfidf => Ok(Box::new(TfIdfEncoder::new())),
        EncoderStrategy::Ollama => {
            let client =
                OllamaClient::new(config).context("Failed to initialize Ollama client")?;
            Ok(Box::new(client))
        }
    }
}
