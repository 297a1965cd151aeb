
use fancy_regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::embeddings::{Embedding, Encoder, EncoderState};

pub const ENCODER_NAME: &str = "simple-tfidf";

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

/// Sparse encoder weighting each term by raw term frequency times idf.
///
/// The vocabulary and idf table only ever grow. Weights are fixed when a term is
/// first seen, computed over that batch, and are not revisited as the corpus grows.
#[derive(Debug, Clone, Default)]
pub struct TfIdfEncoder {
    vocabulary: BTreeMap<String, u32>,
    idf_scores: BTreeMap<String, f32>,
    documents_seen: usize,
}

impl TfIdfEncoder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    #[inline]
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.idf_scores.get(term).copied()
    }

    /// Weight used at query time for a term the corpus has never contained
    fn unseen_idf(&self) -> f32 {
        (self.documents_seen.max(1) as f32).ln()
    }

    fn weigh(&self, tokens: &[String], fallback: Option<f32>) -> Embedding {
        let mut weights = BTreeMap::new();
        for (term, tf) in term_frequencies(tokens) {
            let idf = match (self.idf_scores.get(term), fallback) {
                (Some(idf), _) => *idf,
                (None, Some(idf)) => idf,
                (None, None) => continue,
            };
            weights.insert(term.to_string(), tf as f32 * idf);
        }
        Embedding::Sparse(weights)
    }
}

impl Encoder for TfIdfEncoder {
    #[inline]
    fn name(&self) -> &str {
        ENCODER_NAME
    }

    #[inline]
    fn encode(&mut self, texts: &[String]) -> crate::Result<Vec<Embedding>> {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|text| tokenize(text)).collect();

        let mut batch_terms: Vec<&str> = Vec::new();
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen_in_text = HashSet::new();
            for token in tokens {
                if !seen_in_text.insert(token.as_str()) {
                    continue;
                }
                let count = document_frequency.entry(token.as_str()).or_insert(0);
                if *count == 0 {
                    batch_terms.push(token.as_str());
                }
                *count += 1;
            }
        }

        let total = self.documents_seen.max(tokenized.len()) as f32;
        let mut new_terms = 0;
        for term in batch_terms {
            if !self.vocabulary.contains_key(term) {
                let next_id = u32::try_from(self.vocabulary.len()).unwrap_or(u32::MAX);
                self.vocabulary.insert(term.to_string(), next_id);
                new_terms += 1;
            }
            if !self.idf_scores.contains_key(term) {
                let df = document_frequency.get(term).copied().unwrap_or(0).max(1);
                self.idf_scores
                    .insert(term.to_string(), (total / df as f32).ln());
            }
        }

        self.documents_seen += texts.len();
        debug!(
            "Encoded {} texts, {} new terms, vocabulary size {}",
            texts.len(),
            new_terms,
            self.vocabulary.len()
        );

        Ok(tokenized
            .iter()
            .map(|tokens| self.weigh(tokens, None))
            .collect())
    }

    #[inline]
    fn encode_query(&self, query: &str) -> crate::Result<Embedding> {
        Ok(self.weigh(&tokenize(query), Some(self.unseen_idf())))
    }

    #[inline]
    fn state(&self) -> EncoderState {
        EncoderState {
            vocabulary: self.vocabulary.clone(),
            idf_scores: self.idf_scores.clone(),
            documents_seen: self.documents_seen,
        }
    }

    #[inline]
    fn restore(&mut self, state: EncoderState) {
        self.vocabulary = state.vocabulary;
        self.idf_scores = state.idf_scores;
        self.documents_seen = state.documents_seen;
    }
}

/// Lowercase the text and pull out word tokens
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_REGEX
        .find_iter(&lowered)
        .filter_map(|found| found.ok())
        .map(|found| found.as_str().to_string())
        .collect()
}

fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}
