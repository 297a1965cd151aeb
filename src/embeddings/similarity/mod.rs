
use crate::embeddings::Embedding;

/// Position of a corpus entry together with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedEntry {
    pub position: usize,
    pub score: f32,
}

/// Cosine similarity between two embeddings.
///
/// Sparse vectors are compared over their shared terms. Returns exactly `0.0`
/// (never `-0.0`) when nothing is shared or either side has zero magnitude. Mismatched
/// kinds and dense dimensions also score `0.0`.
#[inline]
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    let dot = match (a, b) {
        (Embedding::Dense(left), Embedding::Dense(right)) => {
            if left.len() != right.len() {
                return 0.0;
            }
            left
                .iter()
                .zip(right)
                .fold(0.0, |acc, (x, y)| acc + x * y)
        }
        (Embedding::Sparse(left), Embedding::Sparse(right)) => {
            let (smaller, larger) = if left.len() <= right.len() {
                (left, right)
            } else {
                (right, left)
            };
            smaller
                .iter()
                .filter_map(|(term, weight)| larger.get(term).map(|other| weight * other))
                .fold(0.0, |acc, product| acc + product)
        }
        _ => return 0.0,
    };

    let magnitudes = a.magnitude() * b.magnitude();
    if magnitudes == 0.0 {
        return 0.0;
    }

    dot / magnitudes
}

/// Score every corpus entry against the query and return the best `top_k`, highest first.
///
/// Ties keep corpus order.
#[inline]
pub fn rank<'a, I>(query: &Embedding, corpus: I, top_k: usize) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = &'a Embedding>,
{
    let mut scored: Vec<RankedEntry> = corpus
        .into_iter()
        .enumerate()
        .map(|(position, embedding)| RankedEntry {
            position,
            score: cosine_similarity(query, embedding),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}
