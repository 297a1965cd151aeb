#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::document::Document;
use crate::embeddings::{
    ChunkingConfig, Embedding, Encoder, EncoderState, chunk_document, encoder_from_config, rank,
};
use crate::{RagError, Result};

/// One indexed chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub document: Document,
    pub embedding: Embedding,
}

/// A metadata copy returned by search, annotated with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: Document,
    pub similarity_score: f32,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    model_name: &'a str,
    documents: &'a [IndexEntry],
    vocabulary: &'a BTreeMap<String, u32>,
    idf_scores: &'a BTreeMap<String, f32>,
    /// Texts the encoder has seen, the corpus size its idf weights were computed over
    doc_count: usize,
}

#[derive(Deserialize)]
struct IndexFile {
    model_name: String,
    documents: Vec<IndexEntry>,
    #[serde(default)]
    vocabulary: BTreeMap<String, u32>,
    #[serde(default)]
    idf_scores: BTreeMap<String, f32>,
    doc_count: usize,
}

type MetadataBlob = (Vec<Document>, HashMap<String, usize>);

/// Persistent in-memory similarity index over document chunks.
///
/// State lives in two files: a JSON index holding every entry with its embedding
/// plus the encoder's side state, and a bincode blob with the metadata copies and
/// the identity map. Entry `i` and metadata copy `i` always describe the same chunk.
pub struct VectorStore {
    encoder: Box<dyn Encoder>,
    chunking: ChunkingConfig,
    index_path: PathBuf,
    metadata_path: PathBuf,
    entries: Vec<IndexEntry>,
    metadata: Vec<Document>,
    id_to_idx: HashMap<String, usize>,
}

impl VectorStore {
    /// Create a store using the encoder, chunking and file locations from the configuration
    ///
    /// # Arguments
    /// * `config` - Application configuration
    ///
    /// # Returns
    /// * `Result<Self>` - The store, populated from disk when a usable index exists
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let encoder = encoder_from_config(config)?;
        Ok(Self::open(
            encoder,
            config.chunking.clone(),
            config.index_path(),
            config.metadata_path(),
        ))
    }

    /// Open a store with an explicit encoder.
    ///
    /// Loading is best effort: a missing, unreadable or inconsistent pair of files,
    /// or an index built by a different encoder, leaves the store empty. A pair that
    /// only disagrees in length keeps the entries both files share.
    #[inline]
    pub fn open(
        encoder: Box<dyn Encoder>,
        chunking: ChunkingConfig,
        index_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
    ) -> Self {
        let mut store = Self {
            encoder,
            chunking,
            index_path: index_path.into(),
            metadata_path: metadata_path.into(),
            entries: Vec::new(),
            metadata: Vec::new(),
            id_to_idx: HashMap::new(),
        };
        store.load();
        store
    }

    #[inline]
    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[inline]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Chunk, encode and append documents that are not indexed yet, then persist.
    ///
    /// Invalid documents and chunks whose identity is already present are skipped.
    /// Returns the number of entries appended. On an encoding failure nothing is
    /// appended and the error is returned.
    #[inline]
    pub fn add_documents(&mut self, documents: &[Document]) -> Result<usize> {
        info!("Adding batch of {} documents", documents.len());

        let mut seen_in_batch = HashSet::new();
        let mut new_chunks = Vec::new();
        for document in documents {
            if let Err(e) = document.validate() {
                warn!("Skipping invalid document: {}", e);
                continue;
            }

            for chunk in chunk_document(document, &self.chunking) {
                let key = chunk.identity_key().to_string();
                if self.id_to_idx.contains_key(&key) || !seen_in_batch.insert(key) {
                    continue;
                }
                new_chunks.push(chunk);
            }
        }

        if new_chunks.is_empty() {
            info!("No new documents to add");
            return Ok(0);
        }

        let texts: Vec<String> = new_chunks.iter().map(Document::searchable_text).collect();
        let snapshot = self.encoder.state();
        let embeddings = match self.encoder.encode(&texts) {
            Ok(embeddings) => embeddings,
            Err(e) => {
                self.encoder.restore(snapshot);
                return Err(e);
            }
        };
        if embeddings.len() != new_chunks.len() {
            self.encoder.restore(snapshot);
            return Err(RagError::Embedding(format!(
                "Encoder returned {} embeddings for {} texts",
                embeddings.len(),
                new_chunks.len()
            )));
        }

        let added = new_chunks.len();
        for (chunk, embedding) in new_chunks.into_iter().zip(embeddings) {
            let position = self.entries.len();
            self.id_to_idx
                .insert(chunk.identity_key().to_string(), position);
            self.metadata.push(chunk.clone());
            self.entries.push(IndexEntry {
                document: chunk,
                embedding,
            });
        }

        info!(
            "Added {} new entries. Total: {}",
            added,
            self.entries.len()
        );

        self.save();
        Ok(added)
    }

    /// Rank every entry against the query and return the best `top_k` metadata copies
    ///
    /// # Arguments
    /// * `query` - Free text query
    /// * `top_k` - Maximum number of hits
    ///
    /// # Returns
    /// * `Result<Vec<SearchHit>>` - Hits ordered by descending similarity, ties in insertion order
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.encoder.encode_query(query)?;
        let ranked = rank(
            &query_embedding,
            self.entries.iter().map(|entry| &entry.embedding),
            top_k,
        );

        debug!(
            "Ranked {} entries for query, returning {}",
            self.entries.len(),
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .filter_map(|entry| {
                self.metadata.get(entry.position).map(|document| SearchHit {
                    document: document.clone(),
                    similarity_score: entry.score,
                })
            })
            .collect())
    }

    /// Number of indexed entries (chunks)
    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Number of distinct source documents represented in the index
    #[inline]
    pub fn document_count(&self) -> usize {
        self.existing_ids().len()
    }

    /// Ids of the source documents represented in the index
    #[inline]
    pub fn existing_ids(&self) -> HashSet<String> {
        self.metadata.iter().map(|doc| doc.id.clone()).collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, reset encoder state and delete both files
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.metadata.clear();
        self.id_to_idx.clear();
        self.encoder.restore(EncoderState::default());

        for path in [&self.index_path, &self.metadata_path] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Failed to remove {}: {}", path.display(), e);
                    return Err(RagError::Io(e));
                }
            }
        }

        info!("Cleared vector store");
        Ok(())
    }

    fn load(&mut self) {
        if !self.index_path.exists() || !self.metadata_path.exists() {
            info!("No existing index found, starting with an empty store");
            return;
        }

        match self.read_artifacts() {
            Ok((index, metadata, id_to_idx)) => {
                self.encoder.restore(EncoderState {
                    vocabulary: index.vocabulary,
                    idf_scores: index.idf_scores,
                    documents_seen: index.doc_count,
                });
                self.entries = index.documents;
                self.metadata = metadata;
                self.id_to_idx = id_to_idx;
                info!("Loaded index with {} entries", self.entries.len());
            }
            Err(e) => {
                warn!("Discarding stored index: {}", e);
            }
        }
    }

    fn read_artifacts(&self) -> Result<(IndexFile, Vec<Document>, HashMap<String, usize>)> {
        let index_file = File::open(&self.index_path)?;
        let mut index: IndexFile = serde_json::from_reader(BufReader::new(index_file))
            .map_err(|e| RagError::Storage(format!("Failed to parse index file: {e}")))?;

        let metadata_file = File::open(&self.metadata_path)?;
        let (mut metadata, mut id_to_idx): MetadataBlob =
            bincode::deserialize_from(BufReader::new(metadata_file))
                .map_err(|e| RagError::Storage(format!("Failed to parse metadata file: {e}")))?;

        if index.model_name != self.encoder.name() {
            return Err(RagError::Storage(format!(
                "Index was built with encoder {:?}, active encoder is {:?}",
                index.model_name,
                self.encoder.name()
            )));
        }

        if index.documents.len() != metadata.len() {
            let common = index.documents.len().min(metadata.len());
            if index.documents[..common]
                .iter()
                .zip(&metadata[..common])
                .any(|(entry, document)| entry.document.identity_key() != document.identity_key())
            {
                return Err(RagError::Storage(format!(
                    "Index holds {} entries and metadata holds {}, with no common prefix",
                    index.documents.len(),
                    metadata.len()
                )));
            }

            warn!(
                "Index holds {} entries but metadata holds {}, keeping the first {}",
                index.documents.len(),
                metadata.len(),
                common
            );
            index.documents.truncate(common);
            metadata.truncate(common);
            id_to_idx = metadata
                .iter()
                .enumerate()
                .map(|(position, document)| (document.identity_key().to_string(), position))
                .collect();
        }

        if index.doc_count < index.documents.len() {
            debug!(
                "Encoder saw {} texts but the index holds {} entries",
                index.doc_count,
                index.documents.len()
            );
            index.doc_count = index.documents.len();
        }

        if let Some((key, position)) = id_to_idx
            .iter()
            .find(|(_, position)| **position >= metadata.len())
        {
            return Err(RagError::Storage(format!(
                "Identity {key:?} points at position {position}, past the end of the index"
            )));
        }

        Ok((index, metadata, id_to_idx))
    }

    fn save(&self) {
        match self.write_artifacts() {
            Ok(()) => info!("Index saved successfully"),
            Err(e) => error!("Failed to save index: {}", e),
        }
    }

    fn write_artifacts(&self) -> Result<()> {
        let state = self.encoder.state();
        let index = IndexFileRef {
            model_name: self.encoder.name(),
            documents: &self.entries,
            vocabulary: &state.vocabulary,
            idf_scores: &state.idf_scores,
            doc_count: state.documents_seen,
        };

        let index_temp = write_temp(&self.index_path, |writer| {
            serde_json::to_writer(writer, &index)
                .map_err(|e| RagError::Storage(format!("Failed to serialize index: {e}")))
        })?;

        let metadata = (&self.metadata, &self.id_to_idx);
        let metadata_temp = match write_temp(&self.metadata_path, |writer| {
            bincode::serialize_into(writer, &metadata)
                .map_err(|e| RagError::Storage(format!("Failed to serialize metadata: {e}")))
        }) {
            Ok(path) => path,
            Err(e) => {
                discard_temp(&index_temp);
                return Err(e);
            }
        };

        // Both files are complete on disk before either replaces the previous pair
        if let Err(e) = fs::rename(&index_temp, &self.index_path) {
            discard_temp(&index_temp);
            discard_temp(&metadata_temp);
            return Err(RagError::Io(e));
        }
        if let Err(e) = fs::rename(&metadata_temp, &self.metadata_path) {
            discard_temp(&metadata_temp);
            return Err(RagError::Io(e));
        }

        Ok(())
    }
}

/// Write a sibling temporary file for `path` and return its location
fn write_temp<F>(path: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut writer = BufWriter::new(File::create(&temp_path)?);
    let written = write(&mut writer).and_then(|()| writer.flush().map_err(RagError::Io));
    drop(writer);

    if let Err(e) = written {
        discard_temp(&temp_path);
        return Err(e);
    }

    Ok(temp_path)
}

fn discard_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}
