use super::*;
use crate::embeddings::TfIdfEncoder;
use tempfile::TempDir;

/// Returns the same dense vector for every text
struct ConstantEncoder;

impl Encoder for ConstantEncoder {
    fn name(&self) -> &str {
        "constant"
    }

    fn encode(&mut self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|_| Embedding::Dense(vec![1.0, 1.0]))
            .collect())
    }

    fn encode_query(&self, _query: &str) -> Result<Embedding> {
        Ok(Embedding::Dense(vec![1.0, 1.0]))
    }
}

/// Fails every call, for checking that failures leave the store untouched
struct FailingEncoder;

impl Encoder for FailingEncoder {
    fn name(&self) -> &str {
        "simple-tfidf"
    }

    fn encode(&mut self, _texts: &[String]) -> Result<Vec<Embedding>> {
        Err(RagError::Embedding("encoder unavailable".to_string()))
    }

    fn encode_query(&self, _query: &str) -> Result<Embedding> {
        Err(RagError::Embedding("encoder unavailable".to_string()))
    }
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 10,
    }
}

fn open_with(dir: &TempDir, encoder: Box<dyn Encoder>) -> VectorStore {
    VectorStore::open(
        encoder,
        small_chunks(),
        dir.path().join("index.json"),
        dir.path().join("metadata.bin"),
    )
}

fn open_tfidf(dir: &TempDir) -> VectorStore {
    open_with(dir, Box::new(TfIdfEncoder::new()))
}

fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "1",
            "Rust ownership",
            "Rust uses ownership and borrowing for memory safety.",
        ),
        Document::new(
            "2",
            "Go concurrency",
            "Go uses goroutines and channels for concurrency.",
        ),
        Document::new("3", "Python typing", "Python adds optional type hints."),
    ]
}

#[test]
fn new_store_is_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_tfidf(&temp_dir);

    assert!(store.is_empty());
    assert_eq!(store.count(), 0);
    assert_eq!(store.document_count(), 0);
    assert!(store.existing_ids().is_empty());
    assert!(!store.index_path().exists());
}

#[test]
fn new_from_config_uses_configured_paths() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let store = VectorStore::new(&config).expect("should create store");

    assert_eq!(store.encoder_name(), "simple-tfidf");
    assert_eq!(store.index_path(), temp_dir.path().join("hn_index.json"));
    assert_eq!(
        store.metadata_path(),
        temp_dir.path().join("hn_metadata.bin")
    );
}

#[test]
fn add_documents_persists_both_artifacts() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);

    let added = store
        .add_documents(&sample_documents())
        .expect("should add documents");

    assert_eq!(added, 3);
    assert_eq!(store.count(), 3);
    assert_eq!(store.document_count(), 3);
    assert!(store.index_path().exists());
    assert!(store.metadata_path().exists());

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(store.index_path()).expect("should read index file"),
    )
    .expect("index file should be json");
    assert_eq!(json["model_name"], "simple-tfidf");
    assert_eq!(json["doc_count"], 3);
    assert_eq!(json["documents"][0]["id"], "1");
    assert_eq!(json["documents"][0]["chunk_id"], "1_0");
    assert!(json["documents"][0]["embedding"].is_object());
    assert!(json["vocabulary"].get("goroutines").is_some());
    assert!(json["idf_scores"].get("goroutines").is_some());
}

#[test]
fn adding_same_documents_twice_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);

    store
        .add_documents(&sample_documents())
        .expect("should add documents");
    let added_again = store
        .add_documents(&sample_documents())
        .expect("should add documents again");

    assert_eq!(added_again, 0);
    assert_eq!(store.count(), 3);
}

#[test]
fn duplicates_within_one_batch_are_added_once() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    let document = Document::new("7", "Repeated", "Same story twice.");

    let added = store
        .add_documents(&[document.clone(), document])
        .expect("should add documents");

    assert_eq!(added, 1);
    assert_eq!(store.count(), 1);
}

#[test]
fn invalid_documents_are_skipped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);

    let added = store
        .add_documents(&[
            Document::new("", "No id", "text"),
            Document::new("9", "  ", "text"),
            Document::new("10", "Valid", "text"),
        ])
        .expect("should add documents");

    assert_eq!(added, 1);
    assert_eq!(
        store.existing_ids(),
        HashSet::from(["10".to_string()])
    );
}

#[test]
fn empty_batch_does_not_write_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);

    assert_eq!(store.add_documents(&[]).expect("should accept empty batch"), 0);
    assert!(!store.index_path().exists());
}

#[test]
fn long_documents_are_chunked() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    let long_text = "Memory safety without garbage collection. ".repeat(20);

    store
        .add_documents(&[
            Document::new("1", "Long read", long_text),
            Document::new("2", "Short", "Tiny."),
        ])
        .expect("should add documents");

    assert!(store.count() > 2);
    assert_eq!(store.document_count(), 2);
    assert_eq!(
        store.existing_ids(),
        HashSet::from(["1".to_string(), "2".to_string()])
    );
}

#[test]
fn search_on_empty_store_returns_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_with(&temp_dir, Box::new(FailingEncoder));

    let hits = store
        .search("anything", 5)
        .expect("empty store search should succeed");
    assert!(hits.is_empty());
}

#[test]
fn search_ranks_matching_document_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&sample_documents())
        .expect("should add documents");

    let hits = store
        .search("concurrency in Go", 3)
        .expect("search should succeed");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].document.id, "2");
    assert!(hits[0].similarity_score > 0.0);
    assert_eq!(hits[1].similarity_score, 0.0);
    assert!(
        hits.windows(2)
            .all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
    );
}

#[test]
fn goroutines_document_wins_go_concurrency_query() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&[
            Document::new(
                "1",
                "Rust borrow checker",
                "The borrow checker enforces ownership rules at compile time.",
            ),
            Document::new(
                "2",
                "Go goroutines",
                "Lightweight threads scheduled by the runtime.",
            ),
            Document::new(
                "3",
                "Python GIL removal",
                "Removing the global interpreter lock from CPython.",
            ),
        ])
        .expect("should add documents");

    let first = store
        .search("concurrency in Go", 3)
        .expect("search should succeed");
    let second = store
        .search("concurrency in Go", 3)
        .expect("search should succeed");

    assert_eq!(first[0].document.title, "Go goroutines");
    assert!(first[0].similarity_score > first[1].similarity_score);
    assert_eq!(first, second);
}

#[test]
fn zero_score_ties_keep_insertion_order_across_batches() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&[
            Document::new("p", "alpha", "first"),
            Document::new("q", "beta", "second"),
        ])
        .expect("should add first batch");
    // "common" appears in every text of this batch, so its idf is zero
    store
        .add_documents(&[
            Document::new("r", "common gamma", "third"),
            Document::new("s", "common delta", "fourth"),
        ])
        .expect("should add second batch");

    let hits = store
        .search("common zzz", 4)
        .expect("search should succeed");

    let ids: Vec<&str> = hits.iter().map(|hit| hit.document.id.as_str()).collect();
    assert_eq!(ids, vec!["p", "q", "r", "s"]);
    assert!(
        hits.iter()
            .all(|hit| hit.similarity_score == 0.0 && hit.similarity_score.is_sign_positive())
    );

    let json = serde_json::to_string(&hits).expect("hits should serialize");
    assert!(!json.contains("-0.0"));
}

#[test]
fn search_respects_top_k() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&sample_documents())
        .expect("should add documents");

    assert_eq!(store.search("rust", 1).expect("search should succeed").len(), 1);
    assert_eq!(store.search("rust", 10).expect("search should succeed").len(), 3);
    assert!(store.search("rust", 0).expect("search should succeed").is_empty());
}

#[test]
fn ties_keep_insertion_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_with(&temp_dir, Box::new(ConstantEncoder));
    store
        .add_documents(&sample_documents())
        .expect("should add documents");

    for _ in 0..3 {
        let ids: Vec<String> = store
            .search("whatever", 3)
            .expect("search should succeed")
            .into_iter()
            .map(|hit| hit.document.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}

#[test]
fn search_failure_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }

    let store = open_with(&temp_dir, Box::new(FailingEncoder));
    assert_eq!(store.count(), 3);
    assert!(matches!(
        store.search("go", 3),
        Err(RagError::Embedding(_))
    ));
}

#[test]
fn encoding_failure_leaves_store_unchanged() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_with(&temp_dir, Box::new(FailingEncoder));

    let result = store.add_documents(&sample_documents());

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert_eq!(store.count(), 0);
    assert!(!store.index_path().exists());
}

#[test]
fn reload_restores_entries_and_encoder_state() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let before = {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
        store
            .search("memory safety in rust", 3)
            .expect("search should succeed")
    };

    let store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 3);
    assert_eq!(store.document_count(), 3);

    let after = store
        .search("memory safety in rust", 3)
        .expect("search should succeed");
    assert_eq!(after.len(), before.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.document, b.document);
        assert!((a.similarity_score - b.similarity_score).abs() < 1e-5);
    }
    assert_eq!(after[0].document.id, "1");
}

#[test]
fn reloaded_store_still_deduplicates() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }

    let mut store = open_tfidf(&temp_dir);
    let added = store
        .add_documents(&sample_documents())
        .expect("should add documents");

    assert_eq!(added, 0);
    assert_eq!(store.count(), 3);
}

#[test]
fn corrupt_index_resets_to_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }
    fs::write(temp_dir.path().join("index.json"), "{ not json").expect("should corrupt index");

    let store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 0);
    assert!(store.existing_ids().is_empty());
}

#[test]
fn corrupt_metadata_resets_to_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }
    fs::write(temp_dir.path().join("metadata.bin"), [0xff_u8; 3]).expect("should corrupt metadata");

    let store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 0);
}

#[test]
fn missing_metadata_resets_to_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }
    fs::remove_file(temp_dir.path().join("metadata.bin")).expect("should remove metadata");

    let mut store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 0);

    let added = store
        .add_documents(&sample_documents())
        .expect("should rebuild from scratch");
    assert_eq!(added, 3);
}

#[test]
fn shorter_metadata_keeps_common_prefix() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents()[..1])
            .expect("should add documents");
    }
    let short_metadata = fs::read(temp_dir.path().join("metadata.bin")).expect("should read metadata");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }
    fs::write(temp_dir.path().join("metadata.bin"), short_metadata)
        .expect("should replace metadata");

    let mut store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 1);
    assert_eq!(store.existing_ids(), HashSet::from(["1".to_string()]));

    let added = store
        .add_documents(&sample_documents())
        .expect("should add the lost documents again");
    assert_eq!(added, 2);
    assert_eq!(store.count(), 3);
}

#[test]
fn unrelated_artifacts_reset_to_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents()[2..])
            .expect("should add documents");
    }
    let other_metadata = fs::read(temp_dir.path().join("metadata.bin")).expect("should read metadata");
    {
        let mut store = open_tfidf(&temp_dir);
        store.clear().expect("should clear");
        store
            .add_documents(&sample_documents()[..2])
            .expect("should add documents");
    }
    fs::write(temp_dir.path().join("metadata.bin"), other_metadata)
        .expect("should replace metadata");

    let store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 0);
}

#[test]
fn failed_metadata_write_keeps_previous_pair() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let blocker = temp_dir.path().join("metadata.bin.tmp");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");

        fs::create_dir(&blocker).expect("should block metadata temp file");
        let added = store
            .add_documents(&[Document::new("4", "Zig comptime", "Compile time execution.")])
            .expect("write failures are logged, not returned");
        assert_eq!(added, 1);
        assert_eq!(store.count(), 4);
    }

    assert!(!temp_dir.path().join("index.json.tmp").exists());

    let mut store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 3);
    assert!(!store.existing_ids().contains("4"));

    fs::remove_dir(&blocker).expect("should unblock metadata temp file");
    let added = store
        .add_documents(&[Document::new("4", "Zig comptime", "Compile time execution.")])
        .expect("should add document");
    assert_eq!(added, 1);
    assert_eq!(open_tfidf(&temp_dir).count(), 4);
}

#[test]
fn encoder_state_survives_restart_independent_of_entry_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store.encoder.restore(EncoderState {
            documents_seen: 50,
            ..EncoderState::default()
        });
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("index.json")).expect("should read index file"),
    )
    .expect("index file should be json");
    assert_eq!(json["doc_count"], 53);

    let store = open_tfidf(&temp_dir);
    assert_eq!(store.count(), 3);
    assert_eq!(store.encoder.state().documents_seen, 53);
}

/// Real TF-IDF encoding that loses the last embedding of every batch
struct DroppingEncoder(TfIdfEncoder);

impl Encoder for DroppingEncoder {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn encode(&mut self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = self.0.encode(texts)?;
        embeddings.pop();
        Ok(embeddings)
    }

    fn encode_query(&self, query: &str) -> Result<Embedding> {
        self.0.encode_query(query)
    }

    fn state(&self) -> EncoderState {
        self.0.state()
    }

    fn restore(&mut self, state: EncoderState) {
        self.0.restore(state);
    }
}

#[test]
fn embedding_count_mismatch_rolls_back_encoder_state() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_with(&temp_dir, Box::new(DroppingEncoder(TfIdfEncoder::new())));

    let result = store.add_documents(&sample_documents());

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert_eq!(store.count(), 0);
    assert_eq!(store.encoder.state(), EncoderState::default());
    assert!(!store.index_path().exists());
}

#[test]
fn index_from_another_encoder_is_discarded() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_tfidf(&temp_dir);
        store
            .add_documents(&sample_documents())
            .expect("should add documents");
    }

    let store = open_with(&temp_dir, Box::new(ConstantEncoder));
    assert_eq!(store.count(), 0);
}

#[test]
fn clear_removes_files_and_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&sample_documents())
        .expect("should add documents");

    store.clear().expect("should clear");
    assert_eq!(store.count(), 0);
    assert!(!store.index_path().exists());
    assert!(!store.metadata_path().exists());

    store.clear().expect("clearing twice should succeed");

    let added = store
        .add_documents(&sample_documents())
        .expect("should add after clear");
    assert_eq!(added, 3);
}

#[test]
fn clear_resets_encoder_state() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_tfidf(&temp_dir);
    store
        .add_documents(&sample_documents())
        .expect("should add documents");

    store.clear().expect("should clear");
    store
        .add_documents(&[Document::new("5", "Fresh start", "Only story.")])
        .expect("should add documents");

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(store.index_path()).expect("should read index file"),
    )
    .expect("index file should be json");
    assert!(json["vocabulary"].get("goroutines").is_none());
    assert_eq!(json["doc_count"], 1);
}
