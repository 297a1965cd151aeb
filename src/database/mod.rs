// Database module
// File-backed vector index over document chunks

pub mod vector_store;

pub use vector_store::{IndexEntry, SearchHit, VectorStore};
