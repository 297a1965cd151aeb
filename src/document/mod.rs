// Document model
// Typed records for the content items handed to the index store


pub mod cleaner;
pub mod format;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Number of leading comments folded into the searchable text
pub const MAX_EMBEDDED_COMMENTS: usize = 3;
/// Maximum characters taken from each embedded comment
pub const COMMENT_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document is missing an id")]
    MissingId,
    #[error("Document {0} is missing a title")]
    MissingTitle(String),
}

/// Hacker News dumps carry numeric ids, other sources use strings
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl Visitor<'_> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a string or integer id")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    // bincode is not self-describing and always stores ids as strings
    if deserializer.is_human_readable() {
        deserializer.deserialize_any(IdVisitor)
    } else {
        deserializer.deserialize_string(IdVisitor)
    }
}

/// A lightweight comment attached to a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "by")]
    pub author: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub parent: String,
}

/// A content item (story, page, transcript) as supplied by ingestion.
///
/// Chunks are `Document`s too: they carry a slice of the original `text`
/// and a `chunk_id` of the form `{id}_{index}`. Every other field is copied
/// from the source document unchanged.
///
/// Note that optional fields are always serialized, the metadata artifact is
/// a bincode blob and bincode requires a fixed field layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default, alias = "by")]
    pub author: String,
    /// Creation time as a unix timestamp in seconds
    #[serde(default)]
    pub time: i64,
    /// Reply count
    #[serde(default)]
    pub descendants: u32,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub extracted_content: Option<String>,
    #[serde(default)]
    pub extracted_title: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub extraction_error: Option<String>,
    /// Set by the chunker, `None` for documents that were never split
    #[serde(default)]
    pub chunk_id: Option<String>,
}

impl Document {
    #[inline]
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Check the fields the index store relies on
    #[inline]
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.id.trim().is_empty() {
            return Err(DocumentError::MissingId);
        }

        if self.title.trim().is_empty() {
            return Err(DocumentError::MissingTitle(self.id.clone()));
        }

        Ok(())
    }

    /// Key used by the identity map: the chunk id when present, else the document id
    #[inline]
    pub fn identity_key(&self) -> &str {
        self.chunk_id.as_deref().unwrap_or(&self.id)
    }

    /// Compose the labeled text that gets embedded for this document
    #[inline]
    pub fn searchable_text(&self) -> String {
        let mut parts = Vec::new();

        if !self.title.is_empty() {
            parts.push(format!("Title: {}", self.title));
        }

        if !self.text.is_empty() {
            parts.push(format!("Content: {}", self.text));
        }

        if let Some(extracted) = self.extracted_content.as_deref().filter(|c| !c.is_empty()) {
            let content_type = self.content_type.as_deref().unwrap_or("extracted");
            parts.push(format!("Extracted {} content: {}", content_type, extracted));
        }

        if let Some(extracted_title) = self
            .extracted_title
            .as_deref()
            .filter(|t| !t.is_empty() && *t != self.title)
        {
            parts.push(format!("Extracted title: {}", extracted_title));
        }

        let comment_texts: Vec<String> = self
            .comments
            .iter()
            .take(MAX_EMBEDDED_COMMENTS)
            .filter(|c| !c.text.is_empty())
            .map(|c| c.text.chars().take(COMMENT_EXCERPT_CHARS).collect())
            .collect();
        if !comment_texts.is_empty() {
            parts.push(format!("Comments: {}", comment_texts.join(" ")));
        }

        parts.join(" ")
    }

    /// Host name of the linked url, if any
    #[inline]
    pub fn domain(&self) -> Option<String> {
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(ToString::to_string))
    }

    #[inline]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if self.time <= 0 {
            return None;
        }
        DateTime::from_timestamp(self.time, 0)
    }
}
