//! Corpus seeding from pre-chunked JSONL.
//!
//! Each non-blank line is one fragment:
//!
//! ```json
//! {"id": "aapl-10k-3", "text": "...", "category": "10-K",
//!  "group_attributes": ["AAPL"], "metadata": {"company": "Apple Inc."}}
//! ```
//!
//! `id`, `group_attributes` and `metadata` are optional. A missing id is
//! derived from the text so reloading the same file is stable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::embeddings::EmbeddingProvider;
use crate::types::Category;
use crate::vector_index::{FragmentPayload, IndexRecord, VectorIndex};
use diligence_core::{AppError, AppResult};

/// Fragments embedded per provider call while seeding.
const EMBED_BATCH_SIZE: usize = 32;
const DERIVED_ID_LEN: usize = 16;

/// One corpus line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    pub category: Category,
    #[serde(default)]
    pub group_attributes: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CorpusEntry {
    /// Explicit id, or the first hex digits of the text's SHA-256.
    pub fn fragment_id(&self) -> String {
        match &self.id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => {
                let mut hasher = Sha256::new();
                hasher.update(self.text.as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                digest[..DERIVED_ID_LEN].to_string()
            }
        }
    }

    fn into_payload(self) -> FragmentPayload {
        FragmentPayload {
            text: self.text,
            category: self.category,
            group_attributes: self.group_attributes,
            metadata: self.metadata,
        }
    }
}

/// Parse JSONL corpus content. Line numbers in errors are 1-based.
pub fn parse_corpus(content: &str) -> AppResult<Vec<CorpusEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<CorpusEntry>(line).map_err(|e| {
                AppError::Retrieval(format!("Invalid corpus entry on line {}: {}", i + 1, e))
            })
        })
        .collect()
}

/// Read and parse a JSONL corpus file.
pub fn load_corpus(path: &Path) -> AppResult<Vec<CorpusEntry>> {
    if !path.exists() {
        return Err(AppError::Retrieval(format!(
            "Corpus file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let entries = parse_corpus(&content)?;
    info!(path = %path.display(), fragments = entries.len(), "Loaded corpus");
    Ok(entries)
}

/// Embed `entries` and upsert them into `index`. Returns the number stored.
pub async fn seed_index(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    entries: Vec<CorpusEntry>,
) -> AppResult<usize> {
    let mut stored = 0;
    let mut entries = entries.into_iter().peekable();

    while entries.peek().is_some() {
        let batch: Vec<CorpusEntry> = entries.by_ref().take(EMBED_BATCH_SIZE).collect();
        let texts: Vec<String> = batch.iter().map(|e| e.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(AppError::Retrieval(format!(
                "Embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let records: Vec<IndexRecord> = batch
            .into_iter()
            .zip(vectors)
            .map(|(entry, vector)| IndexRecord {
                id: entry.fragment_id(),
                vector,
                payload: entry.into_payload(),
            })
            .collect();

        stored += records.len();
        index.upsert(records).await?;
    }

    info!(
        fragments = stored,
        embedder = embedder.provider_name(),
        "Seeded vector index"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::vector_index::MemoryIndex;
    use std::io::Write;

    const SAMPLE: &str = r#"{"id": "aapl-1", "text": "Apple iPhone revenue grew", "category": "10-K", "group_attributes": ["AAPL"], "metadata": {"company": "Apple Inc."}}

{"text": "Microsoft Azure expanded", "category": "news"}
"#;

    #[test]
    fn test_parse_skips_blank_lines() {
        let entries = parse_corpus(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].fragment_id(), "aapl-1");
        assert_eq!(entries[0].metadata["company"], "Apple Inc.");
        assert_eq!(entries[1].category, Category::News);
        assert!(entries[1].group_attributes.is_empty());
    }

    #[test]
    fn test_derived_id_is_stable() {
        let entries = parse_corpus(SAMPLE).unwrap();
        let id = entries[1].fragment_id();
        assert_eq!(id.len(), 16);
        assert_eq!(id, parse_corpus(SAMPLE).unwrap()[1].fragment_id());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let content = "{\"text\": \"ok\", \"category\": \"news\"}\n{\"text\": \"bad\", \"category\": \"blog\"}\n";
        let err = parse_corpus(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_corpus(&dir.path().join("missing.jsonl")).is_err());
    }

    #[tokio::test]
    async fn test_load_and_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let entries = load_corpus(&path).unwrap();
        let index = MemoryIndex::new();
        let embedder = TrigramProvider::new(64);

        let stored = seed_index(&index, &embedder, entries).await.unwrap();
        assert_eq!(stored, 2);
        assert_eq!(index.count().await.unwrap(), 2);

        let page = index.scroll(0, 10).await.unwrap();
        assert_eq!(page.records[0].id, "aapl-1");
        assert_eq!(page.records[0].vector.len(), 64);
        assert_eq!(page.records[0].payload.group_attributes, vec!["AAPL"]);
    }
}
