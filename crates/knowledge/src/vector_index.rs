//! Vector index abstraction.
//!
//! The index stores one embedding per fragment together with its payload and
//! answers nearest-neighbour queries, optionally restricted to a category.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::types::{Category, Fragment};
use diligence_core::{AppError, AppResult};

/// Stored fields of a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentPayload {
    pub text: String,
    pub category: Category,
    #[serde(default)]
    pub group_attributes: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FragmentPayload {
    /// Unscored fragment for this payload.
    pub fn to_fragment(&self, id: &str) -> Fragment {
        let mut fragment = Fragment::new(id, self.text.clone(), self.category)
            .with_group_attributes(self.group_attributes.clone());
        fragment.metadata = self.metadata.clone();
        fragment
    }
}

/// A point in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: FragmentPayload,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub payload: FragmentPayload,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Query restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexFilter {
    pub category: Option<Category>,
}

impl IndexFilter {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
        }
    }

    fn matches(&self, payload: &FragmentPayload) -> bool {
        self.category.map_or(true, |c| c == payload.category)
    }
}

/// One page of a full-collection scan.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub records: Vec<IndexRecord>,
    /// Offset of the next page, `None` once the scan is complete
    pub next_offset: Option<usize>,
}

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id.
    async fn upsert(&self, records: Vec<IndexRecord>) -> AppResult<()>;

    /// Page through every stored record in insertion order.
    async fn scroll(&self, offset: usize, limit: usize) -> AppResult<ScrollPage>;

    /// Top `limit` records by cosine similarity, highest first (ties by id).
    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&IndexFilter>,
        limit: usize,
    ) -> AppResult<Vec<ScoredRecord>>;

    /// Number of stored records.
    async fn count(&self) -> AppResult<usize>;
}

/// Cosine similarity; zero when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Records in insertion order plus an id lookup into them.
#[derive(Debug, Default)]
struct Store {
    records: Vec<IndexRecord>,
    positions: HashMap<String, usize>,
}

/// In-process index holding every record in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    store: RwLock<Store>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::Retrieval("memory index lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: Vec<IndexRecord>) -> AppResult<()> {
        let mut guard = self.store.write().map_err(Self::poisoned)?;
        let store = &mut *guard;

        for record in records {
            if let Some(expected) = store.records.first().map(|r| r.vector.len()) {
                if record.vector.len() != expected {
                    return Err(AppError::Retrieval(format!(
                        "Vector for {} has {} dimensions, index uses {}",
                        record.id,
                        record.vector.len(),
                        expected
                    )));
                }
            }

            match store.positions.get(&record.id) {
                Some(&pos) => store.records[pos] = record,
                None => {
                    store.positions.insert(record.id.clone(), store.records.len());
                    store.records.push(record);
                }
            }
        }

        Ok(())
    }

    async fn scroll(&self, offset: usize, limit: usize) -> AppResult<ScrollPage> {
        let store = self.store.read().map_err(Self::poisoned)?;
        let stored = &store.records;

        let records: Vec<IndexRecord> = stored.iter().skip(offset).take(limit).cloned().collect();
        let end = offset + records.len();
        let next_offset = (end < stored.len() && !records.is_empty()).then_some(end);

        Ok(ScrollPage {
            records,
            next_offset,
        })
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&IndexFilter>,
        limit: usize,
    ) -> AppResult<Vec<ScoredRecord>> {
        let store = self.store.read().map_err(Self::poisoned)?;
        let stored = &store.records;

        if let Some(first) = stored.first() {
            if first.vector.len() != vector.len() {
                return Err(AppError::Retrieval(format!(
                    "Query vector has {} dimensions, index uses {}",
                    vector.len(),
                    first.vector.len()
                )));
            }
        }

        let mut hits: Vec<ScoredRecord> = stored
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.payload)))
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                payload: r.payload.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);

        Ok(hits)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.store.read().map_err(Self::poisoned)?.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: Category, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector,
            payload: FragmentPayload {
                text: format!("text of {}", id),
                category,
                group_attributes: vec![],
                metadata: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_and_filters() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![
                record("news-1", Category::News, vec![1.0, 0.0]),
                record("10k-1", Category::Form10K, vec![0.9, 0.1]),
                record("news-2", Category::News, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let all = index.query(&[1.0, 0.0], None, 10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["news-1", "10k-1", "news-2"]);

        let news = index
            .query(&[1.0, 0.0], Some(&IndexFilter::category(Category::News)), 1)
            .await
            .unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].id, "news-1");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![record("a", Category::News, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(vec![record("a", Category::Wikipedia, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let page = index.scroll(0, 10).await.unwrap();
        assert_eq!(page.records[0].payload.category, Category::Wikipedia);
    }

    #[tokio::test]
    async fn test_large_upsert_keeps_insertion_order() {
        let index = MemoryIndex::new();
        let records = (0..2000)
            .map(|i| record(&format!("r{}", i), Category::News, vec![1.0, 0.0]))
            .collect();
        index.upsert(records).await.unwrap();
        index
            .upsert(vec![
                record("r1500", Category::Form10Q, vec![0.0, 1.0]),
                record("r2000", Category::News, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 2001);
        let page = index.scroll(1499, 3).await.unwrap();
        let ids: Vec<&str> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1499", "r1500", "r1501"]);
        assert_eq!(page.records[1].payload.category, Category::Form10Q);

        let tail = index.scroll(2000, 10).await.unwrap();
        assert_eq!(tail.records[0].id, "r2000");
        assert_eq!(tail.next_offset, None);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![record("a", Category::News, vec![1.0, 0.0])])
            .await
            .unwrap();

        assert!(index
            .upsert(vec![record("b", Category::News, vec![1.0])])
            .await
            .is_err());
        assert!(index.query(&[1.0, 0.0, 0.0], None, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_scroll_pages() {
        let index = MemoryIndex::new();
        let records = (0..5)
            .map(|i| record(&format!("r{}", i), Category::News, vec![1.0]))
            .collect();
        index.upsert(records).await.unwrap();

        let first = index.scroll(0, 2).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.next_offset, Some(2));

        let last = index.scroll(4, 2).await.unwrap();
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.next_offset, None);
    }
}
