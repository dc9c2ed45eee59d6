use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio::sync::Mutex;

use super::{SearchEngine, SearchHits, SearchRequest};
use crate::error::{CatalogError, Result};

#[derive(Default)]
struct IndexState {
    mapping: Option<Value>,
    documents: BTreeMap<String, Value>,
}

/// Process-local search engine for tests and single-process development.
///
/// Text queries match when any query word occurs in `title` or
/// `description`; filters compare top-level fields exactly.
#[derive(Default)]
pub struct InMemorySearchEngine {
    indices: Mutex<HashMap<String, IndexState>>,
}

impl fmt::Debug for InMemorySearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("InMemorySearchEngine");
        if let Ok(indices) = self.indices.try_lock() {
            let mut names: Vec<&String> = indices.keys().collect();
            names.sort();
            debug.field("indices", &names);
        }
        debug.finish()
    }
}

impl InMemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        let indices = self.indices.lock().await;
        indices.get(index)?.documents.get(id).cloned()
    }

    pub async fn document_count(&self, index: &str) -> usize {
        let indices = self.indices.lock().await;
        indices.get(index).map_or(0, |state| state.documents.len())
    }

    pub async fn mapping(&self, index: &str) -> Option<Value> {
        let indices = self.indices.lock().await;
        indices.get(index)?.mapping.clone()
    }
}

fn matches_text(document: &Value, query: &str) -> bool {
    let words: Vec<String> = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return true;
    }
    ["title", "description"].iter().any(|field| {
        document
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .is_some_and(|text| words.iter().any(|word| text.contains(word.as_str())))
    })
}

fn matches_filters(document: &Value, filters: &BTreeMap<String, Value>) -> bool {
    filters.iter().all(|(field, expected)| match document.get(field) {
        Some(Value::Array(values)) => values.contains(expected),
        Some(actual) => actual == expected,
        None => false,
    })
}

fn created_at(document: &Value) -> &str {
    document
        .get("created_at")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.lock().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let mut indices = self.indices.lock().await;
        if indices.contains_key(index) {
            return Err(CatalogError::Search(format!(
                "index {index:?} already exists"
            )));
        }
        indices.insert(
            index.to_string(),
            IndexState {
                mapping: Some(mapping.clone()),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn index_document(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        let mut indices = self.indices.lock().await;
        indices
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        let mut indices = self.indices.lock().await;
        if let Some(state) = indices.get_mut(index) {
            state.documents.remove(id);
        }
        Ok(())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits> {
        let indices = self.indices.lock().await;
        let state = indices
            .get(index)
            .ok_or_else(|| CatalogError::NotFound(format!("index {index:?}")))?;

        let mut matched: Vec<&Value> = state
            .documents
            .values()
            .filter(|doc| matches_text(doc, &request.query))
            .filter(|doc| matches_filters(doc, &request.filters))
            .collect();
        matched.sort_by(|a, b| created_at(b).cmp(created_at(a)));

        let total = matched.len() as u64;
        let from = usize::try_from(request.from()).unwrap_or(usize::MAX);
        let hits = matched
            .into_iter()
            .skip(from)
            .take(request.page_size as usize)
            .cloned()
            .collect();

        Ok(SearchHits {
            total,
            hits,
            page: request.page,
            size: request.page_size,
        })
    }
}
