//! The in-memory primitive catalog.
//!
//! Wraps [`PrimitiveLoader`] with a lazy, memoized `id -> Primitive` cache
//! and the query surface the rest of the pipeline consumes: existence
//! checks, filtered listings, substring and scored search, and per-primitive
//! input type-checking.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::diagnostics::CoreResult;
use crate::loader::PrimitiveLoader;
use crate::model::primitive::{
    Category, FieldType, Interface, Primitive, PrimitiveId, PrimitiveKind, PrimitiveStatus,
    PrimitiveSummary,
};
use crate::reference;

/// A scored search result, ordered best-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: PrimitiveId,
    pub name: String,
    pub description: String,
    pub score: u32,
}

/// Catalog of primitives with a single-entry-per-id cache.
///
/// Loaded primitives are held immutably (`Arc`) for the life of the
/// registry. The cache map sits behind one writer lock; after warm-up it is
/// effectively append-only and safe for concurrent readers.
#[derive(Debug)]
pub struct PrimitiveRegistry {
    loader: PrimitiveLoader,
    cache: RwLock<HashMap<PrimitiveId, Arc<Primitive>>>,
}

impl PrimitiveRegistry {
    pub fn new(root: Option<PathBuf>) -> CoreResult<Self> {
        Ok(Self::with_loader(PrimitiveLoader::new(root)?))
    }

    pub fn with_loader(loader: PrimitiveLoader) -> Self {
        Self {
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &PrimitiveLoader {
        &self.loader
    }

    /// Get a primitive by id, loading it on first access.
    pub fn get(&self, id: &PrimitiveId) -> CoreResult<Arc<Primitive>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(primitive) = cache.get(id) {
                return Ok(Arc::clone(primitive));
            }
        }
        tracing::debug!(id = %id, "cache miss, loading primitive");
        let primitive = Arc::new(self.loader.load_primitive(id)?);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&primitive));
        Ok(primitive)
    }

    /// True iff [`get`](Self::get) would succeed for this id.
    pub fn exists(&self, id: &PrimitiveId) -> bool {
        self.get(id).is_ok()
    }

    /// List stable primitives, optionally narrowed by kind and category.
    pub fn list(
        &self,
        kind: Option<PrimitiveKind>,
        category: Option<Category>,
    ) -> CoreResult<Vec<PrimitiveSummary>> {
        self.list_with_status(kind, category, Some(PrimitiveStatus::Stable))
    }

    /// List primitives with an explicit status filter; `None` means any.
    pub fn list_with_status(
        &self,
        kind: Option<PrimitiveKind>,
        category: Option<Category>,
        status: Option<PrimitiveStatus>,
    ) -> CoreResult<Vec<PrimitiveSummary>> {
        self.loader.list(kind, category, status)
    }

    /// Case-insensitive substring match over the tag sets of all entries.
    pub fn search_by_tag(&self, tag: &str) -> CoreResult<Vec<PrimitiveSummary>> {
        let needle = tag.to_lowercase();
        let entries = self.loader.list(None, None, None)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.tags.iter().any(|t| t.to_lowercase().contains(&needle)))
            .collect())
    }

    /// Case-insensitive substring match over names and descriptions.
    pub fn search_by_name(&self, query: &str) -> CoreResult<Vec<PrimitiveSummary>> {
        let needle = query.to_lowercase();
        let entries = self.loader.list(None, None, None)?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle)
                    || entry
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Ranked keyword search over the catalog.
    ///
    /// Additive scoring: +10 when the whole query is a substring of the
    /// name, +3 per query word in the name, +2 per query word in the
    /// description, +5 per tag equal to a query word. Zero-score entries
    /// are dropped; ties keep index order.
    pub fn search(&self, query: &str, limit: usize) -> CoreResult<Vec<SearchHit>> {
        let entries = self.loader.list(None, None, None)?;
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter_map(|entry| {
                let score = score_summary(entry, query);
                (score > 0).then(|| SearchHit {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    description: entry.description.clone().unwrap_or_default(),
                    score,
                })
            })
            .collect();
        hits.sort_by_key(|hit| std::cmp::Reverse(hit.score));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Interface definition for one primitive.
    pub fn get_interface(&self, id: &PrimitiveId) -> CoreResult<Interface> {
        Ok(self.get(id)?.interface.clone())
    }

    /// Type-check a plan node's inputs against a primitive's interface.
    ///
    /// Returns one message per problem; an empty vector means the inputs
    /// are acceptable. String values beginning with `{{` are deferred
    /// references and bypass both type and enum checks.
    pub fn validate_inputs(
        &self,
        id: &PrimitiveId,
        inputs: &std::collections::BTreeMap<String, serde_json::Value>,
    ) -> CoreResult<Vec<String>> {
        let primitive = self.get(id)?;
        let mut errors = Vec::new();

        for input in &primitive.interface.inputs {
            let Some(value) = inputs.get(&input.name) else {
                if input.required {
                    errors.push(format!("Missing required input: {}", input.name));
                }
                continue;
            };

            if reference::is_expression(value) {
                continue;
            }

            match input.field_type {
                FieldType::Any => {}
                FieldType::Enum => {
                    if let Some(allowed) = &input.enum_values {
                        let matches = value
                            .as_str()
                            .is_some_and(|s| allowed.iter().any(|a| a == s));
                        if !matches {
                            errors.push(format!(
                                "Input {} must be one of {:?}",
                                input.name, allowed
                            ));
                        }
                    }
                }
                expected => {
                    let ok = match expected {
                        FieldType::String => value.is_string(),
                        FieldType::Number => value.is_number(),
                        FieldType::Boolean => value.is_boolean(),
                        FieldType::Object => value.is_object(),
                        FieldType::Array => value.is_array(),
                        FieldType::Any | FieldType::Enum => true,
                    };
                    if !ok {
                        errors.push(format!(
                            "Input {} must be {}, got {}",
                            input.name,
                            expected.name(),
                            json_type_name(value)
                        ));
                    }
                }
            }
        }

        Ok(errors)
    }

    /// Drop every memoized primitive; the next `get` re-reads from disk.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Additive relevance score of one index entry for a query.
fn score_summary(entry: &PrimitiveSummary, query: &str) -> u32 {
    let query_lower = query.to_lowercase();
    let words: Vec<&str> = query_lower.split_whitespace().collect();
    let name_lower = entry.name.to_lowercase();
    let description_lower = entry
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let mut score = 0;
    if !query_lower.is_empty() && name_lower.contains(&query_lower) {
        score += 10;
    }
    for word in &words {
        if name_lower.contains(word) {
            score += 3;
        }
        if description_lower.contains(word) {
            score += 2;
        }
    }
    for tag in &entry.tags {
        let tag_lower = tag.to_lowercase();
        if words.iter().any(|w| *w == tag_lower) {
            score += 5;
        }
    }
    score
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
