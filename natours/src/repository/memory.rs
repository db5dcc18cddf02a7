//! In-process document store
//!
//! Each [`MemoryRepository`] owns one collection behind a
//! `tokio::sync::RwLock`. Writes hold the lock across the uniqueness check
//! and the insert, so two concurrent signups with the same email cannot
//! both succeed. Documents keep insertion order, which is the natural order
//! for unsorted reads.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::{lookup, parse_datetime, sort_order, values_equal, FilterCondition};
use super::query::{
    DocumentQuery, OrderDirection, SortKey, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD,
};
use super::schema::{Schema, ValidationErrors};
use super::traits::{Repository, RepositoryResult};
use super::Document;
use crate::ids::DocumentId;

struct Collection {
    schema: Box<dyn Schema>,
    documents: RwLock<Vec<Document>>,
}

/// Repository over an in-memory collection
///
/// Cloning is cheap and clones share the same collection.
#[derive(Clone)]
pub struct MemoryRepository {
    collection: Arc<Collection>,
}

impl MemoryRepository {
    /// Empty collection governed by `schema`
    pub fn new(schema: impl Schema) -> Self {
        Self {
            collection: Arc::new(Collection {
                schema: Box::new(schema),
                documents: RwLock::new(Vec::new()),
            }),
        }
    }

    fn check_id(&self, id: &str, operation: RepositoryOperation) -> RepositoryResult<()> {
        let schema = self.schema();
        DocumentId::parse(schema.id_prefix(), id)
            .map(|_| ())
            .map_err(|_| RepositoryError::invalid_id(schema.entity(), id).with_operation(operation))
    }

    fn is_visible(&self, doc: &Document, defaults: &[FilterCondition]) -> bool {
        defaults.iter().all(|condition| condition.matches(doc))
    }

    fn position_of(&self, docs: &[Document], id: &str) -> Option<usize> {
        let defaults = self.schema().default_filters();
        docs.iter().position(|doc| {
            doc.get(ID_FIELD).and_then(Value::as_str) == Some(id)
                && self.is_visible(doc, &defaults)
        })
    }

    fn validation_error(
        &self,
        errors: ValidationErrors,
        operation: RepositoryOperation,
    ) -> RepositoryError {
        RepositoryError::validation_failed(errors.to_string()).with_operation(operation)
    }

    fn check_unique(
        &self,
        docs: &[Document],
        candidate: &Document,
        skip: Option<usize>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<()> {
        let schema = self.schema();
        for field in schema.unique_fields() {
            let Some(value) = candidate.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = docs.iter().enumerate().any(|(i, doc)| {
                Some(i) != skip && doc.get(*field).is_some_and(|v| values_equal(v, value))
            });
            if taken {
                let shown = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                return Err(RepositoryError::already_exists(schema.entity(), field, shown)
                    .with_operation(operation));
            }
        }
        for group in schema.unique_together() {
            let values: Option<Vec<&Value>> = group
                .iter()
                .map(|field| candidate.get(*field).filter(|v| !v.is_null()))
                .collect();
            let Some(values) = values else {
                continue;
            };
            let taken = docs.iter().enumerate().any(|(i, doc)| {
                Some(i) != skip
                    && group.iter().zip(&values).all(|(field, value)| {
                        doc.get(*field).is_some_and(|v| values_equal(v, value))
                    })
            });
            if taken {
                let shown: Vec<String> = values
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect();
                let field = group.join("+");
                return Err(
                    RepositoryError::already_exists(schema.entity(), &field, shown.join(", "))
                        .with_operation(operation),
                );
            }
        }
        Ok(())
    }

    async fn merge(&self, id: &str, patch: Document, validate: bool) -> RepositoryResult<Document> {
        let operation = RepositoryOperation::Update;
        self.check_id(id, operation)?;
        let schema = self.schema();

        let mut docs = self.collection.documents.write().await;
        let position = self.position_of(&docs, id).ok_or_else(|| {
            RepositoryError::not_found(schema.entity(), id).with_operation(operation)
        })?;

        let mut merged = docs[position].clone();
        let meta = take_meta(&mut merged);
        for (key, value) in patch {
            if matches!(key.as_str(), ID_FIELD | VERSION_FIELD | CREATED_AT_FIELD) {
                continue;
            }
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }

        let mut merged = if validate {
            schema
                .validate(merged, false)
                .map_err(|e| self.validation_error(e, operation).with_entity(schema.entity(), id))?
        } else {
            merged
        };
        merged.extend(meta);

        self.check_unique(&docs, &merged, Some(position), operation)?;
        docs[position] = merged.clone();
        Ok(merged)
    }
}

/// Remove the repository-owned fields from a document
fn take_meta(doc: &mut Document) -> Document {
    let mut meta = Document::new();
    for key in [ID_FIELD, VERSION_FIELD, CREATED_AT_FIELD] {
        if let Some(value) = doc.remove(key) {
            meta.insert(key.to_string(), value);
        }
    }
    meta
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn compare_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = sort_order(lookup(a, &key.field), lookup(b, &key.field));
        let ordering = match key.direction {
            OrderDirection::Ascending => ordering,
            OrderDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl Repository for MemoryRepository {
    fn schema(&self) -> &dyn Schema {
        self.collection.schema.as_ref()
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Document>> {
        self.check_id(id, RepositoryOperation::FindById)?;
        let docs = self.collection.documents.read().await;
        Ok(self.position_of(&docs, id).map(|i| docs[i].clone()))
    }

    async fn find_one(&self, filters: &[FilterCondition]) -> RepositoryResult<Option<Document>> {
        let defaults = self.schema().default_filters();
        let docs = self.collection.documents.read().await;
        Ok(docs
            .iter()
            .find(|doc| self.is_visible(doc, &defaults) && filters.iter().all(|c| c.matches(doc)))
            .cloned())
    }

    async fn find_all(&self, query: &DocumentQuery) -> RepositoryResult<Vec<Document>> {
        let defaults = self.schema().default_filters();
        let mut found: Vec<Document> = {
            let docs = self.collection.documents.read().await;
            docs.iter()
                .filter(|doc| self.is_visible(doc, &defaults) && query.matches(doc))
                .cloned()
                .collect()
        };

        if !query.sort.is_empty() {
            found.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let found = match query.pagination {
            Some(page) => {
                let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
                let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
                found.into_iter().skip(offset).take(limit).collect()
            }
            None => found,
        };

        Ok(found
            .into_iter()
            .map(|doc| query.projection.apply(doc))
            .collect())
    }

    async fn count(&self, filters: &[FilterCondition]) -> RepositoryResult<u64> {
        let defaults = self.schema().default_filters();
        let docs = self.collection.documents.read().await;
        let count = docs
            .iter()
            .filter(|doc| self.is_visible(doc, &defaults) && filters.iter().all(|c| c.matches(doc)))
            .count();
        Ok(count as u64)
    }

    async fn create(&self, mut data: Document) -> RepositoryResult<Document> {
        let operation = RepositoryOperation::Create;
        let schema = self.schema();

        let id = match data.remove(ID_FIELD) {
            None | Some(Value::Null) => String::from(DocumentId::generate(schema.id_prefix())),
            Some(Value::String(raw)) => {
                self.check_id(&raw, operation)?;
                raw
            }
            Some(other) => {
                return Err(RepositoryError::invalid_id(schema.entity(), other.to_string())
                    .with_operation(operation))
            }
        };
        data.remove(VERSION_FIELD);
        let created_at = match data.remove(CREATED_AT_FIELD) {
            None | Some(Value::Null) => timestamp_now(),
            Some(Value::String(raw)) => parse_datetime(&raw)
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
                .ok_or_else(|| {
                    RepositoryError::validation_failed(format!("Invalid createdAt: {raw}."))
                        .with_operation(operation)
                })?,
            Some(other) => {
                return Err(
                    RepositoryError::validation_failed(format!("Invalid createdAt: {other}."))
                        .with_operation(operation),
                )
            }
        };

        let mut doc = schema
            .validate(data, true)
            .map_err(|e| self.validation_error(e, operation))?;
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        doc.insert(VERSION_FIELD.to_string(), Value::from(0));
        doc.insert(CREATED_AT_FIELD.to_string(), Value::String(created_at));

        let mut docs = self.collection.documents.write().await;
        if docs.iter().any(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str())) {
            return Err(RepositoryError::already_exists(schema.entity(), ID_FIELD, id));
        }
        self.check_unique(&docs, &doc, None, operation)?;
        docs.push(doc.clone());

        tracing::debug!(entity = schema.entity(), id = %id, "document created");
        Ok(doc)
    }

    async fn update(&self, id: &str, patch: Document) -> RepositoryResult<Document> {
        self.merge(id, patch, true).await
    }

    async fn patch_unchecked(&self, id: &str, patch: Document) -> RepositoryResult<Document> {
        self.merge(id, patch, false).await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        self.check_id(id, RepositoryOperation::Delete)?;
        let mut docs = self.collection.documents.write().await;
        match self.position_of(&docs, id) {
            Some(position) => {
                docs.remove(position);
                tracing::debug!(entity = self.entity(), id = %id, "document deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        FilterCondition, Model, ModelSchema, Pagination, Projection, RepositoryErrorKind,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Trail {
        name: String,
        length: f64,
        #[serde(default)]
        closed: bool,
    }

    impl Model for Trail {
        const ENTITY: &'static str = "Trail";
        const ID_PREFIX: &'static str = "trail";
        const REQUIRED: &'static [(&'static str, &'static str)] = &[
            ("name", "A trail must have a name"),
            ("length", "A trail must have a length"),
        ];
        const UNIQUE: &'static [&'static str] = &["name"];

        fn validate(&self, errors: &mut ValidationErrors) {
            if self.length <= 0.0 {
                errors.push("Length must be positive");
            }
        }

        fn default_filters() -> Vec<FilterCondition> {
            vec![FilterCondition::ne("closed", true)]
        }
    }

    fn repo() -> MemoryRepository {
        MemoryRepository::new(ModelSchema::<Trail>::new())
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_metadata() {
        let repo = repo();
        let created = repo
            .create(doc(json!({"name": "Ridge", "length": 4.5, "__v": 7})))
            .await
            .unwrap();

        let id = created["id"].as_str().unwrap();
        assert!(id.starts_with("trail_"));
        assert_eq!(created["__v"], json!(0));
        assert!(created["createdAt"].as_str().unwrap().ends_with('Z'));

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_create_accepts_supplied_id_and_timestamp() {
        let repo = repo();
        let created = repo
            .create(doc(json!({
                "id": "trail_01h455vb4pex5vsknk084sn02q",
                "name": "Ridge",
                "length": 1,
                "createdAt": "2021-03-01"
            })))
            .await
            .unwrap();
        assert_eq!(created["id"], json!("trail_01h455vb4pex5vsknk084sn02q"));
        assert_eq!(created["createdAt"], json!("2021-03-01T00:00:00.000Z"));

        let err = repo
            .create(doc(json!({
                "id": "tour_01h455vb4pex5vsknk084sn02q",
                "name": "Other",
                "length": 1,
            })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidId);
    }

    #[tokio::test]
    async fn test_unique_fields_rejected() {
        let repo = repo();
        repo.create(doc(json!({"name": "Ridge", "length": 1}))).await.unwrap();
        let err = repo.create(doc(json!({"name": "Ridge", "length": 2}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(err.entity_id.as_deref(), Some("Ridge"));
        assert_eq!(repo.count(&[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validation_errors_list_every_missing_field() {
        let err = repo().create(Document::new()).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(err.message, "A trail must have a name, A trail must have a length");
    }

    #[tokio::test]
    async fn test_update_revalidates_and_keeps_metadata() {
        let repo = repo();
        let created = repo.create(doc(json!({"name": "Ridge", "length": 1}))).await.unwrap();
        let id = created["id"].as_str().unwrap();

        let updated = repo.update(id, doc(json!({"length": 3, "id": "trail_x"}))).await.unwrap();
        assert_eq!(updated["length"], json!(3.0));
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let err = repo.update(id, doc(json!({"length": -1}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);

        let err = repo.update(id, doc(json!({"name": null}))).await.unwrap_err();
        assert_eq!(err.message, "A trail must have a name");
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let repo = repo();
        let created = repo.create(doc(json!({"name": "Ridge", "length": 1}))).await.unwrap();
        let id = created["id"].as_str().unwrap();
        let patch = doc(json!({"length": 8}));

        let first = repo.update(id, patch.clone()).await.unwrap();
        let second = repo.update(id, patch).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_default_filters_hide_documents_everywhere() {
        let repo = repo();
        let closed = repo
            .create(doc(json!({"name": "Closed", "length": 1, "closed": true})))
            .await
            .unwrap();
        let id = closed["id"].as_str().unwrap();

        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert_eq!(repo.count(&[]).await.unwrap(), 0);
        assert!(!repo.delete(id).await.unwrap());
        let err = repo.update(id, doc(json!({"length": 2}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_all_sorts_pages_and_projects() {
        let repo = repo();
        for (name, length) in [("A", 3), ("B", 1), ("C", 2), ("D", 5)] {
            repo.create(doc(json!({"name": name, "length": length}))).await.unwrap();
        }

        let query = DocumentQuery::new()
            .filter(FilterCondition::gte("length", 2))
            .sort_by("length", OrderDirection::Descending)
            .project(Projection::include(["name"]))
            .paginate(Pagination::new(1, 2));
        let found = repo.find_all(&query).await.unwrap();

        let names: Vec<_> = found.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["A", "C"]);
        assert_eq!(found[0].len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_id_is_invalid_not_missing() {
        let err = repo().find_by_id("not-an-id").await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidId);
    }

    #[tokio::test]
    async fn test_patch_unchecked_skips_validation() {
        let repo = repo();
        let created = repo.create(doc(json!({"name": "Ridge", "length": 1}))).await.unwrap();
        let id = created["id"].as_str().unwrap();

        let patched = repo.patch_unchecked(id, doc(json!({"length": -4}))).await.unwrap();
        assert_eq!(patched["length"], json!(-4));
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Vote {
        poll: String,
        voter: String,
    }

    impl Model for Vote {
        const ENTITY: &'static str = "Vote";
        const ID_PREFIX: &'static str = "vote";
        const REQUIRED: &'static [(&'static str, &'static str)] = &[];
        const UNIQUE_TOGETHER: &'static [&'static [&'static str]] = &[&["poll", "voter"]];
    }

    #[tokio::test]
    async fn test_unique_together_rejects_repeated_pair() {
        let repo = MemoryRepository::new(ModelSchema::<Vote>::new());
        repo.create(doc(json!({"poll": "a", "voter": "x"}))).await.unwrap();
        repo.create(doc(json!({"poll": "a", "voter": "y"}))).await.unwrap();
        repo.create(doc(json!({"poll": "b", "voter": "x"}))).await.unwrap();

        let err = repo.create(doc(json!({"poll": "a", "voter": "x"}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(err.entity_id.as_deref(), Some("a, x"));
    }
}
