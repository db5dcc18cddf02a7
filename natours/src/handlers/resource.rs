//! Generic CRUD handlers driven by a resource descriptor
//!
//! A [`Resource`] bundles everything the five CRUD operations need for one
//! collection: the repository, the query policy, populate specs and optional
//! parent scoping. Routers hand it to the handlers as
//! `State<Arc<Resource<R>>>`, so there is no global registry and each route
//! group can carry a differently configured descriptor over the same
//! repository (reviews under `/tours/{id}/reviews` versus `/reviews`).
//!
//! ```rust,ignore
//! let reviews = Arc::new(
//!     Resource::new(review_repo, policy)
//!         .with_read_populate(Populate::reference("user", users, &["name", "photo"]))
//!         .nested_under("tour")
//!         .owned_by("user"),
//! );
//!
//! Router::new()
//!     .route("/", get(list_all::<MemoryRepository>).post(create_one::<MemoryRepository>))
//!     .with_state(reviews);
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde_json::Value;

use super::error::{ApiError, ApiOperation};
use super::query::{QueryFeatures, QueryPolicy};
use super::response::{ItemResponse, ListResponse, NoContent};
use crate::auth::Principal;
use crate::repository::{
    populate_all, present, Document, DocumentQuery, FilterCondition, Populate, Repository,
};

/// Route parameter to document field binding for nested routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentScope {
    /// Document field holding the parent id
    pub field: &'static str,
}

/// Capability descriptor for one collection
pub struct Resource<R> {
    repository: R,
    policy: QueryPolicy,
    detail_populate: Vec<Populate<R>>,
    read_populate: Vec<Populate<R>>,
    parent: Option<ParentScope>,
    owner_field: Option<&'static str>,
}

impl<R: Repository> Resource<R> {
    /// Descriptor over `repository`
    ///
    /// The filter allow-list and hidden fields come from the repository's
    /// schema; limits come from `policy`.
    pub fn new(repository: R, policy: QueryPolicy) -> Self {
        let schema = repository.schema();
        let policy = policy
            .with_filterable(schema.filterable_fields())
            .with_hidden(schema.hidden_fields());
        Self {
            repository,
            policy,
            detail_populate: Vec::new(),
            read_populate: Vec::new(),
            parent: None,
            owner_field: None,
        }
    }

    /// Expansion applied only when fetching one document
    #[must_use]
    pub fn with_detail_populate(mut self, populate: Populate<R>) -> Self {
        self.detail_populate.push(populate);
        self
    }

    /// Expansion applied to every document read
    #[must_use]
    pub fn with_read_populate(mut self, populate: Populate<R>) -> Self {
        self.read_populate.push(populate);
        self
    }

    /// Scope nested list and create routes by `field`
    #[must_use]
    pub fn nested_under(mut self, field: &'static str) -> Self {
        self.parent = Some(ParentScope { field });
        self
    }

    /// Fill `field` with the caller's id on create when the body omits it
    #[must_use]
    pub fn owned_by(mut self, field: &'static str) -> Self {
        self.owner_field = Some(field);
        self
    }

    /// Underlying repository
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Query policy in force for list requests
    pub fn policy(&self) -> QueryPolicy {
        self.policy
    }

    fn entity(&self) -> &'static str {
        self.repository.entity()
    }

    async fn render(&self, doc: Document, detail: bool) -> Result<Document, ApiError> {
        let mut doc = present(self.repository.schema(), doc);
        populate_all(&self.read_populate, &mut doc).await?;
        if detail {
            populate_all(&self.detail_populate, &mut doc).await?;
        }
        Ok(doc)
    }

    /// Translate `raw` and run it, scoped to `parent` on nested routes
    pub async fn list(
        &self,
        parent: Option<&str>,
        raw: &[(String, String)],
    ) -> Result<Vec<Document>, ApiError> {
        let mut base = DocumentQuery::new();
        if let (Some(scope), Some(parent_id)) = (self.parent, parent) {
            base = base.filter(FilterCondition::eq(scope.field, parent_id));
        }
        let query = QueryFeatures::apply_all(raw, base, self.policy)?;

        let mut documents = Vec::new();
        for doc in self.repository.find_all(&query).await? {
            documents.push(self.render(doc, false).await?);
        }
        Ok(documents)
    }

    /// Fetch one document with every populate spec expanded
    pub async fn get(&self, id: &str) -> Result<Document, ApiError> {
        let doc = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(self.entity(), id))?;
        self.render(doc, true).await
    }

    /// Create from the full body
    pub async fn create(
        &self,
        parent: Option<&str>,
        owner: Option<&Principal>,
        mut body: Document,
    ) -> Result<Document, ApiError> {
        if let (Some(scope), Some(parent_id)) = (self.parent, parent) {
            if !has_value(&body, scope.field) {
                body.insert(scope.field.to_string(), Value::from(parent_id));
            }
        }
        if let (Some(field), Some(principal)) = (self.owner_field, owner) {
            if !has_value(&body, field) {
                body.insert(field.to_string(), Value::from(principal.id.as_str()));
            }
        }
        let created = self.repository.create(body).await?;
        Ok(present(self.repository.schema(), created))
    }

    /// Partial update with validation
    pub async fn update(&self, id: &str, patch: Document) -> Result<Document, ApiError> {
        let updated = self.repository.update(id, patch).await?;
        self.render(updated, false).await
    }

    /// Remove by id
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        if self.repository.delete(id).await? {
            Ok(())
        } else {
            Err(ApiError::not_found(self.entity(), id).with_operation(ApiOperation::Delete))
        }
    }
}

fn has_value(doc: &Document, field: &str) -> bool {
    doc.get(field).is_some_and(|v| !v.is_null())
}

type Shared<R> = State<Arc<Resource<R>>>;

/// `GET /` on a collection
pub async fn list_all<R: Repository>(
    State(resource): Shared<R>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<ListResponse<Document>, ApiError> {
    Ok(ListResponse::new(resource.list(None, &raw).await?))
}

/// `GET /` on a collection nested under a parent id
pub async fn list_nested<R: Repository>(
    State(resource): Shared<R>,
    Path(parent_id): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<ListResponse<Document>, ApiError> {
    Ok(ListResponse::new(resource.list(Some(&parent_id), &raw).await?))
}

/// `GET /{id}`
pub async fn get_one<R: Repository>(
    State(resource): Shared<R>,
    Path(id): Path<String>,
) -> Result<ItemResponse, ApiError> {
    Ok(ItemResponse::new(resource.get(&id).await?))
}

/// `POST /`
pub async fn create_one<R: Repository>(
    State(resource): Shared<R>,
    principal: Option<Principal>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(body) = payload?;
    let created = resource.create(None, principal.as_ref(), body).await?;
    Ok(ItemResponse::created(created))
}

/// `POST /` nested under a parent id
pub async fn create_nested<R: Repository>(
    State(resource): Shared<R>,
    Path(parent_id): Path<String>,
    principal: Option<Principal>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(body) = payload?;
    let created = resource
        .create(Some(&parent_id), principal.as_ref(), body)
        .await?;
    Ok(ItemResponse::created(created))
}

/// `PATCH /{id}`
pub async fn update_one<R: Repository>(
    State(resource): Shared<R>,
    Path(id): Path<String>,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(patch) = payload?;
    Ok(ItemResponse::new(resource.update(&id, patch).await?))
}

/// `DELETE /{id}`
pub async fn delete_one<R: Repository>(
    State(resource): Shared<R>,
    Path(id): Path<String>,
) -> Result<NoContent, ApiError> {
    resource.delete(&id).await?;
    Ok(NoContent)
}
