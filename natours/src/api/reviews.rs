//! `/reviews` and `/tours/{id}/reviews`
//!
//! Both mounts share one descriptor: reads expand the reviewer, creates fill
//! `tour` from the path and `user` from the caller when the body omits them.
//! Every write recomputes the reviewed tour's `ratingsAverage` and
//! `ratingsQuantity`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::{protect, restrict, REVIEWER, REVIEWER_OR_ADMIN};
use crate::auth::{Principal, NO_PERMISSION};
use crate::models::Role;
use crate::handlers::{
    get_one, list_all, list_nested, ApiError, ItemResponse, NoContent, Resource,
};
use crate::repository::{
    Document, DocumentQuery, FilterCondition, MemoryRepository, Populate, Repository,
    RepositoryErrorKind,
};
use crate::state::AppState;

/// Rating a tour shows before anyone reviews it
pub const DEFAULT_RATING: f64 = 4.5;

/// Router state: the review descriptor plus the tours it rates
#[derive(Clone)]
pub struct ReviewState {
    reviews: Arc<Resource<MemoryRepository>>,
    tours: MemoryRepository,
}

impl FromRef<ReviewState> for Arc<Resource<MemoryRepository>> {
    fn from_ref(state: &ReviewState) -> Self {
        state.reviews.clone()
    }
}

impl ReviewState {
    /// Build from the application state
    pub fn new(state: &AppState) -> Self {
        let collections = state.collections();
        let reviews = Resource::new(collections.reviews.clone(), state.query_policy())
            .with_read_populate(Populate::reference(
                "user",
                collections.users.clone(),
                &["name", "photo"],
            ))
            .nested_under("tour")
            .owned_by("user");
        Self {
            reviews: Arc::new(reviews),
            tours: collections.tours.clone(),
        }
    }

    /// Recompute the rating summary of the tour `review` belongs to
    async fn refresh(&self, review: &Document) -> Result<(), ApiError> {
        match review.get("tour").and_then(Value::as_str) {
            Some(tour_id) => {
                refresh_tour_ratings(self.reviews.repository(), &self.tours, tour_id).await
            }
            None => Ok(()),
        }
    }
}

/// Store the average and count of `tour_id`'s ratings on the tour
///
/// With no rated reviews the tour falls back to [`DEFAULT_RATING`] and a
/// count of zero. A tour that cannot be seen (deleted or secret) is skipped.
pub async fn refresh_tour_ratings(
    reviews: &MemoryRepository,
    tours: &MemoryRepository,
    tour_id: &str,
) -> Result<(), ApiError> {
    let query = DocumentQuery::new().filter(FilterCondition::eq("tour", tour_id));
    let ratings: Vec<f64> = reviews
        .find_all(&query)
        .await?
        .iter()
        .filter_map(|review| review.get("rating").and_then(Value::as_f64))
        .collect();

    let (average, quantity) = if ratings.is_empty() {
        (DEFAULT_RATING, 0)
    } else {
        let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
        ((mean * 10.0).round() / 10.0, ratings.len())
    };

    let summary = json!({"ratingsAverage": average, "ratingsQuantity": quantity});
    let Value::Object(summary) = summary else {
        return Ok(());
    };
    match tours.patch_unchecked(tour_id, summary).await {
        Ok(_) => {
            tracing::debug!(tour = %tour_id, average, quantity, "tour ratings refreshed");
            Ok(())
        }
        Err(e)
            if matches!(
                e.kind,
                RepositoryErrorKind::NotFound | RepositoryErrorKind::InvalidId
            ) =>
        {
            tracing::debug!(tour = %tour_id, "rated tour not visible, ratings left unchanged");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Router mounted at `/reviews`
pub fn routes(state: &AppState) -> Router {
    Router::new()
        .route(
            "/",
            protect(get(list_all::<MemoryRepository>), state)
                .merge(restrict(post(create_review), state, REVIEWER)),
        )
        .route(
            "/{id}",
            protect(get(get_one::<MemoryRepository>), state).merge(restrict(
                patch(update_review).delete(delete_review),
                state,
                REVIEWER_OR_ADMIN,
            )),
        )
        .with_state(ReviewState::new(state))
}

/// Router mounted at `/tours/{id}/reviews`
pub fn nested_routes(state: &AppState) -> Router {
    Router::new()
        .route(
            "/",
            protect(get(list_nested::<MemoryRepository>), state)
                .merge(restrict(post(create_nested_review), state, REVIEWER)),
        )
        .with_state(ReviewState::new(state))
}

/// `POST /reviews`
pub async fn create_review(
    State(state): State<ReviewState>,
    principal: Principal,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(body) = payload?;
    let created = state.reviews.create(None, Some(&principal), body).await?;
    state.refresh(&created).await?;
    Ok(ItemResponse::created(created))
}

/// `POST /tours/{id}/reviews`
pub async fn create_nested_review(
    State(state): State<ReviewState>,
    Path(tour_id): Path<String>,
    principal: Principal,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(body) = payload?;
    let created = state
        .reviews
        .create(Some(&tour_id), Some(&principal), body)
        .await?;
    state.refresh(&created).await?;
    Ok(ItemResponse::created(created))
}

/// Stored review `id`, when `principal` wrote it or is an admin
async fn editable_review(
    state: &ReviewState,
    id: &str,
    principal: &Principal,
) -> Result<Document, ApiError> {
    let review = state
        .reviews
        .repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;
    let author = review.get("user").and_then(Value::as_str);
    if principal.role != Role::Admin && author != Some(principal.id.as_str()) {
        tracing::debug!(review = %id, user = %principal.id, "review edit by non-author refused");
        return Err(ApiError::forbidden(NO_PERMISSION));
    }
    Ok(review)
}

/// `PATCH /reviews/{id}`
///
/// The author cannot be reassigned. Moving a review to another tour
/// refreshes the ratings of both tours.
pub async fn update_review(
    State(state): State<ReviewState>,
    Path(id): Path<String>,
    principal: Principal,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(mut patch) = payload?;
    let existing = editable_review(&state, &id, &principal).await?;
    patch.remove("user");

    let updated = state.reviews.update(&id, patch).await?;
    state.refresh(&updated).await?;
    if existing.get("tour") != updated.get("tour") {
        state.refresh(&existing).await?;
    }
    Ok(ItemResponse::new(updated))
}

/// `DELETE /reviews/{id}`
pub async fn delete_review(
    State(state): State<ReviewState>,
    Path(id): Path<String>,
    principal: Principal,
) -> Result<NoContent, ApiError> {
    let existing = editable_review(&state, &id, &principal).await?;
    state.reviews.delete(&id).await?;
    state.refresh(&existing).await?;
    Ok(NoContent)
}
