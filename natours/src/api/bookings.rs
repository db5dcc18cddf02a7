//! `/bookings`: hosted checkout and admin CRUD

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{protect, restrict, ADMIN_OR_LEAD};
use crate::auth::{accounts::request_origin, Principal};
use crate::handlers::{
    create_one, delete_one, get_one, list_all, update_one, ApiError, ApiOperation, Resource,
};
use crate::payments::{CheckoutRequest, LineItem};
use crate::repository::{Document, MemoryRepository, Populate, Repository};
use crate::state::AppState;

/// Router mounted at `/bookings`
pub fn routes(state: &AppState) -> Router {
    let checkout = Router::new()
        .route(
            "/checkout-session/{id}",
            protect(get(checkout_session), state),
        )
        .with_state(state.clone());

    let collections = state.collections();
    let bookings = Arc::new(
        Resource::new(collections.bookings.clone(), state.query_policy())
            .with_read_populate(Populate::reference(
                "tour",
                collections.tours.clone(),
                &["name"],
            ))
            .with_read_populate(Populate::reference(
                "user",
                collections.users.clone(),
                &["name", "photo"],
            )),
    );
    let admin = Router::new()
        .route(
            "/",
            restrict(
                get(list_all::<MemoryRepository>).post(create_one::<MemoryRepository>),
                state,
                ADMIN_OR_LEAD,
            ),
        )
        .route(
            "/{id}",
            restrict(
                get(get_one::<MemoryRepository>)
                    .patch(update_one::<MemoryRepository>)
                    .delete(delete_one::<MemoryRepository>),
                state,
                ADMIN_OR_LEAD,
            ),
        )
        .with_state(bookings);

    checkout.merge(admin)
}

fn text(doc: &Document, field: &str) -> String {
    doc.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Checkout request for one seat on `tour`
pub fn checkout_request(
    tour: &Document,
    principal: &Principal,
    origin: &str,
    currency: &str,
) -> CheckoutRequest {
    let tour_id = text(tour, "id");
    let price = tour.get("price").and_then(Value::as_f64).unwrap_or_default();
    // Smallest currency unit; the stored price is never negative
    let unit_amount = (price * 100.0).round().max(0.0) as u64;

    CheckoutRequest {
        success_url: format!(
            "{origin}/?tour={tour_id}&user={}&price={price}",
            principal.id
        ),
        cancel_url: format!("{origin}/tour/{}", text(tour, "slug")),
        customer_email: text(&principal.document, "email"),
        client_reference_id: tour_id,
        line_item: LineItem {
            name: format!("{} Tour", text(tour, "name")),
            description: text(tour, "summary"),
            images: vec![format!("{origin}/img/tours/{}", text(tour, "imageCover"))],
            unit_amount,
            currency: currency.to_string(),
            quantity: 1,
        },
    }
}

/// `GET /bookings/checkout-session/{tourId}`
pub async fn checkout_session(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let gateway = state.payments().ok_or_else(|| {
        ApiError::service_unavailable("Payments are not available right now.")
            .with_operation(ApiOperation::Checkout)
    })?;
    let tour = state
        .collections()
        .tours
        .find_by_id(&tour_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tour", tour_id.as_str()))?;

    let currency = state
        .config()
        .payments
        .as_ref()
        .map_or("usd", |payments| payments.currency.as_str());
    let request = checkout_request(
        &tour,
        &principal,
        &request_origin(&headers, &state),
        currency,
    );
    let session = gateway
        .create_checkout_session(&request)
        .await
        .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Checkout))?;

    tracing::info!(tour = %tour_id, user = %principal.id, "checkout session created");
    Ok(Json(json!({"status": "success", "session": session})))
}
