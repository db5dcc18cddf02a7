//! `/tours`: CRUD, the cheap-tours alias, analytics and geo queries
//!
//! Reads expand `guides` to user summaries; fetching one tour also attaches
//! its reviews, each with the reviewer's name and photo. Reviews for one
//! tour are served from `/tours/{id}/reviews` by [`super::reviews`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use chrono::Datelike;
use serde_json::{json, Value};

use super::{reviews, restrict, ADMIN_OR_LEAD};
use crate::handlers::{
    create_one, delete_one, get_one, list_all, update_one, ApiError, ApiOperation, ItemResponse,
    ListResponse, Resource,
};
use crate::models::GeoPoint;
use crate::repository::{
    parse_datetime, present, Document, DocumentQuery, MemoryRepository, Populate, Repository,
};
use crate::state::AppState;

type Tours = Arc<Resource<MemoryRepository>>;

/// Query overrides behind `/tours/top-5-cheap`
pub const TOP_FIVE_CHEAP: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Earth radius in miles
pub const EARTH_RADIUS_MI: f64 = 3963.2;

/// Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6378.1;

const BAD_LATLNG: &str = "Please provide latitude and longitude in the format lat,lng.";

/// Fields shown for each populated guide
const GUIDE_FIELDS: &[&str] = &["name", "email", "photo", "role"];

/// Fields shown for each reviewer
const REVIEWER_FIELDS: &[&str] = &["name", "photo"];

/// The tour descriptor with its populate specs
pub fn resource(state: &AppState) -> Resource<MemoryRepository> {
    let collections = state.collections();
    Resource::new(collections.tours.clone(), state.query_policy())
        .with_read_populate(Populate::reference(
            "guides",
            collections.users.clone(),
            GUIDE_FIELDS,
        ))
        .with_detail_populate(
            Populate::children("reviews", collections.reviews.clone(), "tour").with_nested(
                Populate::reference("user", collections.users.clone(), REVIEWER_FIELDS),
            ),
        )
}

/// Router mounted at `/tours`
pub fn routes(state: &AppState) -> Router {
    let tours: Tours = Arc::new(resource(state));
    Router::new()
        .route(
            "/",
            get(list_all::<MemoryRepository>).merge(restrict(
                axum::routing::post(create_one::<MemoryRepository>),
                state,
                ADMIN_OR_LEAD,
            )),
        )
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/tour-stats", get(tour_stats))
        .route("/monthly-plan/{year}", get(monthly_plan))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances))
        .route(
            "/{id}",
            get(get_one::<MemoryRepository>).merge(restrict(
                axum::routing::patch(update_one::<MemoryRepository>)
                    .delete(delete_one::<MemoryRepository>),
                state,
                ADMIN_OR_LEAD,
            )),
        )
        .with_state(tours)
        .nest("/{id}/reviews", reviews::nested_routes(state))
}

/// `GET /tours/top-5-cheap`
pub async fn top_five_cheap(
    State(tours): State<Tours>,
    Query(mut raw): Query<Vec<(String, String)>>,
) -> Result<ListResponse<Document>, ApiError> {
    raw.retain(|(key, _)| !TOP_FIVE_CHEAP.iter().any(|(alias, _)| alias == key));
    raw.extend(
        TOP_FIVE_CHEAP
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    );
    Ok(ListResponse::new(tours.list(None, &raw).await?))
}

fn report_error(message: impl Into<String>) -> ApiError {
    ApiError::bad_request(message).with_operation(ApiOperation::Report)
}

fn number(doc: &Document, field: &str) -> Option<f64> {
    doc.get(field).and_then(Value::as_f64)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Default)]
struct DifficultyStats {
    tours: u64,
    ratings: f64,
    rating_sum: f64,
    price_sum: f64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

/// Aggregate well-rated tours by difficulty
pub fn difficulty_stats(tours: &[Document]) -> Vec<Value> {
    let mut groups: BTreeMap<String, DifficultyStats> = BTreeMap::new();
    for tour in tours {
        if number(tour, "ratingsAverage").is_none_or(|rating| rating < 4.5) {
            continue;
        }
        let difficulty = tour
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        let price = number(tour, "price").unwrap_or_default();
        let group = groups.entry(difficulty).or_default();
        group.tours += 1;
        group.ratings += number(tour, "ratingsQuantity").unwrap_or_default();
        group.rating_sum += number(tour, "ratingsAverage").unwrap_or_default();
        group.price_sum += price;
        group.min_price = Some(group.min_price.map_or(price, |min| min.min(price)));
        group.max_price = Some(group.max_price.map_or(price, |max| max.max(price)));
    }

    let mut stats: Vec<(f64, Value)> = groups
        .into_iter()
        .map(|(difficulty, group)| {
            let count = group.tours as f64;
            let avg_price = round_to(group.price_sum / count, 2);
            let row = json!({
                "_id": difficulty,
                "numTours": group.tours,
                "numRatings": group.ratings,
                "avgRating": round_to(group.rating_sum / count, 2),
                "avgPrice": avg_price,
                "minPrice": group.min_price,
                "maxPrice": group.max_price,
            });
            (avg_price, row)
        })
        .collect();
    stats.sort_by(|a, b| a.0.total_cmp(&b.0));
    stats.into_iter().map(|(_, row)| row).collect()
}

/// `GET /tours/tour-stats`
pub async fn tour_stats(State(tours): State<Tours>) -> Result<ItemResponse, ApiError> {
    let all = tours.repository().find_all(&DocumentQuery::new()).await?;
    Ok(ItemResponse::keyed("stats", difficulty_stats(&all)))
}

/// Tour starts per month of `year`, busiest month first
pub fn monthly_plan_for(tours: &[Document], year: i32) -> Vec<Value> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        let name = tour
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let dates = tour
            .get("startDates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter_map(parse_datetime);
        for date in dates.filter(|date| date.year() == year) {
            months.entry(date.month()).or_default().push(name.clone());
        }
    }

    let mut plan: Vec<(u32, Vec<String>)> = months.into_iter().collect();
    plan.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    plan.truncate(12);
    plan.into_iter()
        .map(|(month, names)| {
            json!({
                "month": month,
                "numTourStarts": names.len(),
                "tours": names,
            })
        })
        .collect()
}

/// `GET /tours/monthly-plan/{year}`
pub async fn monthly_plan(
    State(tours): State<Tours>,
    Path(year): Path<String>,
) -> Result<ItemResponse, ApiError> {
    let year: i32 = year
        .parse()
        .map_err(|_| report_error(format!("Invalid year: {year}.")))?;
    let all = tours.repository().find_all(&DocumentQuery::new()).await?;
    Ok(ItemResponse::keyed("plan", monthly_plan_for(&all, year)))
}

/// `lat,lng` into a coordinate pair
pub fn parse_lat_lng(raw: &str) -> Result<(f64, f64), ApiError> {
    let (lat, lng) = raw.split_once(',').ok_or_else(|| report_error(BAD_LATLNG))?;
    let lat: f64 = lat.trim().parse().map_err(|_| report_error(BAD_LATLNG))?;
    let lng: f64 = lng.trim().parse().map_err(|_| report_error(BAD_LATLNG))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(report_error(BAD_LATLNG));
    }
    Ok((lat, lng))
}

/// Central angle in radians between two `(lat, lng)` points
pub fn central_angle(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

fn start_point(tour: &Document) -> Option<(f64, f64)> {
    let location: GeoPoint = serde_json::from_value(tour.get("startLocation")?.clone()).ok()?;
    location.lat_lng()
}

/// `mi` selects miles; anything else is kilometres
fn earth_radius(unit: &str) -> f64 {
    if unit == "mi" {
        EARTH_RADIUS_MI
    } else {
        EARTH_RADIUS_KM
    }
}

/// `GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}`
pub async fn tours_within(
    State(tours): State<Tours>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<ListResponse<Document>, ApiError> {
    let center = parse_lat_lng(&latlng)?;
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| report_error(format!("Invalid distance: {distance}.")))?;
    let radius = distance / earth_radius(&unit);

    let schema = tours.repository().schema();
    let within = tours
        .repository()
        .find_all(&DocumentQuery::new())
        .await?
        .into_iter()
        .filter(|tour| {
            start_point(tour).is_some_and(|point| central_angle(center, point) <= radius)
        })
        .map(|tour| present(schema, tour))
        .collect();
    Ok(ListResponse::new(within))
}

/// `GET /tours/distances/{latlng}/unit/{unit}`
pub async fn distances(
    State(tours): State<Tours>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<ListResponse<Value>, ApiError> {
    let origin = parse_lat_lng(&latlng)?;
    let radius = earth_radius(&unit);

    let mut rows: Vec<(f64, Value)> = tours
        .repository()
        .find_all(&DocumentQuery::new())
        .await?
        .into_iter()
        .filter_map(|tour| {
            let distance = central_angle(origin, start_point(&tour)?) * radius;
            let row = json!({
                "id": tour.get("id"),
                "name": tour.get("name"),
                "distance": round_to(distance, 3),
            });
            Some((distance, row))
        })
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(ListResponse::new(rows.into_iter().map(|(_, row)| row).collect()))
}
