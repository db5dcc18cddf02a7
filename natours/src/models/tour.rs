//! Tour documents

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::repository::{parse_datetime, Document, FilterCondition, Model, ValidationErrors};
use chrono::SecondsFormat;

/// Allowed difficulty levels
pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

fn default_ratings_average() -> f64 {
    4.5
}

/// GeoJSON point with an optional address label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "GeoPoint::point")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl GeoPoint {
    fn point() -> String {
        "Point".to_string()
    }

    /// `(latitude, longitude)` when the coordinates are well formed
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lng, lat] => Some((*lat, *lng)),
            _ => None,
        }
    }

    fn validate(&self, field: &str, errors: &mut ValidationErrors) {
        if self.kind != "Point" {
            errors.push(format!("{field} must be a GeoJSON Point"));
        }
        match self.lat_lng() {
            Some((lat, lng))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) => {}
            _ => errors.push(format!("{field} coordinates must be [longitude, latitude]")),
        }
    }
}

/// A bookable tour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: String,
    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u32,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: String,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<String>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guides: Vec<String>,
}

impl Model for Tour {
    const ENTITY: &'static str = "Tour";
    const ID_PREFIX: &'static str = "tour";
    const REQUIRED: &'static [(&'static str, &'static str)] = &[
        ("name", "A tour must have a name"),
        ("duration", "A tour must have a duration"),
        ("maxGroupSize", "A tour must have a group size"),
        ("difficulty", "A tour must have a difficulty"),
        ("price", "A tour must have a price"),
        ("summary", "A tour must have a summary"),
        ("description", "A tour must have a description"),
        ("imageCover", "A tour must have a cover image"),
    ];
    const UNIQUE: &'static [&'static str] = &["name"];
    const FILTERABLE: Option<&'static [&'static str]> = Some(&[
        "name",
        "slug",
        "duration",
        "maxGroupSize",
        "difficulty",
        "ratingsAverage",
        "ratingsQuantity",
        "price",
        "priceDiscount",
        "startDates",
        "createdAt",
    ]);

    fn validate(&self, errors: &mut ValidationErrors) {
        let name_length = self.name.trim().chars().count();
        if name_length > 40 {
            errors.push("A tour name must have less or equal then 40 characters");
        }
        if name_length < 10 {
            errors.push("A tour name must have more or equal then 10 characters");
        }
        if self.duration == 0 {
            errors.push("A tour must last at least one day");
        }
        if !DIFFICULTIES.contains(&self.difficulty.as_str()) {
            errors.push("Difficulty is either: easy, medium, difficult");
        }
        if !(1.0..=5.0).contains(&self.ratings_average) {
            errors.push("Rating must be between 1.0 and 5.0");
        }
        if self.price < 0.0 {
            errors.push("A tour price can not be negative");
        }
        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                errors.push(format!(
                    "Discount price ({discount}) should be below regular price"
                ));
            }
        }
        for date in &self.start_dates {
            if parse_datetime(date).is_none() {
                errors.push(format!("Invalid start date: {date}"));
            }
        }
        if let Some(location) = &self.start_location {
            location.validate("startLocation", errors);
        }
        for location in &self.locations {
            location.validate("locations", errors);
        }
    }

    fn before_save(&mut self, _is_new: bool) {
        self.name = self.name.trim().to_string();
        self.slug = Some(slugify(&self.name));
        self.ratings_average = (self.ratings_average * 10.0).round() / 10.0;
        self.start_dates = self
            .start_dates
            .iter()
            .filter_map(|date| parse_datetime(date))
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .collect();
    }

    fn default_filters() -> Vec<FilterCondition> {
        vec![FilterCondition::ne("secretTour", true)]
    }

    fn virtuals(doc: &mut Document) {
        if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeeks".to_string(), Value::from(duration / 7.0));
        }
    }
}

/// Lowercase, hyphen-separated form of `name`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
