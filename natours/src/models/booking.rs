//! Tour bookings

use serde::{Deserialize, Serialize};

use crate::repository::{Model, ValidationErrors};

fn default_paid() -> bool {
    true
}

/// A user's paid place on a tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub tour: String,
    pub user: String,
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

impl Model for Booking {
    const ENTITY: &'static str = "Booking";
    const ID_PREFIX: &'static str = "booking";
    const REQUIRED: &'static [(&'static str, &'static str)] = &[
        ("tour", "Booking must belong to a Tour!"),
        ("user", "Booking must belong to a User!"),
        ("price", "Booking must have a price."),
    ];
    const FILTERABLE: Option<&'static [&'static str]> =
        Some(&["tour", "user", "price", "paid", "createdAt"]);

    fn validate(&self, errors: &mut ValidationErrors) {
        if self.price < 0.0 {
            errors.push("Booking price can not be negative");
        }
    }
}
