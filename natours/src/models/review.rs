//! Reviews left by users on tours

use serde::{Deserialize, Serialize};

use crate::repository::{Model, ValidationErrors};

/// One user's review of one tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub review: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub tour: String,
    pub user: String,
}

impl Model for Review {
    const ENTITY: &'static str = "Review";
    const ID_PREFIX: &'static str = "review";
    const REQUIRED: &'static [(&'static str, &'static str)] = &[
        ("review", "Review can not be empty!"),
        ("tour", "Review must belong to a tour."),
        ("user", "Review must belong to a user."),
    ];
    const UNIQUE_TOGETHER: &'static [&'static [&'static str]] = &[&["tour", "user"]];
    const FILTERABLE: Option<&'static [&'static str]> =
        Some(&["rating", "tour", "user", "createdAt"]);

    fn validate(&self, errors: &mut ValidationErrors) {
        if let Some(rating) = self.rating {
            if !(1.0..=5.0).contains(&rating) {
                errors.push("Rating must be between 1 and 5");
            }
        }
    }

    fn before_save(&mut self, _is_new: bool) {
        self.review = self.review.trim().to_string();
    }
}
