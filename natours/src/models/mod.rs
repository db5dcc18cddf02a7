//! Typed document models for the four collections

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::Booking;
pub use review::Review;
pub use tour::{slugify, GeoPoint, Tour, DIFFICULTIES};
pub use user::{Role, User, PASSWORD_HASH_PREFIX};
