//! Document repositories
//!
//! Storage is expressed through the [`Repository`] trait over JSON
//! [`Document`]s so the generic handlers never depend on a concrete engine.
//!
//! - **Schemas**: [`Schema`] / [`Model`] validate and normalize documents
//! - **Queries**: [`DocumentQuery`] combines [`FilterCondition`]s, [`SortKey`]s,
//!   a [`Projection`] and [`Pagination`]
//! - **Population**: [`Populate`] expands references on the way out
//! - **Storage**: [`MemoryRepository`] keeps a collection in process
//!
//! # Example
//!
//! ```rust,ignore
//! use natours::models::Tour;
//! use natours::repository::{
//!     DocumentQuery, FilterCondition, MemoryRepository, ModelSchema, Repository,
//! };
//!
//! let tours = MemoryRepository::new(ModelSchema::<Tour>::new());
//! let easy = tours
//!     .find_all(&DocumentQuery::new().filter(FilterCondition::eq("difficulty", "easy")))
//!     .await?;
//! ```

mod error;
mod filter;
mod memory;
mod populate;
mod query;
mod schema;
mod traits;

/// A stored document: a JSON object keyed by field name
pub type Document = serde_json::Map<String, serde_json::Value>;

// Re-export all public types
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{
    compare_values, lookup, parse_datetime, values_equal, FilterCondition, FilterOperator,
};
pub use memory::MemoryRepository;
pub use populate::{populate_all, Populate};
pub use query::{
    DocumentQuery, OrderDirection, Pagination, Projection, SortKey, CREATED_AT_FIELD, ID_FIELD,
    VERSION_FIELD,
};
pub use schema::{present, Model, ModelSchema, Schema, ValidationErrors};
pub use traits::{Repository, RepositoryResult};
