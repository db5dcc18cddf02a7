//! HTTP handler building blocks
//!
//! - [`query`]: translates query-string directives into a repository query
//! - [`resource`]: generic CRUD handlers over a [`Resource`] descriptor
//! - [`response`]: success envelopes
//! - [`error`]: [`ApiError`] and the error normalizer

pub mod error;
pub mod query;
pub mod resource;
pub mod response;

pub use error::{render_errors, route_not_found, ApiError, ApiErrorKind, ApiOperation, ErrorMode};
pub use query::{QueryError, QueryFeatures, QueryPolicy, DEFAULT_LIMIT, MAX_LIMIT};
pub use resource::{
    create_nested, create_one, delete_one, get_one, list_all, list_nested, update_one, ParentScope,
    Resource,
};
pub use response::{ItemResponse, ListResponse, MessageResponse, NoContent};
