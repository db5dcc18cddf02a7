//! Document query description: filters, ordering, projection and pagination
//!
//! # Example
//!
//! ```rust
//! use natours::repository::{
//!     DocumentQuery, FilterCondition, OrderDirection, Pagination, Projection,
//! };
//!
//! let query = DocumentQuery::new()
//!     .filter(FilterCondition::eq("difficulty", "easy"))
//!     .sort_by("price", OrderDirection::Descending)
//!     .project(Projection::include(["name", "price"]))
//!     .paginate(Pagination::page(1, 2));
//!
//! assert_eq!(query.filters.len(), 1);
//! assert_eq!(query.pagination, Some(Pagination::new(0, 2)));
//! ```

use std::fmt;

use super::filter::FilterCondition;
use super::Document;

/// Identifier field, always kept by inclusive projections
pub const ID_FIELD: &str = "id";

/// Internal version field, hidden by the default list projection
pub const VERSION_FIELD: &str = "__v";

/// Creation timestamp managed by the repository
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One key of a multi-key sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field name or dotted path
    pub field: String,
    /// Direction
    pub direction: OrderDirection,
}

impl SortKey {
    /// Ascending key
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Ascending,
        }
    }

    /// Descending key
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Descending,
        }
    }
}

/// Which top-level fields a query returns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every field
    #[default]
    All,
    /// Only these fields, plus `id`
    Include(Vec<String>),
    /// Every field except these
    Exclude(Vec<String>),
}

impl Projection {
    /// Inclusive projection from field names
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Exclusive projection from field names
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Apply to one document
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Self::All => doc,
            Self::Include(fields) => {
                doc.retain(|key, _| key == ID_FIELD || fields.iter().any(|f| f == key));
                doc
            }
            Self::Exclude(fields) => {
                doc.retain(|key, _| !fields.iter().any(|f| f == key));
                doc
            }
        }
    }
}

/// Pagination parameters for limiting query results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Create pagination for a specific page number (1-indexed)
    ///
    /// ```rust
    /// use natours::repository::Pagination;
    ///
    /// let page3 = Pagination::page(3, 20);
    /// assert_eq!(page3.offset, 40);
    /// assert_eq!(page3.limit, 20);
    /// ```
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }
}

/// A composed query against one collection
///
/// Nothing runs until the query is handed to a repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    /// Conditions, all of which must hold
    pub filters: Vec<FilterCondition>,
    /// Multi-key sort, first key most significant
    pub sort: Vec<SortKey>,
    /// Returned fields
    pub projection: Projection,
    /// Skip and limit, applied after sorting
    pub pagination: Option<Pagination>,
}

impl DocumentQuery {
    /// Empty query: every document, store order
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Add several conditions
    #[must_use]
    pub fn with_filters(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.filters.extend(conditions);
        self
    }

    /// Append a sort key
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    /// Replace the projection
    #[must_use]
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Replace the pagination
    #[must_use]
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Whether `doc` satisfies every filter
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|condition| condition.matches(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tour() -> Document {
        json!({"id": "tour_1", "name": "The Sea Explorer", "price": 497, "__v": 0})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_include_keeps_id() {
        let projected = Projection::include(["price"]).apply(tour());
        assert_eq!(projected.len(), 2);
        assert!(projected.contains_key("id"));
        assert!(projected.contains_key("price"));
    }

    #[test]
    fn test_exclude_drops_only_named_fields() {
        let projected = Projection::exclude([VERSION_FIELD]).apply(tour());
        assert!(!projected.contains_key("__v"));
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn test_page_saturates() {
        assert_eq!(Pagination::page(0, 10), Pagination::new(0, 10));
        assert_eq!(Pagination::page(u64::MAX, 10).offset, u64::MAX);
    }

    #[test]
    fn test_matches_requires_all_filters() {
        let query = DocumentQuery::new()
            .filter(FilterCondition::gte("price", 400))
            .filter(FilterCondition::eq("name", "The Forest Hiker"));
        assert!(!query.matches(&tour()));
        assert!(DocumentQuery::new().matches(&tour()));
    }
}
