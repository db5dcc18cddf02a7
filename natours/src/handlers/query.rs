//! Query-string translation for list operations
//!
//! [`QueryFeatures`] turns raw query pairs into a [`DocumentQuery`]:
//!
//! | Query string                 | Effect                                         |
//! |------------------------------|------------------------------------------------|
//! | `difficulty=easy`            | equality filter                                |
//! | `price[gte]=500`             | comparison filter (`gt`, `gte`, `lt`, `lte`)   |
//! | `duration=5&duration=9`      | membership filter                              |
//! | `sort=-price,ratingsAverage` | multi-key sort, `-` for descending             |
//! | `fields=name,price`          | inclusive projection (`-price` to exclude)     |
//! | `page=2&limit=5`             | skip 5, take 5                                 |
//!
//! Without `sort` results come newest first; without `fields` the internal
//! `__v` field is dropped. Each step consumes and returns the builder:
//!
//! ```rust
//! use natours::handlers::{QueryFeatures, QueryPolicy};
//! use natours::repository::{DocumentQuery, Pagination};
//!
//! let raw = vec![
//!     ("difficulty".to_string(), "easy".to_string()),
//!     ("sort".to_string(), "-price".to_string()),
//!     ("page".to_string(), "2".to_string()),
//!     ("limit".to_string(), "5".to_string()),
//! ];
//! let query = QueryFeatures::new(&raw, DocumentQuery::new(), QueryPolicy::default())
//!     .filter()?
//!     .sort()?
//!     .limit_fields()?
//!     .paginate()
//!     .into_query();
//!
//! assert_eq!(query.filters.len(), 1);
//! assert_eq!(query.pagination, Some(Pagination::new(5, 5)));
//! # Ok::<(), natours::handlers::QueryError>(())
//! ```

use serde_json::Value;
use std::fmt;

use crate::config::QueryConfig;
use crate::repository::{
    DocumentQuery, FilterCondition, FilterOperator, Pagination, Projection, SortKey,
    CREATED_AT_FIELD, VERSION_FIELD,
};

/// Keys that control the query instead of filtering it
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Default number of items per page
pub const DEFAULT_LIMIT: u64 = 10;

/// Maximum allowed items per page
pub const MAX_LIMIT: u64 = 100;

/// Per-resource limits on what a query may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Page size when `limit` is absent, zero or unparsable
    pub default_limit: u64,
    /// Upper clamp for `limit`
    pub max_limit: u64,
    /// Fields clients may filter on; `None` allows any non-hidden field
    pub filterable: Option<&'static [&'static str]>,
    /// Fields that can be neither filtered nor sorted
    pub hidden: &'static [&'static str],
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            filterable: None,
            hidden: &[],
        }
    }
}

impl QueryPolicy {
    /// Policy with page sizes taken from configuration
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            default_limit: config.default_limit.max(1),
            max_limit: config.max_limit.max(1),
            ..Self::default()
        }
    }

    /// Restrict filtering to `fields`
    #[must_use]
    pub fn with_filterable(mut self, fields: Option<&'static [&'static str]>) -> Self {
        self.filterable = fields;
        self
    }

    /// Fields that stay out of every query
    #[must_use]
    pub fn with_hidden(mut self, fields: &'static [&'static str]) -> Self {
        self.hidden = fields;
        self
    }

    fn is_hidden(&self, field: &str) -> bool {
        let root = field.split('.').next().unwrap_or(field);
        self.hidden.contains(&root)
    }
}

/// A query string the translator refuses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// `field[op]` with an operator outside gt/gte/lt/lte
    UnsupportedOperator {
        /// Field the operator was attached to
        field: String,
        /// The rejected operator token
        operator: String,
    },
    /// Filtering on a field outside the allow-list
    FieldNotFilterable(String),
    /// Sorting on a hidden field
    FieldNotSortable(String),
    /// A field name with characters outside `[A-Za-z0-9_.]`
    InvalidFieldName(String),
    /// `fields` mixing `name` and `-name` forms
    MixedProjection,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperator { field, operator } => write!(
                f,
                "Unsupported filter operator '{operator}' on field '{field}'. \
                 Use gt, gte, lt or lte"
            ),
            Self::FieldNotFilterable(field) => write!(f, "Filtering on '{field}' is not allowed"),
            Self::FieldNotSortable(field) => write!(f, "Sorting on '{field}' is not allowed"),
            Self::InvalidFieldName(field) => write!(f, "Invalid field name '{field}'"),
            Self::MixedProjection => write!(
                f,
                "Projection cannot mix included and excluded fields"
            ),
        }
    }
}

impl std::error::Error for QueryError {}

/// Builder translating query pairs into a [`DocumentQuery`]
///
/// Steps may run in any order and each touches only its own part of the
/// query. No I/O happens here.
#[derive(Debug, Clone)]
pub struct QueryFeatures<'a> {
    raw: &'a [(String, String)],
    policy: QueryPolicy,
    query: DocumentQuery,
}

impl<'a> QueryFeatures<'a> {
    /// Start from `base`, which may already carry filters (parent scoping)
    pub fn new(raw: &'a [(String, String)], base: DocumentQuery, policy: QueryPolicy) -> Self {
        Self {
            raw,
            policy,
            query: base,
        }
    }

    /// Run every step: filter, sort, projection, pagination
    pub fn apply_all(
        raw: &'a [(String, String)],
        base: DocumentQuery,
        policy: QueryPolicy,
    ) -> Result<DocumentQuery, QueryError> {
        Ok(Self::new(raw, base, policy)
            .filter()?
            .sort()?
            .limit_fields()?
            .paginate()
            .into_query())
    }

    /// Last value given for a reserved key
    fn control(&self, key: &str) -> Option<&'a str> {
        self.raw
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Translate every non-reserved pair into a filter condition
    pub fn filter(mut self) -> Result<Self, QueryError> {
        let mut equalities: Vec<(String, Vec<Value>)> = Vec::new();

        for (key, raw_value) in self.raw {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (field, operator) = split_operator(key)?;
            check_field_name(field)?;
            if self.policy.is_hidden(field)
                || self.policy.filterable.is_some_and(|allowed| !allowed.contains(&field))
            {
                return Err(QueryError::FieldNotFilterable(field.to_string()));
            }

            let value = coerce(raw_value);
            match operator {
                Some(token) => {
                    let operator = FilterOperator::from_query_token(token).ok_or_else(|| {
                        QueryError::UnsupportedOperator {
                            field: field.to_string(),
                            operator: token.to_string(),
                        }
                    })?;
                    self.query.filters.push(FilterCondition::new(field, operator, value));
                }
                None => match equalities.iter_mut().find(|(f, _)| f == field) {
                    Some((_, values)) => values.push(value),
                    None => equalities.push((field.to_string(), vec![value])),
                },
            }
        }

        for (field, mut values) in equalities {
            let condition = if values.len() == 1 {
                FilterCondition::eq(field, values.remove(0))
            } else {
                FilterCondition::in_list(field, values)
            };
            self.query.filters.push(condition);
        }
        Ok(self)
    }

    /// Apply `sort`, defaulting to newest first
    pub fn sort(mut self) -> Result<Self, QueryError> {
        let mut keys = Vec::new();
        for token in self
            .control("sort")
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let key = match token.strip_prefix('-') {
                Some(field) => SortKey::desc(field),
                None => SortKey::asc(token),
            };
            check_field_name(&key.field)?;
            if self.policy.is_hidden(&key.field) {
                return Err(QueryError::FieldNotSortable(key.field));
            }
            keys.push(key);
        }

        if keys.is_empty() {
            keys.push(SortKey::desc(CREATED_AT_FIELD));
        }
        self.query.sort = keys;
        Ok(self)
    }

    /// Apply `fields`, defaulting to everything but `__v`
    pub fn limit_fields(mut self) -> Result<Self, QueryError> {
        let fields: Vec<&str> = self
            .control("fields")
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let excluded = fields.iter().filter(|f| f.starts_with('-')).count();
        self.query.projection = if fields.is_empty() {
            Projection::exclude([VERSION_FIELD])
        } else if excluded == fields.len() {
            Projection::exclude(fields.iter().map(|f| f.trim_start_matches('-')))
        } else if excluded == 0 {
            Projection::include(fields.iter().copied())
        } else {
            return Err(QueryError::MixedProjection);
        };
        Ok(self)
    }

    /// Apply `page` and `limit`
    ///
    /// Never fails: a missing, zero, negative or unparsable page is page 1;
    /// a missing, zero or unparsable limit is the policy default; a limit
    /// above the policy maximum is clamped to it.
    pub fn paginate(mut self) -> Self {
        let page = self
            .control("page")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = self
            .control("limit")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(self.policy.default_limit)
            .clamp(1, self.policy.max_limit.max(1));

        self.query.pagination = Some(Pagination::page(page, limit));
        self
    }

    /// The composed query
    pub fn into_query(self) -> DocumentQuery {
        self.query
    }
}

/// `price[gte]` → (`price`, Some(`gte`)); `price` → (`price`, None)
fn split_operator(key: &str) -> Result<(&str, Option<&str>), QueryError> {
    match key.split_once('[') {
        Some((field, rest)) => match rest.strip_suffix(']') {
            Some(operator) if !operator.contains(['[', ']']) => Ok((field, Some(operator))),
            _ => Err(QueryError::InvalidFieldName(key.to_string())),
        },
        None => Ok((key, None)),
    }
}

fn check_field_name(field: &str) -> Result<(), QueryError> {
    let valid = !field.is_empty()
        && !field.starts_with('.')
        && !field.ends_with('.')
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidFieldName(field.to_string()))
    }
}

/// Booleans and numbers become typed values, everything else stays text
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = raw.parse::<i64>() {
                return Value::from(int);
            }
            match raw.parse::<f64>() {
                Ok(float) if float.is_finite() && !raw.trim().is_empty() => Value::from(float),
                _ => Value::String(raw.to_string()),
            }
        }
    }
}
