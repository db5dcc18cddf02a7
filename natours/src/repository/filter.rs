//! Filter conditions evaluated against JSON documents
//!
//! Conditions address fields by name or dotted path (`startLocation.type`).
//! Comparisons follow document-store semantics rather than strict JSON
//! equality:
//!
//! - numbers compare numerically, so `5` equals `5.0`
//! - strings that both parse as dates compare chronologically
//! - a scalar condition against an array field matches when any element matches
//! - a missing field only satisfies `NotEqual`

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::Document;

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Value is in a list (IN)
    In,
}

impl FilterOperator {
    /// Parses the bracketed query-string operator (`price[gte]`)
    pub fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Self::GreaterThan),
            "gte" => Some(Self::GreaterThanOrEqual),
            "lt" => Some(Self::LessThan),
            "lte" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::In => write!(f, "IN"),
        }
    }
}

/// A single field comparison
///
/// # Example
///
/// ```rust
/// use natours::repository::FilterCondition;
/// use serde_json::json;
///
/// let doc = json!({"price": 497, "difficulty": "easy"});
/// let doc = doc.as_object().unwrap();
///
/// assert!(FilterCondition::gte("price", 400).matches(doc));
/// assert!(FilterCondition::eq("difficulty", "easy").matches(doc));
/// assert!(!FilterCondition::lt("price", 400).matches(doc));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// Field name or dotted path
    pub field: String,
    /// Comparison operator
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: Value,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Create an equality condition
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Equal, value)
    }

    /// Create a not-equal condition
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value)
    }

    /// Create a greater-than condition
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value)
    }

    /// Create a greater-than-or-equal condition
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value)
    }

    /// Create a less-than condition
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::LessThan, value)
    }

    /// Create a less-than-or-equal condition
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value)
    }

    /// Create a membership condition
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Check whether `doc` satisfies this condition
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(field_value) = lookup(doc, &self.field).filter(|v| !v.is_null()) else {
            return self.operator == FilterOperator::NotEqual && !self.value.is_null();
        };

        match (self.operator, field_value) {
            (FilterOperator::NotEqual, Value::Array(items)) if !self.value.is_array() => {
                !items.iter().any(|item| values_equal(item, &self.value))
            }
            (FilterOperator::NotEqual, _) => !values_equal(field_value, &self.value),
            (_, Value::Array(items))
                if !self.value.is_array() || self.operator == FilterOperator::In =>
            {
                items.iter().any(|item| self.matches_scalar(item))
            }
            _ => self.matches_scalar(field_value),
        }
    }

    fn matches_scalar(&self, field_value: &Value) -> bool {
        let ordering = || compare_values(field_value, &self.value);
        match self.operator {
            FilterOperator::Equal => values_equal(field_value, &self.value),
            FilterOperator::NotEqual => !values_equal(field_value, &self.value),
            FilterOperator::GreaterThan => ordering() == Some(Ordering::Greater),
            FilterOperator::GreaterThanOrEqual => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterOperator::LessThan => ordering() == Some(Ordering::Less),
            FilterOperator::LessThanOrEqual => {
                matches!(ordering(), Some(Ordering::Less | Ordering::Equal))
            }
            FilterOperator::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| values_equal(field_value, c))),
        }
    }
}

/// Resolve a field name or dotted path inside a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Order two JSON values when they are comparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (parse_datetime(a), parse_datetime(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Number(a), Value::String(b)) => {
            a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?)
        }
        (Value::String(a), Value::Number(b)) => {
            a.trim().parse::<f64>().ok()?.partial_cmp(&b.as_f64()?)
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Equality with numeric and date coercion
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Total order used for sorting: missing and null first, then numbers,
/// dates, other strings, objects, arrays and booleans
///
/// Date strings rank apart from plain strings and compare as instants.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(s)) if parse_datetime(s).is_some() => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Object(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Bool(_)) => 6,
        }
    }

    match (a, b) {
        (Some(a), Some(b)) if rank(Some(a)) == rank(Some(b)) => {
            compare_values(a, b).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn test_numeric_comparison_ignores_integer_float_split() {
        let tour = doc(json!({"price": 397.0, "duration": 5}));
        assert!(FilterCondition::eq("price", 397).matches(&tour));
        assert!(FilterCondition::gte("price", 397).matches(&tour));
        assert!(!FilterCondition::gt("price", 397).matches(&tour));
        assert!(FilterCondition::lte("duration", 5.0).matches(&tour));
    }

    #[test]
    fn test_string_field_against_numeric_query_value() {
        let tour = doc(json!({"name": "1984 Tour", "code": "42"}));
        assert!(FilterCondition::eq("code", 42).matches(&tour));
        assert!(!FilterCondition::eq("name", 1984).matches(&tour));
    }

    #[test]
    fn test_dates_compare_chronologically() {
        let tour = doc(json!({"createdAt": "2024-03-01T10:00:00.500Z"}));
        assert!(FilterCondition::gte("createdAt", "2024-03-01").matches(&tour));
        assert!(FilterCondition::lt("createdAt", "2024-03-01T10:00:01Z").matches(&tour));
        assert!(!FilterCondition::gt("createdAt", "2024-03-02").matches(&tour));
    }

    #[test]
    fn test_missing_field_only_matches_not_equal() {
        let tour = doc(json!({"name": "The Forest Hiker"}));
        assert!(FilterCondition::ne("secretTour", true).matches(&tour));
        assert!(!FilterCondition::eq("secretTour", false).matches(&tour));
        assert!(!FilterCondition::gte("price", 0).matches(&tour));
    }

    #[test]
    fn test_array_fields_match_any_element() {
        let tour = doc(json!({"startDates": ["2021-04-25", "2021-07-20"], "images": ["a.jpg"]}));
        assert!(FilterCondition::gte("startDates", "2021-07-01").matches(&tour));
        assert!(FilterCondition::eq("images", "a.jpg").matches(&tour));
        assert!(!FilterCondition::ne("images", "a.jpg").matches(&tour));
        let wanted = vec![json!("b.jpg"), json!("a.jpg")];
        assert!(FilterCondition::in_list("images", wanted).matches(&tour));
    }

    #[test]
    fn test_membership() {
        let tour = doc(json!({"duration": 9}));
        assert!(FilterCondition::in_list("duration", vec![json!(5), json!(9)]).matches(&tour));
        assert!(!FilterCondition::in_list("duration", vec![json!(5), json!(7)]).matches(&tour));
    }

    #[test]
    fn test_dotted_lookup() {
        let tour = doc(json!({"startLocation": {"type": "Point", "coordinates": [-80.1, 25.7]}}));
        assert_eq!(lookup(&tour, "startLocation.type"), Some(&json!("Point")));
        assert_eq!(lookup(&tour, "startLocation.coordinates.1"), Some(&json!(25.7)));
        assert!(lookup(&tour, "startLocation.address").is_none());
    }

    #[test]
    fn test_sort_order_puts_missing_first() {
        assert_eq!(sort_order(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(sort_order(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(sort_order(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(sort_order(Some(&json!(1)), Some(&json!("1"))), Ordering::Less);
    }

    #[test]
    fn test_sort_order_is_transitive_across_dates_and_text() {
        let values = [
            json!("2021-04-25T09:00:00-05:00"),
            json!("2021-04-25T09:00:00X"),
            json!("2021-04-25T09:00:00Z"),
            json!("alpha"),
            json!("2020-01-01"),
        ];
        let mut sorted: Vec<&Value> = values.iter().collect();
        sorted.sort_by(|a, b| sort_order(Some(*a), Some(*b)));

        for (i, &a) in sorted.iter().enumerate() {
            for &b in &sorted[i + 1..] {
                assert_ne!(sort_order(Some(a), Some(b)), Ordering::Greater);
            }
        }
        assert_eq!(sorted[0], "2020-01-01");
        assert_eq!(sorted[1], "2021-04-25T09:00:00Z");
        assert_eq!(sorted[2], "2021-04-25T09:00:00-05:00");
        assert_eq!(sorted[3], "2021-04-25T09:00:00X");
    }
}
