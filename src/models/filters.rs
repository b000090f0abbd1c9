//! Filter and sort descriptors.
//!
//! K_i: These are pure values. Their only job is to render the query tokens
//! the records endpoint understands.

use super::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response status a record view can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatusFilter {
    Draft,
    /// Records without any response yet
    Pending,
    Submitted,
    Discarded,
}

impl ResponseStatusFilter {
    /// Canonical token used in the query string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for ResponseStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseStatusFilter {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "discarded" => Ok(Self::Discarded),
            other => Err(FeedbackError::validation(format!(
                "Unknown response status `{other}`, expected one of: draft, pending, submitted, \
                 discarded"
            ))),
        }
    }
}

/// Predicate over a named metadata property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataFilter {
    Terms {
        name: String,
        values: Vec<String>,
    },
    Integer {
        name: String,
        ge: Option<i64>,
        le: Option<i64>,
    },
    Float {
        name: String,
        ge: Option<f64>,
        le: Option<f64>,
    },
}

impl MetadataFilter {
    /// Terms filter, requires at least one value.
    pub fn terms<I, S>(name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(FeedbackError::validation(format!(
                "Terms filter on `{name}` needs at least one value"
            )));
        }
        Ok(Self::Terms { name, values })
    }

    /// Integer range filter, inclusive on both ends.
    pub fn integer(name: impl Into<String>, ge: Option<i64>, le: Option<i64>) -> Result<Self> {
        let name = name.into();
        check_bounds(&name, ge, le)?;
        Ok(Self::Integer { name, ge, le })
    }

    /// Float range filter, inclusive on both ends.
    pub fn float(name: impl Into<String>, ge: Option<f64>, le: Option<f64>) -> Result<Self> {
        let name = name.into();
        if let Some(bound) = [ge, le].into_iter().flatten().find(|v| !v.is_finite()) {
            return Err(FeedbackError::validation(format!(
                "Range filter on `{name}` has a non-finite bound ({bound})"
            )));
        }
        check_bounds(&name, ge, le)?;
        Ok(Self::Float { name, ge, le })
    }

    /// Name of the metadata property this filter reads.
    pub fn name(&self) -> &str {
        match self {
            Self::Terms { name, .. } | Self::Integer { name, .. } | Self::Float { name, .. } => {
                name
            }
        }
    }

    /// Query fragment, e.g. `genre:rock,jazz` or `length:{"ge": 1, "le": 5}`.
    pub fn query_string(&self) -> String {
        match self {
            Self::Terms { name, values } => format!("{name}:{}", values.join(",")),
            Self::Integer { name, ge, le } => format!(
                "{name}:{}",
                range_json(ge.map(|v| v.to_string()), le.map(|v| v.to_string()))
            ),
            // Debug keeps the trailing `.0` so whole floats stay floats on the wire.
            Self::Float { name, ge, le } => format!(
                "{name}:{}",
                range_json(ge.map(|v| format!("{v:?}")), le.map(|v| format!("{v:?}")))
            ),
        }
    }
}

fn check_bounds<T>(name: &str, ge: Option<T>, le: Option<T>) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    match (ge, le) {
        (None, None) => Err(FeedbackError::validation(format!(
            "Range filter on `{name}` needs at least one of `ge` or `le`"
        ))),
        (Some(ge), Some(le)) if ge > le => Err(FeedbackError::validation(format!(
            "Range filter on `{name}` has `ge` ({ge}) greater than `le` ({le})"
        ))),
        _ => Ok(()),
    }
}

fn range_json(ge: Option<String>, le: Option<String>) -> String {
    let parts: Vec<String> = [("ge", ge), ("le", le)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("\"{key}\": {v}")))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

const METADATA_PREFIX: &str = "metadata.";
const SORTABLE_RECORD_FIELDS: [&str; 2] = ["inserted_at", "updated_at"];

/// One sort key. Position in a list defines tie-break precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSortBy")]
pub struct SortBy {
    field: String,
    order: SortOrder,
}

#[derive(Deserialize)]
struct RawSortBy {
    field: String,
    #[serde(default)]
    order: SortOrder,
}

impl TryFrom<RawSortBy> for SortBy {
    type Error = FeedbackError;

    fn try_from(raw: RawSortBy) -> Result<Self> {
        Self::new(raw.field, raw.order)
    }
}

impl SortBy {
    /// Sort key over `inserted_at`, `updated_at`, or `metadata.<name>`.
    pub fn new(field: impl Into<String>, order: SortOrder) -> Result<Self> {
        let field = field.into();
        let is_metadata = field
            .strip_prefix(METADATA_PREFIX)
            .is_some_and(|name| !name.is_empty());
        if !is_metadata && !SORTABLE_RECORD_FIELDS.contains(&field.as_str()) {
            return Err(FeedbackError::validation(format!(
                "Cannot sort by `{field}`: expected `inserted_at`, `updated_at` or \
                 `metadata.<name>`"
            )));
        }
        Ok(Self { field, order })
    }

    /// Sort by a metadata property.
    pub fn metadata(name: &str, order: SortOrder) -> Result<Self> {
        Self::new(format!("{METADATA_PREFIX}{name}"), order)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn is_metadata_field(&self) -> bool {
        self.metadata_name().is_some()
    }

    /// Metadata property name for `metadata.<name>` keys.
    pub fn metadata_name(&self) -> Option<&str> {
        self.field
            .strip_prefix(METADATA_PREFIX)
            .filter(|name| !name.is_empty())
    }

    /// Query token `<field>:<order>`.
    pub fn query_string(&self) -> String {
        format!("{}:{}", self.field, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tokens() {
        assert_eq!(ResponseStatusFilter::Submitted.to_string(), "submitted");
        assert_eq!(ResponseStatusFilter::Discarded.as_str(), "discarded");
        assert_eq!(
            "pending".parse::<ResponseStatusFilter>().unwrap(),
            ResponseStatusFilter::Pending
        );
        assert!("done".parse::<ResponseStatusFilter>().is_err());
    }

    #[test]
    fn test_terms_query_string() {
        let filter = MetadataFilter::terms("genre", ["rock", "jazz"]).unwrap();
        assert_eq!(filter.query_string(), "genre:rock,jazz");
        assert_eq!(filter.name(), "genre");
        assert!(MetadataFilter::terms("genre", Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_integer_query_string() {
        let both = MetadataFilter::integer("length", Some(1), Some(5)).unwrap();
        assert_eq!(both.query_string(), r#"length:{"ge": 1, "le": 5}"#);

        let upper = MetadataFilter::integer("length", None, Some(5)).unwrap();
        assert_eq!(upper.query_string(), r#"length:{"le": 5}"#);
    }

    #[test]
    fn test_float_query_string_keeps_decimal() {
        let filter = MetadataFilter::float("score", Some(1.0), Some(2.5)).unwrap();
        assert_eq!(filter.query_string(), r#"score:{"ge": 1.0, "le": 2.5}"#);
    }

    #[test]
    fn test_range_bounds_validated() {
        assert!(MetadataFilter::integer("length", None, None).is_err());
        assert!(MetadataFilter::float("score", Some(3.0), Some(1.0)).is_err());
        assert!(MetadataFilter::integer("length", Some(2), Some(2)).is_ok());
    }

    #[test]
    fn test_float_rejects_non_finite_bounds() {
        let nan = MetadataFilter::float("score", Some(f64::NAN), None).unwrap_err();
        assert!(matches!(nan, FeedbackError::Validation(_)));
        assert!(MetadataFilter::float("score", None, Some(f64::INFINITY)).is_err());
        assert!(MetadataFilter::float("score", Some(f64::NEG_INFINITY), Some(1.0)).is_err());
    }

    #[test]
    fn test_sort_by() {
        let sort = SortBy::metadata("length", SortOrder::Desc).unwrap();
        assert!(sort.is_metadata_field());
        assert_eq!(sort.metadata_name(), Some("length"));
        assert_eq!(sort.query_string(), "metadata.length:desc");

        let inserted = SortBy::new("inserted_at", SortOrder::Asc).unwrap();
        assert!(!inserted.is_metadata_field());
        assert_eq!(inserted.query_string(), "inserted_at:asc");

        assert!(SortBy::new("text", SortOrder::Asc).is_err());
        assert!(SortBy::new("metadata.", SortOrder::Asc).is_err());
    }

    #[test]
    fn test_sort_by_deserialize_is_validated() {
        let sort: SortBy = serde_json::from_str(r#"{"field": "metadata.year"}"#).unwrap();
        assert_eq!(sort.field(), "metadata.year");
        assert_eq!(sort.order(), SortOrder::Asc);
        assert_eq!(sort.metadata_name(), Some("year"));

        assert!(serde_json::from_str::<SortBy>(r#"{"field": "metadata."}"#).is_err());
        assert!(serde_json::from_str::<SortBy>(r#"{"field": "text", "order": "desc"}"#).is_err());
    }
}
