//! Dynamic book filter composition.
//!
//! [`build_filter`] turns an arbitrary subset of optional search criteria into
//! one conjunctive predicate plus the ordered list of values to bind. Column
//! names come from the closed [`FilterField`] enum and every caller-supplied
//! value travels as a bound parameter, so the rendered SQL text never contains
//! user input.
//!
//! ```
//! use shelf_core::filter::{build_filter, FilterCriteria, FilterParam};
//!
//! let criteria = FilterCriteria {
//!     title: Some("dune".into()),
//!     genre: Some("Fiction".into()),
//!     ..Default::default()
//! };
//! let query = build_filter(&criteria).unwrap();
//! assert_eq!(
//!     query.to_sql(),
//!     r"title ILIKE $1 ESCAPE '\' AND genre ILIKE $2 ESCAPE '\'"
//! );
//! assert_eq!(query.params()[0], FilterParam::Text("%dune%".into()));
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::error::ValidationError;

/// Date layouts accepted for the publication date criterion.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Escape character declared in every `ILIKE` clause.
const LIKE_ESCAPE: char = '\\';

/// Optional search criteria, as received from a caller.
///
/// Absent or blank fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Fragment of the book identifier's decimal text
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Fragment of the ISBN code
    #[serde(default)]
    pub isbn: Option<String>,
    /// Exact publication date, `YYYY-MM-DD` or `DD/MM/YYYY`
    #[serde(default)]
    pub published_on: Option<String>,
}

impl FilterCriteria {
    /// True when no field carries a constraint.
    pub fn is_empty(&self) -> bool {
        [
            &self.id,
            &self.title,
            &self.author,
            &self.genre,
            &self.isbn,
            &self.published_on,
        ]
        .iter()
        .all(|field| present(field).is_none())
    }
}

/// Filterable book attribute. The declaration order is the parameter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Id,
    Title,
    Author,
    Genre,
    Isbn,
    PublishedOn,
}

impl FilterField {
    /// Column expression in the `books` table.
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "CAST(id AS TEXT)",
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::Isbn => "isbn",
            Self::PublishedOn => "published_on",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::Isbn => "isbn",
            Self::PublishedOn => "published_on",
        }
    }
}

/// Comparison applied by a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Case-insensitive substring match.
    Contains,
    /// Exact equality.
    Equals,
}

/// One bound value, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterParam {
    /// `ILIKE` pattern: escaped needle wrapped in `%` wildcards.
    Text(String),
    Date(NaiveDate),
}

/// A single `field op value` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: FilterField,
    pub op: FilterOp,
    /// Raw value, used for in-memory evaluation.
    value: ClauseValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClauseValue {
    /// Lowercased needle
    Text(String),
    Date(NaiveDate),
}

/// Conjunction of clauses with their bound parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    clauses: Vec<FilterClause>,
    params: Vec<FilterParam>,
}

impl FilterQuery {
    /// Predicate matching every book.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Bound values, in the exact order of the `$n` placeholders.
    pub fn params(&self) -> &[FilterParam] {
        &self.params
    }

    pub fn is_unrestricted(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render the WHERE body with placeholders starting at `$1`.
    pub fn to_sql(&self) -> String {
        self.to_sql_from(1)
    }

    /// Render the WHERE body with placeholders starting at `$first`, for
    /// queries that bind other values before the filter.
    pub fn to_sql_from(&self, first: usize) -> String {
        if self.clauses.is_empty() {
            return "TRUE".to_string();
        }

        self.clauses
            .iter()
            .enumerate()
            .map(|(i, clause)| {
                let n = first + i;
                match clause.op {
                    FilterOp::Contains => format!(
                        "{} ILIKE ${} ESCAPE '{}'",
                        clause.field.column(),
                        n,
                        LIKE_ESCAPE
                    ),
                    FilterOp::Equals => format!("{} = ${}", clause.field.column(), n),
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Evaluate the predicate against a book without a database.
    pub fn matches(&self, book: &Book) -> bool {
        self.clauses.iter().all(|clause| clause.matches(book))
    }

    fn push(&mut self, field: FilterField, op: FilterOp, value: ClauseValue, param: FilterParam) {
        self.clauses.push(FilterClause { field, op, value });
        self.params.push(param);
    }
}

impl FilterClause {
    fn matches(&self, book: &Book) -> bool {
        match (&self.value, self.field) {
            (ClauseValue::Date(date), FilterField::PublishedOn) => {
                book.published_on.as_ref() == Some(date)
            }
            (ClauseValue::Text(needle), field) => {
                let haystack = match field {
                    FilterField::Id => book.id.to_string(),
                    FilterField::Title => book.title.to_lowercase(),
                    FilterField::Author => book.author.to_lowercase(),
                    FilterField::Genre => book.genre.to_lowercase(),
                    // NULL never matches ILIKE
                    FilterField::Isbn => match &book.isbn {
                        Some(isbn) => isbn.to_lowercase(),
                        None => return false,
                    },
                    FilterField::PublishedOn => return false,
                };
                haystack.contains(needle.as_str())
            }
            (ClauseValue::Date(_), _) => false,
        }
    }
}

/// Compose the predicate for `criteria`.
///
/// Clauses appear in the fixed order id, title, author, genre, isbn,
/// publication date, skipping absent fields. Fails only on an unparseable
/// date.
pub fn build_filter(criteria: &FilterCriteria) -> Result<FilterQuery, ValidationError> {
    let mut query = FilterQuery::default();

    let text_fields = [
        (FilterField::Id, &criteria.id),
        (FilterField::Title, &criteria.title),
        (FilterField::Author, &criteria.author),
        (FilterField::Genre, &criteria.genre),
        (FilterField::Isbn, &criteria.isbn),
    ];

    for (field, value) in text_fields {
        if let Some(needle) = present(value) {
            query.push(
                field,
                FilterOp::Contains,
                ClauseValue::Text(needle.to_lowercase()),
                FilterParam::Text(contains_pattern(needle)),
            );
        }
    }

    if let Some(raw) = present(&criteria.published_on) {
        let date = parse_date(raw)?;
        query.push(
            FilterField::PublishedOn,
            FilterOp::Equals,
            ClauseValue::Date(date),
            FilterParam::Date(date),
        );
    }

    tracing::debug!(
        clauses = query.clauses.len(),
        predicate = %query.to_sql(),
        "Built book filter"
    );
    Ok(query)
}

/// Parse a publication date in one of the accepted layouts.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .ok_or_else(|| {
            ValidationError::new(
                FilterField::PublishedOn.name(),
                format!("'{raw}' is not a valid date (expected YYYY-MM-DD or DD/MM/YYYY)"),
            )
        })
}

/// Wrap an escaped needle as a substring pattern.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// A field counts as present when it holds non-whitespace text.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}
