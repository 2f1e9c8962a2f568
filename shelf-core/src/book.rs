//! Book records and their invariants.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier assigned by the book store on creation.
pub type BookId = i64;

/// Required length of an ISBN-13 code.
pub const ISBN_LEN: usize = 13;

/// Check that `isbn` has exactly [`ISBN_LEN`] characters.
pub fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    let len = isbn.chars().count();
    if len != ISBN_LEN {
        return Err(ValidationError::new(
            "isbn",
            format!("ISBN must contain {ISBN_LEN} characters, got {len}"),
        ));
    }
    Ok(())
}

/// A cataloged book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
    pub isbn: Option<String>,
    pub published_on: Option<NaiveDate>,
    pub included_on: NaiveDate,
}

/// Payload for inserting a book. Also used as the full replacement for an
/// update, since every mutable field is rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub publisher: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub published_on: Option<NaiveDate>,
}

pub type BookUpdate = NewBook;

impl NewBook {
    /// Trim text fields and drop a blank ISBN.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self.publisher = self.publisher.trim().to_string();
        self.isbn = self
            .isbn
            .map(|isbn| isbn.trim().to_string())
            .filter(|isbn| !isbn.is_empty());
        self
    }

    /// Check the invariants of a persisted record.
    ///
    /// The genre label is free text and is kept verbatim, since genre
    /// equality drives the similarity graph.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "title is required"));
        }
        if self.author.trim().is_empty() {
            return Err(ValidationError::new("author", "author is required"));
        }
        if self.publisher.trim().is_empty() {
            return Err(ValidationError::new("publisher", "publisher is required"));
        }
        if let Some(isbn) = &self.isbn {
            validate_isbn(isbn)?;
        }
        Ok(())
    }

    /// Materialize a stored record.
    pub fn into_book(self, id: BookId, included_on: NaiveDate) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            publisher: self.publisher,
            genre: self.genre,
            isbn: self.isbn,
            published_on: self.published_on,
            included_on,
        }
    }
}

impl Book {
    /// Overwrite the mutable fields, keeping `id` and `included_on`.
    pub fn apply(&mut self, update: BookUpdate) {
        self.title = update.title;
        self.author = update.author;
        self.publisher = update.publisher;
        self.genre = update.genre;
        self.isbn = update.isbn;
        self.published_on = update.published_on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewBook {
        NewBook {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            publisher: "Chilton".into(),
            genre: "Science Fiction".into(),
            isbn: Some("9780441172719".into()),
            published_on: NaiveDate::from_ymd_opt(1965, 8, 1),
        }
    }

    #[test]
    fn test_valid_book_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_isbn_is_allowed() {
        let book = NewBook {
            isbn: None,
            ..valid()
        };
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_blank_required_fields_rejected() {
        let err = NewBook {
            title: "   ".into(),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "title");

        let err = NewBook {
            author: String::new(),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "author");

        let err = NewBook {
            publisher: "\t".into(),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "publisher");
    }

    #[test]
    fn test_isbn_length_enforced() {
        let err = NewBook {
            isbn: Some("978044117271".into()),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "isbn");
        assert!(err.message.contains("got 12"));
    }

    #[test]
    fn test_normalized_drops_blank_isbn_and_keeps_genre() {
        let book = NewBook {
            title: "  Dune ".into(),
            genre: " Science Fiction ".into(),
            isbn: Some("  ".into()),
            ..valid()
        }
        .normalized();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.isbn, None);
        assert_eq!(book.genre, " Science Fiction ");
    }

    #[test]
    fn test_apply_keeps_identity() {
        let included = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut book = valid().into_book(7, included);
        book.apply(NewBook {
            title: "Dune Messiah".into(),
            ..valid()
        });
        assert_eq!(book.id, 7);
        assert_eq!(book.included_on, included);
        assert_eq!(book.title, "Dune Messiah");
    }
}
