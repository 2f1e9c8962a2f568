//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and cron jobs to handle errors appropriately.

use shelf_core::{CatalogError, LookupError, RecomputeError, StoreError, ValidationError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all, including unknown books).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (missing database URL).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (unparseable date, malformed ISBN, duplicate ISBN).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Service unavailable (database or metadata service unreachable).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Temporary failure (a recompute pass is already running or timed out).
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TEMP_FAILURE: i32 = 75;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first library error in the chain, then by message
        let code = err
            .chain()
            .find_map(classify)
            .unwrap_or_else(|| {
                if message.contains("DATABASE_URL") {
                    USAGE_ERROR
                } else {
                    GENERAL_ERROR
                }
            });

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify(cause: &(dyn std::error::Error + 'static)) -> Option<i32> {
    if let Some(e) = cause.downcast_ref::<CatalogError>() {
        return Some(match e {
            CatalogError::Validation(_) => DATA_ERROR,
            CatalogError::Store(e) => store_code(e),
            CatalogError::Recompute(e) => recompute_code(e),
            CatalogError::Lookup(e) => lookup_code(e),
        });
    }
    if cause.downcast_ref::<ValidationError>().is_some() {
        return Some(DATA_ERROR);
    }
    if let Some(e) = cause.downcast_ref::<RecomputeError>() {
        return Some(recompute_code(e));
    }
    if let Some(e) = cause.downcast_ref::<StoreError>() {
        return Some(store_code(e));
    }
    cause.downcast_ref::<LookupError>().map(lookup_code)
}

fn store_code(e: &StoreError) -> i32 {
    match e {
        StoreError::Conflict(_) => DATA_ERROR,
        StoreError::Connection(_) => UNAVAILABLE,
        _ => GENERAL_ERROR,
    }
}

fn recompute_code(e: &RecomputeError) -> i32 {
    match e {
        RecomputeError::AlreadyRunning | RecomputeError::TimedOut(_) => TEMP_FAILURE,
        RecomputeError::Failed { source, .. } => store_code(source),
    }
}

fn lookup_code(e: &LookupError) -> i32 {
    match e {
        LookupError::NotFound(_) => GENERAL_ERROR,
        _ => UNAVAILABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::time::Duration;

    fn code_of(err: anyhow::Error) -> i32 {
        ExitCode::from_anyhow(&err).code
    }

    #[test]
    fn test_validation_is_data_error() {
        let err: anyhow::Error = ValidationError::new("published_on", "bad").into();
        assert_eq!(code_of(err), DATA_ERROR);
    }

    #[test]
    fn test_context_does_not_hide_cause() {
        let result: Result<(), StoreError> = Err(StoreError::Connection("refused".into()));
        let err = result.context("Failed to open catalog").unwrap_err();
        assert_eq!(code_of(err), UNAVAILABLE);
    }

    #[test]
    fn test_recompute_contention_is_temporary() {
        let err: anyhow::Error =
            CatalogError::from(RecomputeError::TimedOut(Duration::from_secs(1))).into();
        assert_eq!(code_of(err), TEMP_FAILURE);
        assert_eq!(code_of(RecomputeError::AlreadyRunning.into()), TEMP_FAILURE);
    }

    #[test]
    fn test_missing_database_url_is_usage() {
        let err = anyhow::anyhow!("DATABASE_URL is not set; pass --database-url");
        assert_eq!(code_of(err), USAGE_ERROR);
    }

    #[test]
    fn test_success() {
        let ok = ExitCode::success();
        assert_eq!(ok.code, SUCCESS);
        assert!(ok.message.is_none());
    }
}
