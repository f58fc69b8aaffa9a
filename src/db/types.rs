//! Shared type definitions for the database layer.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Failed to encode column: {0}")]
    Encode(#[from] serde_json::Error),
}

// Column codecs. Dates are stored as ISO text, times as HH:MM, list-valued
// fields as JSON text.

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn opt_date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(date_to_sql)
}

pub(crate) fn time_to_sql(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub(crate) fn json_to_sql<T: Serialize>(value: &T) -> Result<String, DbError> {
    Ok(serde_json::to_string(value)?)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn date_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_date_from_row(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.is_empty() => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        _ => Ok(None),
    }
}

pub(crate) fn time_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    crate::types::parse_hhmm(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_time_from_row(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<NaiveTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.is_empty() => crate::types::parse_hhmm(&s)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        _ => Ok(None),
    }
}

pub(crate) fn timestamp_from_row(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn json_from_row<T: DeserializeOwned + Default>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.trim().is_empty() => {
            serde_json::from_str(&s).map_err(|e| conversion_error(idx, e))
        }
        _ => Ok(T::default()),
    }
}

/// Parse an enum column through its `FromStr` impl.
pub(crate) fn enum_from_row<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.is_empty() => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| conversion_error(idx, ColumnValueError(e))),
        _ => Ok(None),
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct ColumnValueError(String);
