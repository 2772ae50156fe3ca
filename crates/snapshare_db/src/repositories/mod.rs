//! Repository modules for database access
//!
//! This module contains the query functions for the installation tables.
//!
//! Statements with a `RETURNING` clause are read with `fetch_all` so SQLite
//! runs them to completion. A partially stepped write keeps its lock and, on
//! an autocommit connection, is not committed when the call returns.

use sqlx::any::AnyRow;
use sqlx::{Any, Decode, Row, Type, TypeInfo, ValueRef};

use crate::error::DbError;

pub mod installation;
pub mod installation_subscription;
pub mod user_setting;

/// Decode a nullable column.
///
/// The `Any` driver reports SQL NULL as a type of its own that no Rust type
/// is compatible with, so `try_get::<Option<T>>` cannot be used directly.
pub(crate) fn nullable<'r, T>(row: &'r AnyRow, column: &str) -> Result<Option<T>, DbError>
where
    T: Decode<'r, Any> + Type<Any>,
{
    let raw = row.try_get_raw(column)?;
    if raw.is_null() || raw.type_info().is_null() {
        return Ok(None);
    }
    Ok(Some(row.try_get::<T, _>(column)?))
}

/// The single row a `RETURNING` statement produced, if any.
pub(crate) fn returned(rows: Vec<AnyRow>) -> Option<AnyRow> {
    rows.into_iter().next()
}
