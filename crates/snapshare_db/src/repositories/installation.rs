//! Repository for installations
//!
//! Every function takes the connection to run on, so callers decide whether a
//! statement belongs to an open transaction (`&mut *tx`) or runs on its own
//! pooled connection in autocommit mode.

use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};
use tracing::{debug, error, info};

use crate::error::DbError;
use crate::repositories::{nullable, returned};
use crate::models::{
    decode_timestamp, encode_timestamp, Installation, NewInstallation, Platform, UserId,
};

const COLUMNS: &str = "id, user_id, platform, device_token, endpoint_id, app_version, timezone, \
                       locale, created_at, updated_at";

fn from_row(row: &AnyRow) -> Result<Installation, DbError> {
    let platform: String = row.try_get("platform")?;
    Ok(Installation {
        id: row.try_get("id")?,
        user_id: nullable(row, "user_id")?,
        platform: platform
            .parse::<Platform>()
            .map_err(|e| DbError::DecodeError(e.to_string()))?,
        device_token: row.try_get("device_token")?,
        endpoint_id: nullable(row, "endpoint_id")?,
        app_version: nullable(row, "app_version")?,
        timezone: nullable(row, "timezone")?,
        locale: nullable(row, "locale")?,
        created_at: decode_timestamp(nullable(row, "created_at")?),
        updated_at: decode_timestamp(nullable(row, "updated_at")?),
    })
}

/// Find the installation holding `device_token`, or failing that `old_device_token`.
///
/// When both tokens match different rows the row holding the current token wins.
pub async fn find_by_tokens(
    conn: &mut AnyConnection,
    device_token: &str,
    old_device_token: Option<&str>,
) -> Result<Option<Installation>, DbError> {
    debug!("Finding installation by device token");

    let query = format!(
        r#"
        SELECT {COLUMNS}
        FROM installations
        WHERE device_token = $1 OR device_token = $2
        ORDER BY CASE WHEN device_token = $1 THEN 0 ELSE 1 END
        LIMIT 1
        "#
    );

    let row = sqlx::query(&query)
        .bind(device_token)
        .bind(old_device_token)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to find installation: {}", e);
            DbError::from_query(e)
        })?;

    row.as_ref().map(from_row).transpose()
}

/// Find the installation currently holding `device_token`.
pub async fn find_by_token(
    conn: &mut AnyConnection,
    device_token: &str,
) -> Result<Option<Installation>, DbError> {
    find_by_tokens(conn, device_token, None).await
}

/// Find an installation by id.
pub async fn find_by_id(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<Installation>, DbError> {
    let query = format!("SELECT {COLUMNS} FROM installations WHERE id = $1");

    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    row.as_ref().map(from_row).transpose()
}

/// Find all installations owned by a user, oldest first.
pub async fn find_by_user(
    conn: &mut AnyConnection,
    user_id: UserId,
) -> Result<Vec<Installation>, DbError> {
    debug!("Finding installations for user: {}", user_id);

    let query = format!("SELECT {COLUMNS} FROM installations WHERE user_id = $1 ORDER BY id");

    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    rows.iter().map(from_row).collect()
}

/// Insert a new installation.
///
/// A second row for the same `device_token` is rejected with
/// `DbError::ConstraintViolation`.
pub async fn insert(
    conn: &mut AnyConnection,
    new: &NewInstallation,
) -> Result<Installation, DbError> {
    debug!("Inserting installation on platform {}", new.platform);

    let now = encode_timestamp(Utc::now());
    let query = format!(
        r#"
        INSERT INTO installations
            (user_id, platform, device_token, endpoint_id, app_version, timezone, locale,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(new.user_id)
        .bind(new.platform.as_str())
        .bind(&new.device_token)
        .bind(new.endpoint_id.as_deref())
        .bind(new.app_version.as_deref())
        .bind(new.timezone.as_deref())
        .bind(new.locale.as_deref())
        .bind(&now)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to insert installation: {}", e);
            DbError::from_query(e)
        })
        .map(returned)?
        .ok_or_else(|| DbError::QueryError("insert returned no installation".to_string()))?;

    let inserted = from_row(&row)?;
    info!("Installation {} created", inserted.id);
    Ok(inserted)
}

/// Write every mutable column of `installation` back to its row.
pub async fn update(
    conn: &mut AnyConnection,
    installation: &Installation,
) -> Result<Installation, DbError> {
    debug!("Updating installation {}", installation.id);

    let now = encode_timestamp(Utc::now());
    let query = format!(
        r#"
        UPDATE installations
        SET user_id = $1, platform = $2, device_token = $3, endpoint_id = $4,
            app_version = $5, timezone = $6, locale = $7, updated_at = $8
        WHERE id = $9
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(installation.user_id)
        .bind(installation.platform.as_str())
        .bind(&installation.device_token)
        .bind(installation.endpoint_id.as_deref())
        .bind(installation.app_version.as_deref())
        .bind(installation.timezone.as_deref())
        .bind(installation.locale.as_deref())
        .bind(&now)
        .bind(installation.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to update installation: {}", e);
            DbError::from_query(e)
        })
        .map(returned)?
        .ok_or_else(|| DbError::QueryError(format!("installation {} vanished", installation.id)))?;

    from_row(&row)
}

/// Point the installation holding `device_token` at a new endpoint.
pub async fn set_endpoint_for_token(
    conn: &mut AnyConnection,
    device_token: &str,
    endpoint_id: &str,
) -> Result<Option<Installation>, DbError> {
    let now = encode_timestamp(Utc::now());
    let query = format!(
        r#"
        UPDATE installations
        SET endpoint_id = $1, updated_at = $2
        WHERE device_token = $3
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(endpoint_id)
        .bind(&now)
        .bind(device_token)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)
        .map(returned)?;

    row.as_ref().map(from_row).transpose()
}

/// Change (or clear) the owner of an installation.
pub async fn set_user(
    conn: &mut AnyConnection,
    id: i64,
    user_id: Option<UserId>,
) -> Result<Option<Installation>, DbError> {
    let now = encode_timestamp(Utc::now());
    let query = format!(
        r#"
        UPDATE installations
        SET user_id = $1, updated_at = $2
        WHERE id = $3
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(&now)
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)
        .map(returned)?;

    row.as_ref().map(from_row).transpose()
}
