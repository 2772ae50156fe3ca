//! Repository for user notification settings

use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};
use tracing::debug;

use crate::error::DbError;
use crate::models::{UserId, UserSetting};
use crate::repositories::returned;

const COLUMNS: &str = "id, user_id, key, push_enabled";

fn from_row(row: &AnyRow) -> Result<UserSetting, DbError> {
    let push_enabled: i64 = row.try_get("push_enabled")?;
    Ok(UserSetting {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        key: row.try_get("key")?,
        push_enabled: push_enabled != 0,
    })
}

/// Create a setting for a user.
pub async fn insert(
    conn: &mut AnyConnection,
    user_id: UserId,
    key: &str,
    push_enabled: bool,
) -> Result<UserSetting, DbError> {
    let query = format!(
        "INSERT INTO user_settings (user_id, key, push_enabled) VALUES ($1, $2, $3) \
         RETURNING {COLUMNS}"
    );

    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(key)
        .bind(i64::from(push_enabled))
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)
        .map(returned)?
        .ok_or_else(|| DbError::QueryError("insert returned no setting".to_string()))?;

    from_row(&row)
}

/// Find a setting by id.
pub async fn find_by_id(conn: &mut AnyConnection, id: i64) -> Result<Option<UserSetting>, DbError> {
    let query = format!("SELECT {COLUMNS} FROM user_settings WHERE id = $1");

    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    row.as_ref().map(from_row).transpose()
}

/// All settings of a user that have push delivery enabled.
pub async fn find_push_enabled_for_user(
    conn: &mut AnyConnection,
    user_id: UserId,
) -> Result<Vec<UserSetting>, DbError> {
    debug!("Finding push-enabled settings for user: {}", user_id);

    let query = format!(
        "SELECT {COLUMNS} FROM user_settings WHERE user_id = $1 AND push_enabled = 1 ORDER BY id"
    );

    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    rows.iter().map(from_row).collect()
}

/// Toggle push delivery for a setting.
pub async fn set_push_enabled(
    conn: &mut AnyConnection,
    id: i64,
    push_enabled: bool,
) -> Result<Option<UserSetting>, DbError> {
    let query =
        format!("UPDATE user_settings SET push_enabled = $1 WHERE id = $2 RETURNING {COLUMNS}");

    let row = sqlx::query(&query)
        .bind(i64::from(push_enabled))
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)
        .map(returned)?;

    row.as_ref().map(from_row).transpose()
}
