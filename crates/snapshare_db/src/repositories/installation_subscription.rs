//! Repository for installation subscriptions
//!
//! A row exists for every (installation, user setting) pair that currently has
//! a live provider subscription.

use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};
use tracing::{debug, error};

use crate::error::DbError;
use crate::models::InstallationSubscription;
use crate::repositories::returned;

const COLUMNS: &str = "id, installation_id, user_setting_id, subscription_id";

fn from_row(row: &AnyRow) -> Result<InstallationSubscription, DbError> {
    Ok(InstallationSubscription {
        id: row.try_get("id")?,
        installation_id: row.try_get("installation_id")?,
        user_setting_id: row.try_get("user_setting_id")?,
        subscription_id: row.try_get("subscription_id")?,
    })
}

/// Insert the join row, or replace its subscription handle if the pair exists.
pub async fn upsert(
    conn: &mut AnyConnection,
    installation_id: i64,
    user_setting_id: i64,
    subscription_id: &str,
) -> Result<InstallationSubscription, DbError> {
    debug!(
        "Upserting subscription for installation {} and setting {}",
        installation_id, user_setting_id
    );

    let query = format!(
        r#"
        INSERT INTO installation_subscriptions (installation_id, user_setting_id, subscription_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (installation_id, user_setting_id)
        DO UPDATE SET subscription_id = excluded.subscription_id
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(installation_id)
        .bind(user_setting_id)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to upsert installation subscription: {}", e);
            DbError::from_query(e)
        })
        .map(returned)?
        .ok_or_else(|| DbError::QueryError("upsert returned no subscription".to_string()))?;

    from_row(&row)
}

/// Find the join row for an (installation, user setting) pair.
pub async fn find(
    conn: &mut AnyConnection,
    installation_id: i64,
    user_setting_id: i64,
) -> Result<Option<InstallationSubscription>, DbError> {
    let query = format!(
        "SELECT {COLUMNS} FROM installation_subscriptions \
         WHERE installation_id = $1 AND user_setting_id = $2"
    );

    let row = sqlx::query(&query)
        .bind(installation_id)
        .bind(user_setting_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    row.as_ref().map(from_row).transpose()
}

/// All join rows of one installation.
pub async fn find_by_installation(
    conn: &mut AnyConnection,
    installation_id: i64,
) -> Result<Vec<InstallationSubscription>, DbError> {
    let query = format!(
        "SELECT {COLUMNS} FROM installation_subscriptions WHERE installation_id = $1 ORDER BY id"
    );

    let rows = sqlx::query(&query)
        .bind(installation_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    rows.iter().map(from_row).collect()
}

/// Delete a join row by id. Returns `true` if a row was removed.
pub async fn delete(conn: &mut AnyConnection, id: i64) -> Result<bool, DbError> {
    debug!("Deleting installation subscription {}", id);

    let result = sqlx::query("DELETE FROM installation_subscriptions WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to delete installation subscription: {}", e);
            DbError::from_query(e)
        })?;

    Ok(result.rows_affected() > 0)
}
