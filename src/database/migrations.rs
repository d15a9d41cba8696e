use crate::error::AppError;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;
use tracing::{info, instrument};

use super::schema::CURRENT_SCHEMA;

/// Columns added to `orders` after the first release. Databases created from
/// the original single-table layout gain them here without losing rows.
const ORDER_COLUMN_UPGRADES: &[(&str, &str)] = &[
    ("order_date", "TEXT"),
    ("paid_date", "TEXT"),
    ("event", "TEXT"),
];

/// Idempotent schema bootstrap: creates missing tables, adds columns that
/// newer releases introduced, and backfills `order_date` on legacy rows.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Ensuring database schema");

    sqlx::raw_sql(CURRENT_SCHEMA).execute(pool).await?;

    let existing = table_columns(pool, "orders").await?;
    for (column, column_type) in ORDER_COLUMN_UPGRADES {
        if !existing.contains(*column) {
            info!(column = %column, "Adding missing column to orders");
            let alter = format!("ALTER TABLE orders ADD COLUMN {} {}", column, column_type);
            sqlx::query(&alter).execute(pool).await?;
        }
    }

    let today = Utc::now().date_naive();
    let backfilled = sqlx::query("UPDATE orders SET order_date = ? WHERE order_date IS NULL")
        .bind(today)
        .execute(pool)
        .await?;

    if backfilled.rows_affected() > 0 {
        info!(
            rows = backfilled.rows_affected(),
            "Backfilled order_date on legacy orders"
        );
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn table_columns(pool: &Pool<Sqlite>, table: &str) -> Result<HashSet<String>, AppError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
}
