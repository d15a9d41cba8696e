use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{Client, DbOrder, Event, Order},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

const ORDER_COLUMNS: &str =
    "id, name, drink, quantity, price_sum, paid, order_date, paid_date, event";

// ---------------------------------------------------------------------------
// Clients

#[instrument(skip(pool))]
pub async fn get_clients(pool: &Pool<Sqlite>) -> Result<Vec<Client>, AppError> {
    info!("Fetching clients");
    let clients = sqlx::query_as::<_, Client>("SELECT id, name, phone FROM clients ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(clients)
}

#[instrument(skip(pool))]
pub async fn get_client_by_name(
    pool: &Pool<Sqlite>,
    name: &str,
) -> Result<Option<Client>, AppError> {
    let client = sqlx::query_as::<_, Client>("SELECT id, name, phone FROM clients WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(client)
}

#[instrument(skip(pool))]
pub async fn create_client(
    pool: &Pool<Sqlite>,
    name: &str,
    phone: &str,
) -> Result<i64, AppError> {
    info!("Creating new client");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM clients WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Client '{}' already exists",
            name
        )));
    }

    let res = sqlx::query("INSERT INTO clients (name, phone) VALUES (?, ?)")
        .bind(name)
        .bind(phone)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Order ledger

#[instrument(skip(pool))]
pub async fn list_orders(
    pool: &Pool<Sqlite>,
    paid: Option<bool>,
) -> Result<Vec<Order>, AppError> {
    info!("Listing orders");

    let rows = match paid {
        Some(paid) => {
            let query = format!(
                "SELECT {} FROM orders WHERE paid = ? ORDER BY id DESC",
                ORDER_COLUMNS
            );
            sqlx::query_as::<_, DbOrder>(&query)
                .bind(paid)
                .fetch_all(pool)
                .await?
        }
        None => {
            let query = format!("SELECT {} FROM orders ORDER BY id DESC", ORDER_COLUMNS);
            sqlx::query_as::<_, DbOrder>(&query).fetch_all(pool).await?
        }
    };

    Ok(rows.into_iter().map(Order::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_orders_for_client(
    pool: &Pool<Sqlite>,
    name: &str,
) -> Result<Vec<Order>, AppError> {
    info!("Fetching orders for client");
    let query = format!(
        "SELECT {} FROM orders WHERE name = ? ORDER BY order_date DESC, id DESC",
        ORDER_COLUMNS
    );
    let rows = sqlx::query_as::<_, DbOrder>(&query)
        .bind(name)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Order::from).collect())
}

/// Returns the label of an event scheduled on `date`, if any. When several
/// events share a date the earliest-created one wins.
#[instrument(skip(pool))]
pub async fn event_on(pool: &Pool<Sqlite>, date: NaiveDate) -> Result<Option<String>, AppError> {
    let event = sqlx::query_scalar::<_, String>(
        "SELECT event_name FROM events WHERE event_date = ? ORDER BY id LIMIT 1",
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(event)
}

/// Inserts an unpaid order dated today, stamped with today's event label when
/// one exists. `price_sum` is the caller's quantity x unit-price snapshot and
/// is stored as-is.
#[instrument(skip(pool))]
pub async fn create_order(
    pool: &Pool<Sqlite>,
    name: &str,
    drink: &str,
    quantity: i64,
    price_sum: f64,
) -> Result<(i64, Option<String>), AppError> {
    info!("Creating order");

    let order_date = Utc::now().date_naive();
    let event = event_on(pool, order_date).await?;

    let res = sqlx::query(
        "INSERT INTO orders (name, drink, quantity, price_sum, paid, order_date, event)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(drink)
    .bind(quantity)
    .bind(price_sum)
    .bind(false)
    .bind(order_date)
    .bind(&event)
    .execute(pool)
    .await?;

    if let Some(event_name) = &event {
        info!(event = %event_name, "Order stamped with event");
    }

    Ok((res.last_insert_rowid(), event))
}

#[instrument(skip(pool))]
pub async fn delete_order(pool: &Pool<Sqlite>, id: i64) -> Result<u64, AppError> {
    info!("Deleting order");

    let res = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Order with id {} not found", id)));
    }

    Ok(res.rows_affected())
}

/// Bulk settle: stamps every currently-unpaid order paid as of today.
/// One-way transition; nothing exposed ever flips paid back to unpaid.
#[instrument(skip(pool))]
pub async fn settle_unpaid_orders(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Settling unpaid orders");

    let paid_date = Utc::now().date_naive();
    let res = sqlx::query("UPDATE orders SET paid = TRUE, paid_date = ? WHERE paid = FALSE")
        .bind(paid_date)
        .execute(pool)
        .await?;

    Ok(res.rows_affected())
}

/// Payout variant of the settle: snapshot and settle run inside one
/// transaction, so the returned rows are exactly the rows that were marked
/// paid. Orders created concurrently land in the next payout.
#[instrument(skip(pool))]
pub async fn settle_with_snapshot(
    pool: &Pool<Sqlite>,
) -> Result<(Vec<Order>, u64, NaiveDate), AppError> {
    info!("Settling unpaid orders with snapshot");

    let paid_date = Utc::now().date_naive();
    let mut tx = pool.begin().await?;

    let query = format!(
        "SELECT {} FROM orders WHERE paid = FALSE ORDER BY id DESC",
        ORDER_COLUMNS
    );
    let rows = sqlx::query_as::<_, DbOrder>(&query)
        .fetch_all(&mut *tx)
        .await?;

    let res = sqlx::query("UPDATE orders SET paid = TRUE, paid_date = ? WHERE paid = FALSE")
        .bind(paid_date)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(settled = res.rows_affected(), "Ledger settled");
    Ok((
        rows.into_iter().map(Order::from).collect(),
        res.rows_affected(),
        paid_date,
    ))
}

// ---------------------------------------------------------------------------
// Events

#[instrument(skip(pool))]
pub async fn list_events(pool: &Pool<Sqlite>) -> Result<Vec<Event>, AppError> {
    info!("Listing events");
    let events = sqlx::query_as::<_, Event>(
        "SELECT id, event_name, event_date, created_at FROM events ORDER BY event_date DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(events)
}

#[instrument(skip(pool))]
pub async fn create_event(
    pool: &Pool<Sqlite>,
    event_name: &str,
    event_date: NaiveDate,
) -> Result<i64, AppError> {
    info!("Creating event");

    let res = sqlx::query("INSERT INTO events (event_name, event_date) VALUES (?, ?)")
        .bind(event_name)
        .bind(event_date)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Users and sessions

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username, role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username, role FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct CredentialRow {
        id: Option<i64>,
        username: Option<String>,
        role: Option<String>,
        password: Option<String>,
    }

    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, username, role, password FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let valid = bcrypt::verify(password, &row.password.clone().unwrap_or_default())
                .unwrap_or(false);

            if valid {
                Ok(Some(User::from(DbUser {
                    id: row.id,
                    username: row.username,
                    role: row.role,
                })))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
