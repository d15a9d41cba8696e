use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tab entry. `name` and `drink` are free text rather than foreign keys:
/// reports must tolerate orders whose client or drink has since been renamed
/// or removed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub name: String,
    pub drink: String,
    pub quantity: i64,
    pub price_sum: f64,
    pub paid: bool,
    pub order_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub event: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbOrder {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub drink: Option<String>,
    pub quantity: Option<i64>,
    pub price_sum: Option<f64>,
    pub paid: Option<bool>,
    pub order_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub event: Option<String>,
}

impl From<DbOrder> for Order {
    fn from(db: DbOrder) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            drink: db.drink.unwrap_or_default(),
            quantity: db.quantity.unwrap_or_default(),
            price_sum: db.price_sum.unwrap_or_default(),
            paid: db.paid.unwrap_or_default(),
            // Rows from before the order_date column existed carry NULL here.
            order_date: db.order_date.unwrap_or_else(|| Utc::now().date_naive()),
            paid_date: db.paid_date,
            event: db.event,
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub created_at: Option<NaiveDateTime>,
}

/// One catalog entry. Drinks have no server-side id; they are referenced by
/// name and by position within the catalog document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Drink {
    pub name: String,
    pub price: f64,
}
