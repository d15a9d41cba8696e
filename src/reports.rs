use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{get_client_by_name, get_orders_for_client, settle_with_snapshot};
use crate::error::AppError;
use crate::models::Order;

/// Localized (Hebrew) header for the payout export:
/// name, phone, amount, order date, payment date.
const PAYOUT_CSV_HEADER: &str = "שם,טלפון,סכום,תאריך הזמנה,תאריך תשלום";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PayoutRow {
    pub name: String,
    pub phone: String,
    pub amount: f64,
    pub order_date: NaiveDate,
    pub paid_date: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PayoutReport {
    pub rows: Vec<PayoutRow>,
    pub settled: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ClientReport {
    pub client: String,
    pub orders: Vec<Order>,
    pub order_count: usize,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub debt: f64,
}

/// Generates the payout report and settles the ledger in the same breath:
/// there is no preview mode. The snapshot and the settle share one
/// transaction, so the grouped totals cover exactly the orders marked paid.
///
/// Groups keep the order in which their client first appears in the
/// newest-first snapshot; each group's displayed order date is the latest
/// order date in that group. Clients that no longer exist get a blank phone.
#[instrument(skip(pool))]
pub async fn payout_report(pool: &Pool<Sqlite>) -> Result<PayoutReport, AppError> {
    info!("Generating payout report");

    let (orders, settled, paid_date) = settle_with_snapshot(pool).await?;

    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<PayoutRow> = Vec::new();

    for order in &orders {
        match index_by_name.get(&order.name) {
            Some(&i) => {
                rows[i].amount += order.price_sum;
                if order.order_date > rows[i].order_date {
                    rows[i].order_date = order.order_date;
                }
            }
            None => {
                index_by_name.insert(order.name.clone(), rows.len());
                rows.push(PayoutRow {
                    name: order.name.clone(),
                    phone: String::new(),
                    amount: order.price_sum,
                    order_date: order.order_date,
                    paid_date,
                });
            }
        }
    }

    for row in &mut rows {
        if let Some(client) = get_client_by_name(pool, &row.name).await? {
            row.phone = client.phone;
        }
    }

    info!(groups = rows.len(), settled, "Payout report generated");
    Ok(PayoutReport { rows, settled })
}

/// CSV rendering of a payout report. Prefixed with a UTF-8 byte-order mark so
/// spreadsheet tools display the Hebrew header and client names correctly.
pub fn payout_csv(report: &PayoutReport) -> String {
    let mut csv = String::from('\u{feff}');
    csv.push_str(PAYOUT_CSV_HEADER);
    csv.push('\n');

    for row in &report.rows {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&row.name),
            csv_field(&row.phone),
            row.amount,
            row.order_date,
            row.paid_date
        ));
    }

    csv
}

/// Quotes a field when it would break the row, doubling embedded quotes.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Per-client statement over the full ledger: all orders exactly matching
/// `name`, newest first, with running totals. An empty result is a valid
/// report, not an error.
#[instrument(skip(pool))]
pub async fn client_report(pool: &Pool<Sqlite>, name: &str) -> Result<ClientReport, AppError> {
    info!("Generating client report");

    let orders = get_orders_for_client(pool, name).await?;

    let total_amount: f64 = orders.iter().map(|o| o.price_sum).sum();
    let paid_amount: f64 = orders.iter().filter(|o| o.paid).map(|o| o.price_sum).sum();

    Ok(ClientReport {
        client: name.to_string(),
        order_count: orders.len(),
        total_amount,
        paid_amount,
        debt: total_amount - paid_amount,
        orders,
    })
}
