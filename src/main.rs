#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};
use sqlx::{Pool, Sqlite};
use tracing::{error, info};

mod api;
mod auth;
mod catalog;
mod database;
mod db;
mod env;
mod error;
mod models;
mod reports;
mod telemetry;
mod validation;

#[cfg(test)]
mod test;

use catalog::Catalog;

pub fn init_rocket(pool: Pool<Sqlite>, catalog: Catalog) -> Rocket<Build> {
    rocket::build()
        .mount(
            "/api",
            routes![
                api::api_login,
                api::api_logout,
                api::api_check_session,
                api::api_check_session_unauthorized,
                api::api_get_clients,
                api::api_create_client,
                api::api_get_orders,
                api::api_create_order,
                api::api_mark_paid,
                api::api_delete_order,
                api::api_get_events,
                api::api_create_event,
                api::api_get_drinks,
                api::api_add_drink,
                api::api_edit_drink,
                api::api_replace_drinks,
                api::api_payout_report,
                api::api_client_report,
                api::api_register_user,
                api::health,
            ],
        )
        .register("/api", catchers![auth::unauthorized_api])
        .attach(telemetry::TelemetryFairing)
        .manage(pool)
        .manage(catalog)
}

#[launch]
async fn rocket() -> _ {
    env::load_environment();
    telemetry::init_tracing();

    let database_url = env::database_url();
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to the database");

    database::ensure_schema(&pool)
        .await
        .expect("Failed to apply database schema");

    info!("Database ready at {}", database_url);

    let cleanup_pool = pool.clone();
    rocket::tokio::spawn(async move {
        rocket::tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        loop {
            match db::clean_expired_sessions(&cleanup_pool).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Removed expired sessions"),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
            rocket::tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(pool, Catalog::new(env::catalog_path()))
}
