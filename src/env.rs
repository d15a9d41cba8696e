use std::path::PathBuf;

use tracing::debug;

pub fn load_environment() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) => debug!("Could not load .env file: {}", e),
    }
}

pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:pub_database.db?mode=rwc".to_string())
}

pub fn catalog_path() -> PathBuf {
    std::env::var("CATALOG_PATH")
        .unwrap_or_else(|_| "drinks.json".to_string())
        .into()
}

pub fn session_hours() -> i64 {
    std::env::var("SESSION_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}
