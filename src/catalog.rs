use std::path::{Path, PathBuf};

use rocket::tokio::fs;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::Drink;

/// The drink catalog. A flat, ordered list persisted as one JSON document:
/// every mutation reads the whole list, applies the change in memory and
/// rewrites the file. Two concurrent writers are last-write-wins, which is
/// acceptable for a single-operator pub.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing document reads as an empty catalog.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Drink>, AppError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Appends a drink, rejecting names already present (case-insensitive).
    #[instrument(skip(self))]
    pub async fn add(&self, name: &str, price: f64) -> Result<Vec<Drink>, AppError> {
        let mut drinks = self.list().await?;

        if drinks.iter().any(|d| names_collide(&d.name, name)) {
            return Err(AppError::Conflict(format!(
                "Drink '{}' already exists",
                name
            )));
        }

        drinks.push(Drink {
            name: name.to_string(),
            price,
        });
        self.persist(&drinks).await?;

        info!(drink = %name, "Drink added to catalog");
        Ok(drinks)
    }

    /// Replaces the entry at `index` in place, preserving its position.
    /// Renaming onto another entry's name (case-insensitive) is rejected;
    /// renaming an entry onto itself is fine.
    #[instrument(skip(self))]
    pub async fn edit(&self, index: usize, name: &str, price: f64) -> Result<Vec<Drink>, AppError> {
        let mut drinks = self.list().await?;

        if index >= drinks.len() {
            return Err(AppError::NotFound(format!(
                "No drink at index {} in catalog",
                index
            )));
        }

        let collision = drinks
            .iter()
            .enumerate()
            .any(|(i, d)| i != index && names_collide(&d.name, name));
        if collision {
            return Err(AppError::Conflict(format!(
                "Drink '{}' already exists",
                name
            )));
        }

        drinks[index] = Drink {
            name: name.to_string(),
            price,
        };
        self.persist(&drinks).await?;

        info!(drink = %name, index, "Drink updated in catalog");
        Ok(drinks)
    }

    /// Wholesale document replacement.
    #[instrument(skip_all)]
    pub async fn replace(&self, drinks: Vec<Drink>) -> Result<(), AppError> {
        self.persist(&drinks).await?;
        info!(count = drinks.len(), "Catalog replaced");
        Ok(())
    }

    /// Write-then-rename so a reader never observes a torn document.
    async fn persist(&self, drinks: &[Drink]) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(drinks)?;

        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");

        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

fn names_collide(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
