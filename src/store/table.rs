//! Relational sink: one row per product in a single table.

use crate::error::StoreError;
use crate::models::ProductRecord;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::collections::HashSet;
use tracing::debug;

/// Appends product rows to a table through the `sqlx` Any driver.
///
/// The table name must already be a plain identifier; it is interpolated
/// into the statements.
#[derive(Debug, Clone)]
pub struct TableSink {
    pool: AnyPool,
    table: String,
}

impl TableSink {
    /// Connects to the database at `url`.
    pub async fn connect(url: &str, table: &str) -> Result<Self, StoreError> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new().max_connections(2).connect(url).await?;
        debug!("Connected table sink for {}", table);
        Ok(Self::new(pool, table))
    }

    /// Wraps an existing pool.
    pub fn new(pool: AnyPool, table: impl Into<String>) -> Self {
        Self { pool, table: table.into() }
    }

    /// Product ids already in the table. A missing table yields an empty set.
    pub async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let sql = format!(r#"SELECT "Product_id" FROM {}"#, self.table);
        match sqlx::query_scalar::<_, String>(&sql).fetch_all(&self.pool).await {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(sqlx::Error::Database(e)) => {
                debug!("Table {} not readable, treating as empty: {}", self.table, e);
                Ok(HashSet::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the table if needed and appends one row.
    pub async fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        self.ensure_table().await?;

        let gallery = serde_json::to_string(&record.gallery_image_urls)?;
        let sql = format!(
            r#"INSERT INTO {} ("Product_id", "UUID_number", "Price", "Name", "Description", "Image_link", "Image_all_links")
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            self.table
        );

        sqlx::query(&sql)
            .bind(record.product_id.clone())
            .bind(record.unique_run_id.clone())
            .bind(record.price.clone())
            .bind(record.name.clone())
            .bind(record.description.clone())
            .bind(record.primary_image_url.clone())
            .bind(gallery)
            .execute(&self.pool)
            .await?;

        debug!("Inserted {} into {}", record.product_id, self.table);
        Ok(())
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        let sql = format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                "Product_id" TEXT PRIMARY KEY,
                "UUID_number" TEXT NOT NULL,
                "Price" TEXT NOT NULL,
                "Name" TEXT NOT NULL,
                "Description" TEXT NOT NULL,
                "Image_link" TEXT NOT NULL,
                "Image_all_links" TEXT NOT NULL
            )"#,
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
