//! SQLite-backed service catalog: providers, categories and services.
//!
//! Writes go through an [`ImportUnit`], which owns one transaction for a whole
//! batch. Each record runs inside a savepoint so a failing row can be rolled back
//! without touching the rest of the batch.

use crate::domain::model::{Category, Provider, ServiceRecord, ServiceStatus, UpsertOutcome};
use crate::utils::error::{ImportError, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Row, Sqlite, SqliteConnection, Transaction};
use std::str::FromStr;
use std::time::Duration;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const UPSERT_PRESERVE_STATUS: &str = "INSERT INTO services (
        provider_id, category_id, name, description,
        min_quantity, max_quantity, base_price, price, avg_speed, status
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active')
    ON CONFLICT (provider_id, name) DO UPDATE SET
        category_id = excluded.category_id,
        description = excluded.description,
        min_quantity = excluded.min_quantity,
        max_quantity = excluded.max_quantity,
        base_price = excluded.base_price,
        price = excluded.price,
        avg_speed = excluded.avg_speed,
        updated_at = CURRENT_TIMESTAMP";

const UPSERT_REACTIVATE: &str = "INSERT INTO services (
        provider_id, category_id, name, description,
        min_quantity, max_quantity, base_price, price, avg_speed, status
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active')
    ON CONFLICT (provider_id, name) DO UPDATE SET
        category_id = excluded.category_id,
        description = excluded.description,
        min_quantity = excluded.min_quantity,
        max_quantity = excluded.max_quantity,
        base_price = excluded.base_price,
        price = excluded.price,
        avg_speed = excluded.avg_speed,
        status = 'active',
        updated_at = CURRENT_TIMESTAMP";

#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // 每個 in-memory 連線都是獨立資料庫，只能保留單一常駐連線
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        tracing::debug!("Connected to catalog database: {}", url);
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// 開啟一個批次交易
    pub async fn begin(&self) -> Result<ImportUnit> {
        let tx = self.pool.begin().await?;
        Ok(ImportUnit { tx })
    }

    pub async fn add_provider(&self, name: &str, api_url: &str, api_key: &str) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO providers (name, api_url, api_key, status) VALUES (?, ?, ?, 'active') RETURNING id",
        )
        .bind(name)
        .bind(api_url)
        .bind(api_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    pub async fn active_providers(&self) -> Result<Vec<Provider>> {
        let rows = sqlx::query(
            "SELECT id, name, api_url, api_key, status FROM providers WHERE status = 'active' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| provider_from_row(row).map_err(ImportError::from))
            .collect()
    }

    pub async fn category_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT DISTINCT name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    pub async fn categories(&self, provider_id: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, provider_id FROM categories WHERE provider_id = ? ORDER BY name",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Category> {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    provider_id: row.try_get("provider_id")?,
                })
            })
            .collect()
    }

    pub async fn count_categories(&self, provider_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_services(&self, provider_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM services WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn find_service(&self, provider_id: i64, name: &str) -> Result<Option<StoredService>> {
        let row = sqlx::query(
            "SELECT s.id, s.provider_id, s.category_id, c.name AS category_name, s.name,
                    s.description, s.min_quantity, s.max_quantity, s.base_price, s.price,
                    s.avg_speed, s.status
             FROM services s
             JOIN categories c ON c.id = s.category_id
             WHERE s.provider_id = ? AND s.name = ?",
        )
        .bind(provider_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| StoredService::from_row(&row)).transpose()
    }

    pub async fn set_service_status(&self, service_id: i64, status: ServiceStatus) -> Result<()> {
        sqlx::query("UPDATE services SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// 一個匯入批次的交易單位：明確的 begin / commit / rollback
pub struct ImportUnit {
    tx: Transaction<'static, Sqlite>,
}

impl ImportUnit {
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// 在批次交易內開一個 savepoint，失敗的記錄只回滾自己
    pub async fn savepoint(&mut self) -> sqlx::Result<Transaction<'_, Sqlite>> {
        Connection::begin(&mut *self.tx).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// 從資料庫讀回的服務，測試與查詢使用
#[derive(Debug, Clone, PartialEq)]
pub struct StoredService {
    pub id: i64,
    pub provider_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub name: String,
    pub description: String,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub base_price: Decimal,
    pub price: Decimal,
    pub avg_speed: Decimal,
    pub status: String,
}

impl StoredService {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            provider_id: row.try_get("provider_id")?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            min_quantity: row.try_get("min_quantity")?,
            max_quantity: row.try_get("max_quantity")?,
            base_price: decimal_column(row, "base_price")?,
            price: decimal_column(row, "price")?,
            avg_speed: decimal_column(row, "avg_speed")?,
            status: row.try_get("status")?,
        })
    }
}

fn decimal_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).map_err(|e| ImportError::ProcessingError {
        message: format!("Column '{}' holds invalid decimal '{}': {}", column, text, e),
    })
}

fn provider_from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Provider> {
    Ok(Provider {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        api_url: row.try_get("api_url")?,
        api_key: row.try_get("api_key")?,
        status: row.try_get("status")?,
    })
}

pub async fn find_provider(conn: &mut SqliteConnection, provider_id: i64) -> Result<Option<Provider>> {
    let row = sqlx::query("SELECT id, name, api_url, api_key, status FROM providers WHERE id = ?")
        .bind(provider_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(provider_from_row).transpose()?)
}

async fn lookup_category(
    conn: &mut SqliteConnection,
    name: &str,
    provider_id: i64,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM categories WHERE name = ? AND provider_id = ?")
        .bind(name)
        .bind(provider_id)
        .fetch_optional(&mut *conn)
        .await
}

/// 插入分類；撞到唯一鍵時視為「已存在」並重新查詢
async fn insert_or_fetch_category(
    conn: &mut SqliteConnection,
    name: &str,
    provider_id: i64,
) -> sqlx::Result<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO categories (name, provider_id) VALUES (?, ?)
         ON CONFLICT (name, provider_id) DO NOTHING
         RETURNING id",
    )
    .bind(name)
    .bind(provider_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        tracing::debug!("Created new category '{}' (provider {}) with ID {}", name, provider_id, id);
        return Ok(id);
    }

    tracing::debug!(
        "Category '{}' (provider {}) was created concurrently, retrying lookup",
        name,
        provider_id
    );
    lookup_category(conn, name, provider_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Category Resolver：依 (name, provider_id) 取得或建立分類
pub async fn resolve_category(
    conn: &mut SqliteConnection,
    name: &str,
    provider_id: i64,
) -> sqlx::Result<i64> {
    if let Some(id) = lookup_category(conn, name, provider_id).await? {
        tracing::debug!("Found existing category '{}' with ID {}", name, id);
        return Ok(id);
    }
    insert_or_fetch_category(conn, name, provider_id).await
}

/// Upsert Engine：以 (provider_id, name) 為自然鍵寫入服務
pub async fn upsert_service(
    conn: &mut SqliteConnection,
    record: &ServiceRecord,
    category_id: i64,
    reactivate_on_update: bool,
) -> sqlx::Result<UpsertOutcome> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM services WHERE provider_id = ? AND name = ?")
            .bind(record.provider_id)
            .bind(&record.name)
            .fetch_optional(&mut *conn)
            .await?;

    let sql = if reactivate_on_update {
        UPSERT_REACTIVATE
    } else {
        UPSERT_PRESERVE_STATUS
    };

    sqlx::query(sql)
        .bind(record.provider_id)
        .bind(category_id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.min_quantity)
        .bind(record.max_quantity)
        .bind(record.base_price.to_string())
        .bind(record.effective_price().to_string())
        .bind(record.avg_speed.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(match existing {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    })
}
