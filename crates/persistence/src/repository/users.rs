//! User repository — one row per wallet that has connected to the dashboard

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub wallet_address: String,
    pub investment_amount: f64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_wallet(&self, wallet: &str) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT * FROM users WHERE wallet_address = ?1",
        )
        .bind(wallet)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Insert a new user with zero investment
    pub async fn create(&self, wallet: &str) -> DbResult<UserRecord> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (wallet_address, investment_amount) VALUES (?1, 0) RETURNING *",
        )
        .bind(wallet)
        .fetch_one(self.pool)
        .await?;

        Ok(record)
    }

    /// Existing user for `wallet`, or a freshly created one
    pub async fn get_or_create(&self, wallet: &str) -> DbResult<UserRecord> {
        let mut conn = self.pool.acquire().await?;
        ensure_user(&mut conn, wallet).await
    }

    /// Add `amount` to the stored investment total
    pub async fn add_investment(&self, wallet: &str, amount: f64) -> DbResult<UserRecord> {
        let mut conn = self.pool.acquire().await?;
        increment_investment(&mut conn, wallet, amount).await
    }
}

pub(crate) async fn ensure_user(conn: &mut SqliteConnection, wallet: &str) -> DbResult<UserRecord> {
    sqlx::query("INSERT OR IGNORE INTO users (wallet_address, investment_amount) VALUES (?1, 0)")
        .bind(wallet)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE wallet_address = ?1")
        .bind(wallet)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("user {}", wallet)))
}

pub(crate) async fn increment_investment(
    conn: &mut SqliteConnection,
    wallet: &str,
    amount: f64,
) -> DbResult<UserRecord> {
    sqlx::query_as::<_, UserRecord>(
        r#"UPDATE users
           SET investment_amount = investment_amount + ?1,
               updated_at = strftime('%s', 'now')
           WHERE wallet_address = ?2
           RETURNING *"#,
    )
    .bind(amount)
    .bind(wallet)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("user {}", wallet)))
}
