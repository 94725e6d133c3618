//! Trade repository — deposits handed to the agent wallet and their profit

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub user_id: i64,
    pub wallet_address: String,
    pub investment: f64,
    pub profit: f64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

pub struct TradeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TradeRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a deposit for an existing user
    pub async fn create(&self, wallet: &str, investment: f64) -> DbResult<TradeRecord> {
        let mut conn = self.pool.acquire().await?;
        insert_trade(&mut conn, wallet, investment).await
    }

    /// All trades for a wallet, newest first
    pub async fn list_for_wallet(&self, wallet: &str) -> DbResult<Vec<TradeRecord>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"SELECT * FROM trades
               WHERE wallet_address = ?1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(wallet)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn update_profit(&self, id: i64, profit: f64) -> DbResult<TradeRecord> {
        sqlx::query_as::<_, TradeRecord>(
            r#"UPDATE trades
               SET profit = ?1, updated_at = strftime('%s', 'now')
               WHERE id = ?2
               RETURNING *"#,
        )
        .bind(profit)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("trade {}", id)))
    }
}

pub(crate) async fn insert_trade(
    conn: &mut SqliteConnection,
    wallet: &str,
    investment: f64,
) -> DbResult<TradeRecord> {
    let user_id: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE wallet_address = ?1")
        .bind(wallet)
        .fetch_optional(&mut *conn)
        .await?;
    let (user_id,) = user_id.ok_or_else(|| DbError::NotFound(format!("user {}", wallet)))?;

    let record = sqlx::query_as::<_, TradeRecord>(
        r#"INSERT INTO trades (user_id, wallet_address, investment, profit)
           VALUES (?1, ?2, ?3, 0)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(wallet)
    .bind(investment)
    .fetch_one(&mut *conn)
    .await?;

    Ok(record)
}
