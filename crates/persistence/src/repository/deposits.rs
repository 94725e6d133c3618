//! Deposits — a user's investment total and its trade row, written together

use super::trades::{insert_trade, TradeRecord};
use super::users::{ensure_user, increment_investment, UserRecord};
use crate::DbResult;
use sqlx::SqlitePool;
use tracing::debug;

pub struct DepositRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DepositRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the user if needed, add `amount` to their total and record a
    /// trade for it. Nothing is written unless all three steps succeed.
    pub async fn record(&self, wallet: &str, amount: f64) -> DbResult<(UserRecord, TradeRecord)> {
        let mut tx = self.pool.begin().await?;

        ensure_user(&mut tx, wallet).await?;
        let user = increment_investment(&mut tx, wallet, amount).await?;
        let trade = insert_trade(&mut tx, wallet, amount).await?;

        tx.commit().await?;
        debug!(wallet, amount, trade_id = trade.id, "Deposit committed");

        Ok((user, trade))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{TradeRepository, UserRepository};
    use crate::Database;

    #[tokio::test]
    async fn test_record_creates_user_and_trade() {
        let db = Database::in_memory().await.unwrap();
        let deposits = DepositRepository::new(db.pool());

        let (user, trade) = deposits.record("0xabc", 1.5).await.unwrap();
        assert_eq!(user.investment_amount, 1.5);
        assert_eq!(trade.user_id, user.id);
        assert_eq!(trade.investment, 1.5);

        let (user, _) = deposits.record("0xabc", 2.0).await.unwrap();
        assert_eq!(user.investment_amount, 3.5);
        let trades = TradeRepository::new(db.pool())
            .list_for_wallet("0xabc")
            .await
            .unwrap();
        assert_eq!(trades.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_trade_insert_rolls_back_total() {
        let db = Database::in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        users.create("0xabc").await.unwrap();
        users.add_investment("0xabc", 1.0).await.unwrap();

        sqlx::query("DROP TABLE trades")
            .execute(db.pool())
            .await
            .unwrap();

        let result = DepositRepository::new(db.pool()).record("0xabc", 5.0).await;
        assert!(result.is_err());

        let user = users.get_by_wallet("0xabc").await.unwrap().unwrap();
        assert_eq!(user.investment_amount, 1.0);
    }

    #[tokio::test]
    async fn test_failed_first_deposit_leaves_no_user() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("DROP TABLE trades")
            .execute(db.pool())
            .await
            .unwrap();

        let result = DepositRepository::new(db.pool()).record("0xnew", 5.0).await;
        assert!(result.is_err());
        assert!(UserRepository::new(db.pool())
            .get_by_wallet("0xnew")
            .await
            .unwrap()
            .is_none());
    }
}
