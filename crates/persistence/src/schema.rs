//! Database schema definitions

/// SQL to create all tables
/// NOTE: timestamps are unix seconds
pub const CREATE_TABLES: &str = r#"
-- Dashboard users, one row per connected wallet
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet_address TEXT NOT NULL UNIQUE,
    investment_amount REAL NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Funds handed to the agent wallet, one row per deposit
CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    wallet_address TEXT NOT NULL,
    investment REAL NOT NULL,
    profit REAL NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_trades_wallet ON trades(wallet_address, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id)
"#;
