//! Copy-trade engine — leaderboard aggregation and agent-service glue
//!
//! Provides:
//! - Hasura GraphQL client for the venue's `position_event` table
//! - Paginated event fetcher with adaptive page size
//! - Per-wallet P&L aggregation and top-trader ranking
//! - Agent service client for exits and multi-token buys

pub mod agent;
pub mod api;
pub mod error;
pub mod fetcher;
pub mod leaderboard;
pub mod types;

// Re-exports for convenience
pub use agent::{
    execute_swaps, exit_octas, plan_swaps, to_octas, AgentClient, AgentSdk, PlannedSwap,
    SwapReceipt, APTOS_COIN_TYPE, SWAP_ALLOCATIONS,
};
pub use api::HasuraClient;
pub use error::{AgentError, QueryError};
pub use fetcher::{fetch_all_position_events, FetchConfig, PositionEventSource};
pub use leaderboard::{build_leaderboard, rank_top_traders, summarize_wallets, TOP_TRADERS_LIMIT};
pub use types::*;
