//! Hasura GraphQL client for the trading venue's `position_event` table
//!
//! Authenticates with the static admin secret header. Only the paginated
//! leaderboard query is exposed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::QueryError;
use crate::fetcher::PositionEventSource;
use crate::types::PositionEvent;

const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Ordered by `(user, metadata_sequence_number)` so offset pagination is stable
const POSITION_EVENTS_QUERY: &str = r#"
    query GetPositionEventsPaginated($limit: Int!, $offset: Int!) {
        position_event(
            where: { pnl_without_fee: { _is_null: false } }
            order_by: [{ user: asc }, { metadata_sequence_number: asc }]
            limit: $limit
            offset: $offset
        ) {
            user
            pnl_without_fee
            is_profit
            entry_exit_fee
            funding_fee
            rollover_fee
            size_delta
            collateral_delta
            price
            pair_type_struct_name
        }
    }
"#;

/// Hasura GraphQL client
#[derive(Clone)]
pub struct HasuraClient {
    client: Client,
    endpoint: String,
    admin_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PositionEventData {
    position_event: Vec<PositionEvent>,
}

/// Decode a raw GraphQL response body into position events
pub fn decode_position_events(body: &str) -> Result<Vec<PositionEvent>, QueryError> {
    let response: GraphQlResponse<PositionEventData> =
        serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))?;

    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(QueryError::GraphQl(messages.join("; ")));
    }

    response
        .data
        .map(|data| data.position_event)
        .ok_or(QueryError::MissingData)
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

impl HasuraClient {
    pub fn new(endpoint: impl Into<String>, admin_secret: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: endpoint.into(),
            admin_secret,
        }
    }

    /// Build from `HASURA_ENDPOINT` and `HASURA_ADMIN_SECRET`
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("HASURA_ENDPOINT").context("HASURA_ENDPOINT is not set")?;
        let admin_secret = std::env::var("HASURA_ADMIN_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        Ok(Self::new(endpoint, admin_secret))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one page of `position_event` rows
    pub async fn get_position_events(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PositionEvent>, QueryError> {
        debug!(limit, offset, "Querying position_event page");

        let mut request = self.client.post(&self.endpoint).json(&json!({
            "query": POSITION_EVENTS_QUERY,
            "variables": { "limit": limit, "offset": offset },
        }));
        if let Some(secret) = &self.admin_secret {
            request = request.header(ADMIN_SECRET_HEADER, secret);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events = decode_position_events(&body)?;
        debug!(count = events.len(), "position_event page received");
        Ok(events)
    }
}

#[async_trait]
impl PositionEventSource for HasuraClient {
    async fn fetch_page(&self, limit: u32, offset: u64) -> Result<Vec<PositionEvent>, QueryError> {
        self.get_position_events(limit, offset).await
    }
}
