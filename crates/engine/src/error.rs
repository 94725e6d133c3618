//! Error types for the remote collaborators (Hasura, agent service)

use thiserror::Error;

/// Failure of a single `position_event` page query.
///
/// The fetcher treats every variant the same way (shrink the page and retry);
/// the split only exists so logs say what actually went wrong.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("GraphQL request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GraphQL endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode GraphQL response: {0}")]
    Decode(String),

    #[error("GraphQL query failed: {0}")]
    GraphQl(String),

    #[error("GraphQL response contained no data")]
    MissingData,
}

/// Failure of a funding, exit or swap call.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid destination address")]
    InvalidDestination,

    #[error("Agent service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Agent service error {status}: {body}")]
    Status { status: u16, body: String },
}

impl AgentError {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::InvalidDestination)
    }
}
