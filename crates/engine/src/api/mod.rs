//! Remote API clients

pub mod hasura;

pub use hasura::HasuraClient;
