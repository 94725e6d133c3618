//! Types for the leaderboard pipeline

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// One `position_event` row (a single fill/settlement on the venue)
///
/// Numeric columns are kept as the raw text the endpoint sent; they are
/// parsed leniently at aggregation time so a malformed value on one row
/// never fails the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionEvent {
    pub user: String,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub pnl_without_fee: Option<String>,
    #[serde(default)]
    pub is_profit: Option<bool>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub entry_exit_fee: Option<String>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub funding_fee: Option<String>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub rollover_fee: Option<String>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub size_delta: Option<String>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub collateral_delta: Option<String>,
    #[serde(default, deserialize_with = "lenient_numeric")]
    pub price: Option<String>,
    #[serde(default)]
    pub pair_type_struct_name: Option<String>,
}

/// Hasura may render `numeric` columns as JSON strings or numbers
fn lenient_numeric<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse a decimal column, falling back to zero for anything unparseable.
///
/// Numbers beyond `Decimal`'s range saturate to `Decimal::MAX`/`MIN`, and
/// magnitudes too small to represent become zero.
pub fn parse_decimal(raw: Option<&str>) -> Decimal {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Decimal::ZERO;
    };
    if let Ok(value) = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) {
        return value;
    }

    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.abs() >= 1.0 => {
            debug!(raw = s, "Numeric value out of decimal range, saturating");
            if f.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        }
        Ok(f) if f.is_finite() => Decimal::ZERO,
        _ => {
            debug!(raw = s, "Unparseable numeric value, using zero");
            Decimal::ZERO
        }
    }
}

/// Round half away from zero and pin the scale to two decimals
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Per-wallet leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderSummary {
    pub wallet_address: String,
    #[serde(rename = "netPnL", with = "rust_decimal::serde::float")]
    pub net_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    pub trade_count: u64,
    pub profitable_trades: u64,
    /// Percentage, serialized as a fixed two-decimal string (`"66.67"`)
    pub win_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_volume: Decimal,
    /// Serialized as a fixed two-decimal string
    pub avg_trade_size: Decimal,
    pub pairs_traded: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardMeta {
    pub total_records_processed: usize,
    pub processing_time_seconds: f64,
    /// RFC 3339 with millisecond precision (`2024-05-01T12:00:00.123Z`)
    #[serde(serialize_with = "millis_timestamp")]
    pub timestamp: DateTime<Utc>,
}

fn millis_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Result of one leaderboard run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardReport {
    pub top_traders: Vec<TraderSummary>,
    pub meta: LeaderboardMeta,
}
