//! Agent service client — on-chain transfers and swaps from the operator wallet
//!
//! Transaction construction, signing and token-address resolution live in the
//! agent service; this side only converts amounts to octas, splits buy orders
//! over the allocation table and relays the calls.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::AgentError;

pub const APTOS_COIN_TYPE: &str = "0x1::aptos_coin::AptosCoin";

/// 1 APT = 10^8 octas
const OCTAS_PER_APT: Decimal = dec!(100000000);

const API_KEY_HEADER: &str = "x-api-key";

/// Share of a buy order routed into one token
#[derive(Debug, Clone, Copy)]
pub struct SwapAllocation {
    pub symbol: &'static str,
    pub share: Decimal,
}

/// 99% of every buy is swapped; the remaining 1% stays in the agent wallet
pub const SWAP_ALLOCATIONS: [SwapAllocation; 3] = [
    SwapAllocation {
        symbol: "ami",
        share: dec!(0.14),
    },
    SwapAllocation {
        symbol: "thl",
        share: dec!(0.25),
    },
    SwapAllocation {
        symbol: "lsd",
        share: dec!(0.60),
    },
];

/// One swap leg of a buy order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSwap {
    pub symbol: &'static str,
    pub amount_octas: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub token: String,
    pub hash: String,
}

/// Operations the agent service performs on behalf of the operator wallet
#[async_trait]
pub trait AgentSdk: Send + Sync {
    /// Transfer `amount_octas` of `coin_type` to `to`, returning the tx hash
    async fn transfer(&self, to: &str, amount_octas: u64, coin_type: &str)
        -> Result<String, AgentError>;

    /// Swap `amount_octas` of `from_token` into the token named `to_symbol`
    async fn swap(
        &self,
        from_token: &str,
        to_symbol: &str,
        amount_octas: u64,
    ) -> Result<String, AgentError>;
}

// ---------------------------------------------------------------------------
// Amount handling
// ---------------------------------------------------------------------------

fn human_amount(amount: f64) -> Result<Decimal, AgentError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AgentError::InvalidAmount(format!(
            "{} is not a positive amount",
            amount
        )));
    }
    Decimal::try_from(amount).map_err(|e| AgentError::InvalidAmount(e.to_string()))
}

fn octas(value: Decimal) -> Result<u64, AgentError> {
    value
        .checked_mul(OCTAS_PER_APT)
        .and_then(|v| v.to_u64())
        .ok_or_else(|| AgentError::InvalidAmount(format!("{} APT is out of range", value)))
}

/// Convert a human-readable APT amount to octas, rounding to the nearest octa
pub fn to_octas(amount: f64) -> Result<u64, AgentError> {
    let apt = human_amount(amount)?;
    let value = octas(apt.round_dp(8))?;
    if value == 0 {
        return Err(AgentError::InvalidAmount(format!(
            "{} APT is below one octa",
            amount
        )));
    }
    Ok(value)
}

/// Validate an exit request and return the payout in octas
pub fn exit_octas(wallet_address: &str, amount: f64) -> Result<u64, AgentError> {
    if wallet_address.trim().is_empty() {
        return Err(AgentError::InvalidDestination);
    }
    to_octas(amount)
}

/// Split a buy order over [`SWAP_ALLOCATIONS`], flooring each leg to whole octas
pub fn plan_swaps(amount: f64) -> Result<Vec<PlannedSwap>, AgentError> {
    let apt = human_amount(amount)?;
    SWAP_ALLOCATIONS
        .iter()
        .map(|allocation| {
            let leg = (apt * allocation.share)
                .checked_mul(OCTAS_PER_APT)
                .map(|v| v.floor())
                .and_then(|v| v.to_u64())
                .ok_or_else(|| {
                    AgentError::InvalidAmount(format!("{} APT is out of range", amount))
                })?;
            Ok(PlannedSwap {
                symbol: allocation.symbol,
                amount_octas: leg,
            })
        })
        .collect()
}

/// Run the planned swaps one after another; the first failure aborts the rest.
/// Legs that already went through are not unwound.
pub async fn execute_swaps<A>(agent: &A, plan: &[PlannedSwap]) -> Result<Vec<SwapReceipt>, AgentError>
where
    A: AgentSdk + ?Sized,
{
    let mut receipts = Vec::with_capacity(plan.len());
    for leg in plan {
        let hash = agent
            .swap(APTOS_COIN_TYPE, leg.symbol, leg.amount_octas)
            .await?;
        info!(token = leg.symbol, octas = leg.amount_octas, hash = %hash, "Swap submitted");
        receipts.push(SwapReceipt {
            token: leg.symbol.to_string(),
            hash,
        });
    }
    Ok(receipts)
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TxResponse {
    hash: String,
}

/// HTTP client for the agent service
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Build from `AGENT_SERVICE_URL` / `AGENT_API_KEY`; `None` when unconfigured
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("AGENT_SERVICE_URL")
            .ok()
            .filter(|s| !s.is_empty())?;
        let api_key = std::env::var("AGENT_API_KEY").ok().filter(|s| !s.is_empty());
        Some(Self::new(base_url, api_key))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<String, AgentError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling agent service");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }

        let tx: TxResponse = resp.json().await?;
        Ok(tx.hash)
    }
}

#[async_trait]
impl AgentSdk for AgentClient {
    async fn transfer(
        &self,
        to: &str,
        amount_octas: u64,
        coin_type: &str,
    ) -> Result<String, AgentError> {
        self.post(
            "/transfer",
            json!({
                "to": to,
                "amount": amount_octas.to_string(),
                "coinType": coin_type,
            }),
        )
        .await
    }

    async fn swap(
        &self,
        from_token: &str,
        to_symbol: &str,
        amount_octas: u64,
    ) -> Result<String, AgentError> {
        self.post(
            "/swap",
            json!({
                "fromToken": from_token,
                "toToken": to_symbol,
                "amount": amount_octas.to_string(),
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAgent {
        swaps: Mutex<Vec<(String, String, u64)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl AgentSdk for RecordingAgent {
        async fn transfer(
            &self,
            to: &str,
            amount_octas: u64,
            _coin_type: &str,
        ) -> Result<String, AgentError> {
            Ok(format!("0xtransfer-{}-{}", to, amount_octas))
        }

        async fn swap(
            &self,
            from_token: &str,
            to_symbol: &str,
            amount_octas: u64,
        ) -> Result<String, AgentError> {
            if self.fail_on == Some(to_symbol) {
                return Err(AgentError::Status {
                    status: 502,
                    body: "route not found".into(),
                });
            }
            self.swaps.lock().unwrap().push((
                from_token.to_string(),
                to_symbol.to_string(),
                amount_octas,
            ));
            Ok(format!("0x{}", to_symbol))
        }
    }

    #[test]
    fn test_to_octas() {
        assert_eq!(to_octas(1.0).unwrap(), 100_000_000);
        assert_eq!(to_octas(0.5).unwrap(), 50_000_000);
        assert_eq!(to_octas(1.23456789).unwrap(), 123_456_789);
        assert_eq!(to_octas(0.1).unwrap(), 10_000_000);
    }

    #[test]
    fn test_to_octas_rejects_bad_amounts() {
        assert!(to_octas(0.0).is_err());
        assert!(to_octas(-1.0).is_err());
        assert!(to_octas(f64::NAN).is_err());
        assert!(to_octas(f64::INFINITY).is_err());
        assert!(to_octas(0.000000001).is_err());
        assert!(to_octas(1e30).is_err());
    }

    #[test]
    fn test_exit_requires_destination() {
        assert!(matches!(
            exit_octas("  ", 1.0),
            Err(AgentError::InvalidDestination)
        ));
        assert_eq!(exit_octas("0xabc", 2.0).unwrap(), 200_000_000);
    }

    #[test]
    fn test_plan_swaps_allocations() {
        let plan = plan_swaps(1.0).unwrap();
        assert_eq!(
            plan,
            vec![
                PlannedSwap { symbol: "ami", amount_octas: 14_000_000 },
                PlannedSwap { symbol: "thl", amount_octas: 25_000_000 },
                PlannedSwap { symbol: "lsd", amount_octas: 60_000_000 },
            ]
        );
        let total: u64 = plan.iter().map(|p| p.amount_octas).sum();
        assert_eq!(total, 99_000_000);
    }

    #[test]
    fn test_plan_swaps_floors_fractional_octas() {
        let plan = plan_swaps(0.00000003).unwrap();
        assert_eq!(plan[0].amount_octas, 0);
        assert_eq!(plan[2].amount_octas, 1);
        assert!(plan_swaps(-2.0).unwrap_err().is_invalid_input());
    }

    #[tokio::test]
    async fn test_execute_swaps_in_order() {
        let agent = RecordingAgent::default();
        let plan = plan_swaps(2.0).unwrap();

        let receipts = execute_swaps(&agent, &plan).await.unwrap();

        assert_eq!(receipts.len(), 3);
        assert_eq!(receipts[1], SwapReceipt { token: "thl".into(), hash: "0xthl".into() });
        let swaps = agent.swaps.lock().unwrap().clone();
        assert_eq!(swaps[0], (APTOS_COIN_TYPE.to_string(), "ami".to_string(), 28_000_000));
        assert_eq!(swaps[2].2, 120_000_000);
    }

    #[tokio::test]
    async fn test_execute_swaps_stops_at_first_failure() {
        let agent = RecordingAgent {
            fail_on: Some("thl"),
            ..Default::default()
        };
        let plan = plan_swaps(1.0).unwrap();

        let err = execute_swaps(&agent, &plan).await.unwrap_err();

        assert!(!err.is_invalid_input());
        assert!(err.to_string().contains("route not found"));
        // the first leg went through and is not rolled back
        assert_eq!(agent.swaps.lock().unwrap().len(), 1);
    }
}
