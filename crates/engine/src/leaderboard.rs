//! Leaderboard — fold position events into per-wallet P&L and rank the top traders
//!
//! Runs after every page has been fetched; the fold itself is synchronous and
//! independent of input order.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::info;

use crate::fetcher::{fetch_all_position_events, FetchConfig, PositionEventSource};
use crate::types::{
    parse_decimal, round2, LeaderboardMeta, LeaderboardReport, PositionEvent, TraderSummary,
};

/// Number of traders returned by the leaderboard route
pub const TOP_TRADERS_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

/// Running totals for one wallet
#[derive(Debug, Clone)]
struct WalletAccumulator {
    wallet: String,
    net_pnl: Decimal,
    total_fees: Decimal,
    trade_count: u64,
    profitable_trades: u64,
    total_volume: Decimal,
    pairs: HashSet<String>,
}

impl WalletAccumulator {
    fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            net_pnl: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            trade_count: 0,
            profitable_trades: 0,
            total_volume: Decimal::ZERO,
            pairs: HashSet::new(),
        }
    }

    fn record(&mut self, event: &PositionEvent) {
        let pnl = parse_decimal(event.pnl_without_fee.as_deref());
        let fees = parse_decimal(event.entry_exit_fee.as_deref())
            .saturating_add(parse_decimal(event.funding_fee.as_deref()))
            .saturating_add(parse_decimal(event.rollover_fee.as_deref()));
        let size = parse_decimal(event.size_delta.as_deref()).abs();

        self.net_pnl = self.net_pnl.saturating_add(pnl);
        self.total_fees = self.total_fees.saturating_add(fees);
        self.total_volume = self.total_volume.saturating_add(size);
        self.trade_count += 1;
        if event.is_profit.unwrap_or(false) {
            self.profitable_trades += 1;
        }
        self.pairs
            .insert(event.pair_type_struct_name.clone().unwrap_or_default());
    }

    fn into_summary(self) -> TraderSummary {
        let (win_rate, avg_trade_size) = if self.trade_count > 0 {
            let count = Decimal::from(self.trade_count);
            (
                Decimal::from(self.profitable_trades) * Decimal::ONE_HUNDRED / count,
                self.total_volume / count,
            )
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        TraderSummary {
            wallet_address: self.wallet,
            net_pnl: round2(self.net_pnl),
            total_fees: round2(self.total_fees),
            trade_count: self.trade_count,
            profitable_trades: self.profitable_trades,
            win_rate: round2(win_rate),
            total_volume: round2(self.total_volume),
            avg_trade_size: round2(avg_trade_size),
            pairs_traded: self.pairs.len(),
        }
    }
}

/// One summary per distinct wallet, in first-seen order
pub fn summarize_wallets(events: &[PositionEvent]) -> Vec<TraderSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut wallets: Vec<WalletAccumulator> = Vec::new();

    for event in events {
        let slot = *index.entry(event.user.as_str()).or_insert_with(|| {
            wallets.push(WalletAccumulator::new(&event.user));
            wallets.len() - 1
        });
        wallets[slot].record(event);
    }

    wallets
        .into_iter()
        .map(WalletAccumulator::into_summary)
        .collect()
}

/// Top `limit` wallets by net P&L, descending. Ties keep first-seen order.
pub fn rank_top_traders(events: &[PositionEvent], limit: usize) -> Vec<TraderSummary> {
    let mut summaries = summarize_wallets(events);
    summaries.sort_by(|a, b| b.net_pnl.cmp(&a.net_pnl));
    summaries.truncate(limit);
    summaries
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Fetch every qualifying event from `source` and build the leaderboard
pub async fn build_leaderboard<S>(
    source: &S,
    config: &FetchConfig,
    limit: usize,
) -> anyhow::Result<LeaderboardReport>
where
    S: PositionEventSource + ?Sized,
{
    let started = Instant::now();

    let events = fetch_all_position_events(source, config).await?;
    let top_traders = rank_top_traders(&events, limit);

    let processing_time_seconds = started.elapsed().as_secs_f64();
    info!(
        records = events.len(),
        traders = top_traders.len(),
        seconds = processing_time_seconds,
        "Leaderboard built"
    );

    Ok(LeaderboardReport {
        top_traders,
        meta: LeaderboardMeta {
            total_records_processed: events.len(),
            processing_time_seconds,
            timestamp: Utc::now(),
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{dataset, ScriptedSource};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn make_event(user: &str, pnl: &str, is_profit: bool, size: &str, pair: &str) -> PositionEvent {
        PositionEvent {
            user: user.into(),
            pnl_without_fee: Some(pnl.into()),
            is_profit: Some(is_profit),
            entry_exit_fee: Some("0".into()),
            funding_fee: Some("0".into()),
            rollover_fee: Some("0".into()),
            size_delta: Some(size.into()),
            collateral_delta: Some("0".into()),
            price: Some("1".into()),
            pair_type_struct_name: Some(pair.into()),
        }
    }

    fn by_wallet(mut summaries: Vec<TraderSummary>) -> Vec<TraderSummary> {
        summaries.sort_by(|a, b| a.wallet_address.cmp(&b.wallet_address));
        summaries
    }

    #[test]
    fn test_single_wallet_example() {
        let events = vec![
            make_event("0xA", "10.00", true, "100", "BTC_USD"),
            make_event("0xA", "-3.00", false, "50", "BTC_USD"),
            make_event("0xA", "5.505", true, "25", "BTC_USD"),
        ];

        let summaries = rank_top_traders(&events, TOP_TRADERS_LIMIT);
        assert_eq!(summaries.len(), 1);

        let s = &summaries[0];
        assert_eq!(s.wallet_address, "0xA");
        assert_eq!(s.net_pnl, dec!(12.51));
        assert_eq!(s.trade_count, 3);
        assert_eq!(s.profitable_trades, 2);
        assert_eq!(s.win_rate.to_string(), "66.67");
        assert_eq!(s.total_volume, dec!(175.00));
        assert_eq!(s.avg_trade_size.to_string(), "58.33");
        assert_eq!(s.total_fees, Decimal::ZERO);
        assert_eq!(s.pairs_traded, 1);
    }

    #[test]
    fn test_malformed_pnl_counts_as_zero_trade() {
        let events = vec![
            make_event("0xA", "4.00", true, "10", "BTC_USD"),
            make_event("0xA", "not-a-number", false, "garbage", "BTC_USD"),
        ];

        let s = &summarize_wallets(&events)[0];
        assert_eq!(s.net_pnl, dec!(4.00));
        assert_eq!(s.trade_count, 2);
        assert_eq!(s.total_volume, dec!(10));
    }

    #[test]
    fn test_fees_volume_and_pairs() {
        let mut e1 = make_event("0xA", "1", true, "-40", "BTC_USD");
        e1.entry_exit_fee = Some("0.5".into());
        e1.funding_fee = Some("0.25".into());
        e1.rollover_fee = Some("0.125".into());
        let mut e2 = make_event("0xA", "1", false, "60", "ETH_USD");
        e2.entry_exit_fee = None;
        e2.funding_fee = Some("1".into());
        e2.pair_type_struct_name = None;
        let e3 = make_event("0xA", "1", false, "0", "ETH_USD");

        let s = &summarize_wallets(&[e1, e2, e3])[0];
        assert_eq!(s.total_fees, dec!(1.88));
        assert_eq!(s.total_volume, dec!(100));
        assert_eq!(s.avg_trade_size.to_string(), "33.33");
        assert_eq!(s.pairs_traded, 3);
        assert_eq!(s.win_rate.to_string(), "33.33");
    }

    #[test]
    fn test_is_profit_independent_of_sign() {
        let events = vec![
            make_event("0xA", "-5", true, "1", "P"),
            make_event("0xA", "5", false, "1", "P"),
        ];
        let s = &summarize_wallets(&events)[0];
        assert_eq!(s.profitable_trades, 1);
        assert_eq!(s.net_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_top_ten_sorted_descending() {
        let events: Vec<PositionEvent> = (0..15)
            .flat_map(|i| {
                let user = format!("0x{:02}", i);
                let pnl = format!("{}", (i * 7) % 15 - 5);
                vec![
                    make_event(&user, &pnl, true, "1", "P"),
                    make_event(&user, "0.5", false, "1", "P"),
                ]
            })
            .collect();

        let top = rank_top_traders(&events, TOP_TRADERS_LIMIT);
        assert_eq!(top.len(), 10);
        assert!(top.windows(2).all(|w| w[0].net_pnl >= w[1].net_pnl));
        assert_eq!(top[0].net_pnl, dec!(9.5));

        assert_eq!(top[9].net_pnl, dec!(0.5));
        assert_eq!(summarize_wallets(&events).len(), 15);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let events = vec![
            make_event("0xC", "5", true, "1", "P"),
            make_event("0xA", "4", true, "1", "P"),
            make_event("0xD", "9", true, "1", "P"),
            make_event("0xA", "1.001", true, "1", "P"),
            make_event("0xB", "5.00", true, "1", "P"),
        ];

        // 0xC, 0xA and 0xB all round to 5.00
        let order: Vec<String> = rank_top_traders(&events, TOP_TRADERS_LIMIT)
            .into_iter()
            .map(|s| s.wallet_address)
            .collect();
        assert_eq!(order, vec!["0xD", "0xC", "0xA", "0xB"]);

        let top_two = rank_top_traders(&events, 2);
        assert_eq!(top_two[1].wallet_address, "0xC");
    }

    #[test]
    fn test_out_of_range_pnl_saturates() {
        let events = vec![
            make_event("0xA", "10", true, "1", "P"),
            make_event("0xB", "123456789012345678901234567890.5", true, "1", "P"),
            make_event("0xB", "1", true, "1", "P"),
        ];

        let top = rank_top_traders(&events, TOP_TRADERS_LIMIT);
        assert_eq!(top[0].wallet_address, "0xB");
        assert_eq!(top[0].net_pnl, round2(Decimal::MAX));
    }

    #[test]
    fn test_permutation_invariance() {
        let events = vec![
            make_event("0xA", "1.10", true, "10", "BTC_USD"),
            make_event("0xB", "-2.20", false, "-20", "ETH_USD"),
            make_event("0xA", "3.30", false, "30", "ETH_USD"),
            make_event("0xC", "0.01", true, "1", "BTC_USD"),
            make_event("0xB", "7.77", true, "5", "ETH_USD"),
            make_event("0xA", "-0.40", true, "-4", "SOL_USD"),
        ];
        let expected = by_wallet(summarize_wallets(&events));

        let mut reversed = events.clone();
        reversed.reverse();
        assert_eq!(by_wallet(summarize_wallets(&reversed)), expected);

        for shift in 1..events.len() {
            let mut rotated = events.clone();
            rotated.rotate_left(shift);
            assert_eq!(by_wallet(summarize_wallets(&rotated)), expected);
        }
    }

    #[test]
    fn test_every_event_lands_in_exactly_one_summary() {
        let events = dataset(31);
        let summaries = summarize_wallets(&events);
        let total: u64 = summaries.iter().map(|s| s.trade_count).sum();
        assert_eq!(total, 31);
        assert_eq!(summaries.len(), 11);
    }

    #[test]
    fn test_zero_trade_accumulator_does_not_divide() {
        let s = WalletAccumulator::new("0xEMPTY").into_summary();
        assert_eq!(s.trade_count, 0);
        assert_eq!(s.win_rate.to_string(), "0.00");
        assert_eq!(s.avg_trade_size.to_string(), "0.00");
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_top_traders(&[], TOP_TRADERS_LIMIT).is_empty());
    }

    #[tokio::test]
    async fn test_build_leaderboard_meta() {
        let source = ScriptedSource::new(dataset(45));
        let config = FetchConfig {
            page_size: 20,
            page_delay: Duration::ZERO,
            ..FetchConfig::default()
        };

        let report = build_leaderboard(&source, &config, TOP_TRADERS_LIMIT)
            .await
            .unwrap();

        assert_eq!(report.meta.total_records_processed, 45);
        assert_eq!(report.top_traders.len(), 10);
        assert!(report.meta.processing_time_seconds >= 0.0);
        // dataset pnl grows with the row index, so the last wallet leads
        assert_eq!(report.top_traders[0].wallet_address, "0x0014");
    }

    #[tokio::test]
    async fn test_build_leaderboard_propagates_fetch_failure() {
        let source = ScriptedSource::failing(dataset(5), |_, _, _| true);
        let config = FetchConfig {
            page_size: 100,
            page_delay: Duration::ZERO,
            ..FetchConfig::default()
        };

        let err = build_leaderboard(&source, &config, TOP_TRADERS_LIMIT)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("GraphQL query failed"));
    }
}
