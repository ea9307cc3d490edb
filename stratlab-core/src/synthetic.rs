//! Seeded random-walk bar tables for demos, tests, and benchmarks.
//!
//! Not market data. The same `(len, seed)` always yields the same table.

use crate::domain::Bar;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minutes between consecutive synthetic bars.
pub const BAR_MINUTES: i64 = 15;

const START_PRICE: f64 = 100.0;

fn epoch_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Generate `len` bars of a random walk starting at 100.0.
///
/// Each bar moves at most 1.5% from the previous close; high and low extend
/// up to 0.5% beyond the body. Volume columns are filled so every column is
/// readable by programs.
pub fn random_walk(len: usize, seed: u64) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = epoch_start();
    let mut price = START_PRICE;
    let mut bars = Vec::with_capacity(len);

    for i in 0..len {
        let ret: f64 = rng.gen_range(-0.015..0.015);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
        let volume: f64 = rng.gen_range(50.0..500.0);
        let trades = rng.gen_range(100..2_000u32) as f64;
        let taker_share: f64 = rng.gen_range(0.3..0.7);

        let opened = start + Duration::minutes(BAR_MINUTES * i as i64);
        let closed = opened + Duration::minutes(BAR_MINUTES) - Duration::milliseconds(1);

        bars.push(Bar {
            time: opened.format("%Y-%m-%d %H:%M:%S").to_string(),
            open,
            high,
            low,
            close,
            volume,
            close_time: closed.and_utc().timestamp_millis() as f64,
            quote_asset_volume: volume * close,
            number_of_trades: trades,
            taker_buy_base_asset_volume: volume * taker_share,
            taker_buy_quote_asset_volume: volume * taker_share * close,
        });
        price = close;
    }

    bars
}

/// `len` bars that never move: every price column equals `price`.
pub fn flat(len: usize, price: f64) -> Vec<Bar> {
    let start = epoch_start();
    (0..len)
        .map(|i| {
            let opened = start + Duration::minutes(BAR_MINUTES * i as i64);
            Bar::ohlc(
                opened.format("%Y-%m-%d %H:%M:%S").to_string(),
                price,
                price,
                price,
                price,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bars() {
        assert_eq!(random_walk(50, 7), random_walk(50, 7));
        assert_ne!(random_walk(50, 7), random_walk(50, 8));
    }

    #[test]
    fn bars_are_sane_and_chained() {
        let bars = random_walk(200, 42);
        assert_eq!(bars.len(), 200);
        assert_eq!(bars[0].open, 100.0);
        for pair in bars.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
        }
        assert!(bars.iter().all(Bar::is_sane));
    }

    #[test]
    fn timestamps_step_by_interval() {
        let bars = flat(3, 10.0);
        assert_eq!(bars[0].time, "2024-01-01 00:00:00");
        assert_eq!(bars[2].time, "2024-01-01 00:30:00");
        assert!(bars.iter().all(|b| b.close == 10.0 && b.low == 10.0));
    }
}
