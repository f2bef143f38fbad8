#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_structure_ta::{Candle, Price, Timeframe};
use serde::Deserialize;

/// Row of a fixture CSV. Decimals stay strings until parsed so their scale
/// is kept.
#[derive(Debug, Deserialize)]
struct FixtureRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

pub const SYMBOL: &str = "BTC/USD";

/// Loads `tests/fixtures/data/{name}` as hourly `BTC/USD` candles.
pub fn load_candles(name: &str) -> Vec<Candle> {
    let path = format!("tests/fixtures/data/{name}");
    let mut rdr =
        csv::Reader::from_path(&path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));

    rdr.deserialize()
        .map(|r| to_candle(r.unwrap_or_else(|e| panic!("bad row in {path}: {e}"))))
        .collect()
}

fn to_candle(row: FixtureRow) -> Candle {
    let price = |raw: &str| -> Price { raw.parse().expect("decimal field") };
    let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
        .expect("RFC 3339 timestamp")
        .with_timezone(&Utc);

    Candle::new(
        SYMBOL,
        Timeframe::OneHour,
        timestamp,
        price(&row.open),
        price(&row.high),
        price(&row.low),
        price(&row.close),
        price(&row.volume),
    )
}

/// Deterministic hourly series alternating 40-candle ranges with
/// 40-candle climbs, for benchmarks.
pub fn synthetic_candles(n: usize) -> Vec<Candle> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut level = Price::new(10_000, 0);
    let step = Price::new(3, 1);
    let wiggle = [0i64, 4, -3, 2, -5, 1, 3, -2];

    (0..n)
        .map(|i| {
            let phase = (i / 40) % 2;
            if phase == 1 {
                level += step;
            }
            let offset = Price::new(wiggle[i % wiggle.len()], 1);
            let close = level + offset;
            let open = level - offset;
            let high = open.max(close) + Price::new(6, 1);
            let low = open.min(close) - Price::new(6, 1);
            let volume = Price::new(1_000 + i64::try_from(i % 17).unwrap() * 37, 0);

            Candle::new(
                SYMBOL,
                Timeframe::OneHour,
                t0 + Duration::hours(i64::try_from(i).unwrap()),
                open,
                high,
                low,
                close,
                volume,
            )
        })
        .collect()
}
