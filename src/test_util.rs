// src/test_util.rs

use std::str::FromStr;

use chrono::{Duration, TimeZone, Utc};

use crate::{Candle, Price, Timeframe, Timestamp};

/// Asserts that two `f64` values are within `1e-9` of each other.
macro_rules! assert_approx {
    ($actual:expr, $expected:expr) => {{
        let (a, e): (f64, f64) = ($actual, $expected);
        assert!(
            (a - e).abs() < 1e-9,
            "assert_approx failed: actual={a}, expected={e}, diff={}",
            (a - e).abs(),
        );
    }};
}

pub(crate) use assert_approx;

/// Exact decimal from a literal written as `f64` (`99.2` → `99.2`).
pub fn d(value: f64) -> Price {
    Price::from_str(&value.to_string()).expect("decimal literal")
}

/// 2024-01-01T00:00:00Z plus `minutes`.
pub fn minute(minutes: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Bar values without a position; [`CandleSeq`] assigns timestamps.
#[derive(Clone, Copy, Debug)]
pub struct Bar {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Price,
}

impl Bar {
    pub fn vol(mut self, volume: f64) -> Self {
        self.volume = d(volume);
        self
    }
}

/// Bar with volume 1.
pub fn c(open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        open: d(open),
        high: d(high),
        low: d(low),
        close: d(close),
        volume: Price::ONE,
    }
}

/// Convenience: `open == close`, as in a flat-bodied range bar.
pub fn hlc(low: f64, high: f64, close: f64) -> Bar {
    c(close, high, low, close)
}

/// One-minute candles starting at [`minute(0)`](minute).
#[derive(Default)]
pub struct CandleSeq {
    candles: Vec<Candle>,
    skipped: i64,
}

impl CandleSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, bar: Bar) -> Self {
        let at = minute(i64::try_from(self.candles.len()).unwrap() + self.skipped);
        self.candles.push(Candle::new(
            "TEST",
            Timeframe::OneMinute,
            at,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        ));
        self
    }

    pub fn repeat(mut self, bar: Bar, count: usize) -> Self {
        for _ in 0..count {
            self = self.push(bar);
        }
        self
    }

    pub fn extend(mut self, bars: impl IntoIterator<Item = Bar>) -> Self {
        for bar in bars {
            self = self.push(bar);
        }
        self
    }

    /// Leaves `minutes` empty slots before the next candle.
    pub fn gap(mut self, minutes: i64) -> Self {
        self.skipped += minutes;
        self
    }

    pub fn build(self) -> Vec<Candle> {
        self.candles
    }
}

/// Twelve falling candles, then preliminary support, selling climax,
/// automatic rally, two secondary tests, a spring and a drift back into the
/// range (indices 12 to 17), padded with six quiet candles.
pub fn accumulation() -> Vec<Candle> {
    let downtrend = (0..12).map(|i| {
        let open = 105.0 - 0.6 * f64::from(i);
        let close = open - 0.6;
        c(open, open + 0.2, close - 0.4, close).vol(90.0)
    });

    let events = [
        c(97.8, 97.9, 96.6, 96.9).vol(150.0), // PS
        c(96.8, 98.0, 95.4, 95.7).vol(230.0), // SC
        c(95.8, 98.8, 95.5, 98.4).vol(170.0), // AR
        c(96.5, 96.6, 95.5, 96.2).vol(120.0), // ST
        c(96.1, 96.7, 95.6, 96.3).vol(110.0), // ST
        c(96.4, 96.6, 94.9, 95.6).vol(140.0), // Spring
        c(96.0, 97.1, 95.7, 96.8).vol(105.0),
        c(96.7, 97.0, 95.9, 96.4).vol(100.0),
        c(96.4, 97.2, 96.0, 96.9).vol(102.0),
        c(96.8, 97.5, 96.3, 97.2).vol(108.0),
        c(97.0, 97.6, 96.5, 97.4).vol(112.0),
        c(97.5, 97.8, 96.9, 97.6).vol(115.0),
    ];
    let pad = vec![c(97.4, 97.9, 96.9, 97.2).vol(95.0); 6];

    CandleSeq::new()
        .extend(downtrend)
        .extend(events)
        .extend(pad)
        .build()
}
