use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Ohlcv, Price, Timeframe, Timestamp};

/// OHLCV candle for one symbol and timeframe.
///
/// Immutable once built. Prices and volume are exact decimals and serialize
/// as strings, so a round trip through JSON reproduces the same digits and
/// scale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candle {
    symbol: String,
    timeframe: Timeframe,
    timestamp: Timestamp,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    volume: Price,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Price,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[inline]
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    #[must_use]
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Ohlcv for Candle {
    #[inline]
    fn open(&self) -> Price {
        self.open
    }

    #[inline]
    fn high(&self) -> Price {
        self.high
    }

    #[inline]
    fn low(&self) -> Price {
        self.low
    }

    #[inline]
    fn close(&self) -> Price {
        self.close
    }

    #[inline]
    fn open_time(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    fn volume(&self) -> Price {
        self.volume
    }
}

impl Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} @ {} O:{} H:{} L:{} C:{} V:{}",
            self.symbol,
            self.timeframe,
            self.timestamp.to_rfc3339(),
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}
