use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A price or volume value.
///
/// Exact decimal so that threshold comparisons ("penetration ≤ 4% of the
/// range") never drift through binary rounding.
pub type Price = Decimal;

/// Bar open timestamp.
///
/// Engines expect these to be ordered oldest-first within one call. A
/// sequence whose first timestamp is later than its last is treated as
/// newest-first and reversed before analysis.
pub type Timestamp = DateTime<Utc>;

/// OHLCV bar data used as input to all engines.
///
/// Implement this on your own kline/candle type to avoid per-call
/// conversion. Engines accept `&[impl Ohlcv]`.
///
/// # Example
///
/// ```
/// use market_structure_ta::{Ohlcv, Price, Timestamp};
///
/// struct MyKline {
///     o: Price, h: Price, l: Price, c: Price,
///     ts: Timestamp,
/// }
///
/// impl Ohlcv for MyKline {
///     fn open(&self) -> Price { self.o }
///     fn high(&self) -> Price { self.h }
///     fn low(&self) -> Price { self.l }
///     fn close(&self) -> Price { self.c }
///     fn open_time(&self) -> Timestamp { self.ts }
/// }
/// ```
pub trait Ohlcv {
    /// Opening price of the bar.
    fn open(&self) -> Price;

    /// Highest price during the bar.
    fn high(&self) -> Price;

    /// Lowest price during the bar.
    fn low(&self) -> Price;

    /// Closing price of the bar.
    fn close(&self) -> Price;

    /// Bar open timestamp.
    fn open_time(&self) -> Timestamp;

    /// Trade volume during the bar. Defaults to zero.
    ///
    /// Only the Wyckoff checks of the liquidity engine read volume; a zero
    /// average volume disables the volume conditions instead of failing.
    fn volume(&self) -> Price {
        Decimal::ZERO
    }

    /// High minus low.
    fn range(&self) -> Price {
        self.high() - self.low()
    }
}

impl<T: Ohlcv + ?Sized> Ohlcv for &T {
    #[inline]
    fn open(&self) -> Price {
        (**self).open()
    }

    #[inline]
    fn high(&self) -> Price {
        (**self).high()
    }

    #[inline]
    fn low(&self) -> Price {
        (**self).low()
    }

    #[inline]
    fn close(&self) -> Price {
        (**self).close()
    }

    #[inline]
    fn open_time(&self) -> Timestamp {
        (**self).open_time()
    }

    #[inline]
    fn volume(&self) -> Price {
        (**self).volume()
    }
}

/// Returns `true` when the sequence is presented newest-first.
pub(crate) fn is_newest_first(candles: &[impl Ohlcv]) -> bool {
    match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => first.open_time() > last.open_time(),
        _ => false,
    }
}
