use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Ohlcv, Price, Timestamp, TrendDirection, TrendSignal, ohlcv::is_newest_first};

/// Confidence a trend verdict needs before it drives a decision on its own.
const MIN_TREND_CONFIDENCE: f64 = 0.3;
/// Closes per momentum average; the fallback compares the latest block with
/// the one before it.
const MOMENTUM_WINDOW: usize = 10;
/// Relative gap between the two averages that counts as momentum (0.1%).
const MOMENTUM_BAND: Price = Price::from_parts(1, 0, 0, false, 3);

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSide {
    Buy,
    Sell,
}

impl Display for DecisionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// What produced a [`TradingDecision`].
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// A confident up or down verdict of [`Trend`](crate::Trend).
    Trend,
    /// Average of the last closes against the block before them.
    Momentum,
}

/// Directional call at the latest candle, derived from a [`TrendSignal`].
///
/// A trend verdict with confidence above 0.3 decides on its own: up buys,
/// down sells, anything else makes no call. Below that, the mean of the last
/// ten closes is compared with the mean of the ten before; a gap beyond 0.1%
/// either way decides.
///
/// # Example
///
/// ```
/// use market_structure_ta::{Candle, DecisionSide, PivotMethod, Timeframe, Trend, TradingDecision};
/// use market_structure_ta::{IndicatorSettings, IndicatorSettingsBuilder, TrendSettings};
/// use chrono::{Duration, TimeZone, Utc};
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let candles: Vec<Candle> = (0..20)
///     .map(|i| {
///         let close = if i < 10 { Decimal::from(100) } else { Decimal::from(101) };
///         Candle::new("TEST", Timeframe::OneMinute, t0 + Duration::minutes(i),
///             close, close, close, close, Decimal::ONE)
///     })
///     .collect();
///
/// let settings = TrendSettings::builder()
///     .min_percent_move(dec!(0.05))
///     .pivot_method(PivotMethod::ZigZag)
///     .build()
///     .unwrap();
/// // A 1% step is no swing at 5%, so momentum decides.
/// let signal = Trend::new(settings).analyze(&candles);
/// let decision = TradingDecision::from_trend(&signal, &candles).unwrap();
/// assert_eq!(decision.side(), DecisionSide::Buy);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingDecision {
    time: Timestamp,
    side: DecisionSide,
    price: Price,
    basis: DecisionBasis,
    reason: String,
}

impl TradingDecision {
    /// `None` without candles, for a confident verdict that is neither up
    /// nor down, or when momentum is missing or inside the band.
    #[must_use]
    pub fn from_trend(signal: &TrendSignal, candles: &[impl Ohlcv]) -> Option<Self> {
        if is_newest_first(candles) {
            let ordered: Vec<_> = candles.iter().rev().collect();
            Self::from_ordered(signal, &ordered)
        } else {
            Self::from_ordered(signal, candles)
        }
    }

    fn from_ordered<C: Ohlcv>(signal: &TrendSignal, candles: &[C]) -> Option<Self> {
        let last = candles.last()?;
        let at = |side: DecisionSide, basis: DecisionBasis, reason: String| Self {
            time: last.open_time(),
            side,
            price: last.close(),
            basis,
            reason,
        };

        let decision = if signal.confidence() > MIN_TREND_CONFIDENCE {
            let confidence = signal.confidence();
            match signal.trend() {
                TrendDirection::Up => Some(at(
                    DecisionSide::Buy,
                    DecisionBasis::Trend,
                    format!("Trend up (confidence {confidence:.2})"),
                )),
                TrendDirection::Down => Some(at(
                    DecisionSide::Sell,
                    DecisionBasis::Trend,
                    format!("Trend down (confidence {confidence:.2})"),
                )),
                TrendDirection::Sideways | TrendDirection::Undefined => None,
            }
        } else {
            momentum(candles).map(|(side, change)| {
                let sign = if change.is_sign_positive() { "+" } else { "" };
                let word = match side {
                    DecisionSide::Buy => "Positive",
                    DecisionSide::Sell => "Negative",
                };
                at(
                    side,
                    DecisionBasis::Momentum,
                    format!("{word} momentum ({sign}{change:.2}%)"),
                )
            })
        };

        if let Some(decision) = &decision {
            debug!(%decision, "trading decision");
        }
        decision
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn side(&self) -> DecisionSide {
        self.side
    }

    /// Close of the latest candle.
    #[inline]
    #[must_use]
    pub fn price(&self) -> Price {
        self.price
    }

    #[inline]
    #[must_use]
    pub fn basis(&self) -> DecisionBasis {
        self.basis
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for TradingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} @ {}: {}",
            self.side,
            self.price,
            self.time.to_rfc3339(),
            self.reason
        )
    }
}

/// Side and percent change of the last block's mean close over the block
/// before it, when the change leaves the band.
fn momentum<C: Ohlcv>(candles: &[C]) -> Option<(DecisionSide, Price)> {
    let n = candles.len();
    if n < 2 * MOMENTUM_WINDOW {
        return None;
    }

    let mean = |block: &[C]| {
        block.iter().map(Ohlcv::close).sum::<Price>() / Price::from(block.len())
    };
    let recent = mean(&candles[n - MOMENTUM_WINDOW..]);
    let previous = mean(&candles[n - 2 * MOMENTUM_WINDOW..n - MOMENTUM_WINDOW]);
    if previous <= Price::ZERO {
        return None;
    }

    let change = (recent / previous - Price::ONE) * Price::ONE_HUNDRED;
    if recent > previous * (Price::ONE + MOMENTUM_BAND) {
        Some((DecisionSide::Buy, change))
    } else if recent < previous * (Price::ONE - MOMENTUM_BAND) {
        Some((DecisionSide::Sell, change))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{CandleSeq, c, hlc};
    use crate::{
        Candle, IndicatorSettings, IndicatorSettingsBuilder, PivotMethod, Trend, TrendSettings,
    };
    use rust_decimal_macros::dec;

    fn zigzag(min_percent: Price) -> Trend {
        Trend::new(
            TrendSettings::builder()
                .min_percent_move(min_percent)
                .pivot_method(PivotMethod::ZigZag)
                .build()
                .unwrap(),
        )
    }

    /// Ten closes at `before`, then ten at `after`; moves too small for a
    /// 5% zigzag.
    fn step(before: f64, after: f64) -> Vec<Candle> {
        CandleSeq::new()
            .repeat(hlc(before - 0.5, before + 0.5, before), 10)
            .repeat(hlc(after - 0.5, after + 0.5, after), 10)
            .build()
    }

    mod trend {
        use super::*;

        #[test]
        fn confident_up_buys_at_last_close() {
            let candles = CandleSeq::new()
                .push(c(100.0, 101.0, 99.0, 100.0))
                .push(c(101.0, 105.0, 100.0, 104.0))
                .push(c(103.0, 103.0, 97.0, 98.0))
                .push(c(104.0, 110.0, 104.0, 109.0))
                .push(c(105.0, 108.0, 102.0, 103.0))
                .push(c(108.0, 120.0, 107.0, 118.0))
                .build();
            let signal = zigzag(dec!(0.01)).analyze(&candles);

            let decision = TradingDecision::from_trend(&signal, &candles).expect("decision");
            assert_eq!(decision.side(), DecisionSide::Buy);
            assert_eq!(decision.basis(), DecisionBasis::Trend);
            assert_eq!(decision.price(), dec!(118.0));
            assert_eq!(decision.time(), candles[5].open_time());
            assert!(decision.reason().starts_with("Trend up (confidence 0."));
        }

        #[test]
        fn confident_down_sells() {
            let candles = CandleSeq::new()
                .push(c(120.0, 121.0, 119.0, 120.0))
                .push(c(119.0, 120.0, 115.0, 116.0))
                .push(c(117.0, 123.0, 117.0, 122.0))
                .push(c(116.0, 116.0, 110.0, 111.0))
                .push(c(115.0, 118.0, 112.0, 117.0))
                .push(c(112.0, 113.0, 100.0, 102.0))
                .build();
            let signal = zigzag(dec!(0.01)).analyze(&candles);

            let decision = TradingDecision::from_trend(&signal, &candles).expect("decision");
            assert_eq!(decision.side(), DecisionSide::Sell);
            assert_eq!(decision.basis(), DecisionBasis::Trend);
        }

        #[test]
        fn newest_first_decides_on_latest_candle() {
            let candles = step(100.0, 101.0);
            let reversed: Vec<Candle> = candles.iter().rev().cloned().collect();
            let signal = zigzag(dec!(0.05)).analyze(&candles);

            assert_eq!(
                TradingDecision::from_trend(&signal, &reversed),
                TradingDecision::from_trend(&signal, &candles)
            );
        }
    }

    mod momentum {
        use super::*;

        #[test]
        fn rising_block_buys() {
            let candles = step(100.0, 101.0);
            let signal = zigzag(dec!(0.05)).analyze(&candles);
            assert_eq!(signal.trend(), TrendDirection::Undefined);

            let decision = TradingDecision::from_trend(&signal, &candles).expect("decision");
            assert_eq!(decision.side(), DecisionSide::Buy);
            assert_eq!(decision.basis(), DecisionBasis::Momentum);
            assert_eq!(decision.reason(), "Positive momentum (+1.00%)");
        }

        #[test]
        fn falling_block_sells() {
            let candles = step(100.0, 99.0);
            let signal = zigzag(dec!(0.05)).analyze(&candles);

            let decision = TradingDecision::from_trend(&signal, &candles).expect("decision");
            assert_eq!(decision.side(), DecisionSide::Sell);
            assert_eq!(decision.reason(), "Negative momentum (-1.00%)");
            assert_eq!(
                decision.to_string(),
                format!(
                    "SELL 99 @ {}: Negative momentum (-1.00%)",
                    candles[19].open_time().to_rfc3339()
                )
            );
        }

        #[test]
        fn change_inside_band_makes_no_call() {
            let candles = step(100.0, 100.05);
            let signal = zigzag(dec!(0.05)).analyze(&candles);
            assert!(TradingDecision::from_trend(&signal, &candles).is_none());
        }

        #[test]
        fn needs_two_full_blocks() {
            let candles = step(100.0, 101.0);
            let signal = zigzag(dec!(0.05)).analyze(&candles[1..]);
            assert!(TradingDecision::from_trend(&signal, &candles[1..]).is_none());
        }

        #[test]
        fn no_candles_no_call() {
            let signal = zigzag(dec!(0.05)).analyze(&Vec::<Candle>::new());
            assert!(TradingDecision::from_trend(&signal, &Vec::<Candle>::new()).is_none());
        }
    }
}
