use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Ohlcv, Price, Timestamp, TrendSettings};

/// Which extreme a swing marks.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwingType {
    High,
    Low,
}

impl Display for SwingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => f.write_str("HIGH"),
            Self::Low => f.write_str("LOW"),
        }
    }
}

/// Position of a swing relative to the previous swing of the same kind.
///
/// `SwingHigh` / `SwingLow` are used only when no earlier swing of that
/// kind is known.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwingClassification {
    HigherHigh,
    HigherLow,
    LowerLow,
    LowerHigh,
    SwingHigh,
    SwingLow,
}

impl SwingClassification {
    /// `HH` or `HL`.
    #[must_use]
    pub fn is_bullish(self) -> bool {
        matches!(self, Self::HigherHigh | Self::HigherLow)
    }

    /// `LL` or `LH`.
    #[must_use]
    pub fn is_bearish(self) -> bool {
        matches!(self, Self::LowerLow | Self::LowerHigh)
    }

    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::HigherHigh => "HH",
            Self::HigherLow => "HL",
            Self::LowerLow => "LL",
            Self::LowerHigh => "LH",
            Self::SwingHigh => "SH",
            Self::SwingLow => "SL",
        }
    }
}

impl Display for SwingClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// A classified pivot.
///
/// `index` is the position in the candle sequence of the call that found
/// it, so it is only comparable between swings found in the same call.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Swing {
    index: usize,
    price: Price,
    timestamp: Timestamp,
    kind: SwingType,
    classification: SwingClassification,
}

impl Swing {
    #[must_use]
    pub fn new(
        index: usize,
        price: Price,
        timestamp: Timestamp,
        kind: SwingType,
        classification: SwingClassification,
    ) -> Self {
        Self {
            index,
            price,
            timestamp,
            kind,
            classification,
        }
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn price(&self) -> Price {
        self.price
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> SwingType {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn classification(&self) -> SwingClassification {
        self.classification
    }

    #[inline]
    #[must_use]
    pub fn is_high(&self) -> bool {
        self.kind == SwingType::High
    }

    #[inline]
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.kind == SwingType::Low
    }
}

impl Display for Swing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} @ {} (#{})",
            self.classification,
            self.price,
            self.timestamp.to_rfc3339(),
            self.index
        )
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BosKind {
    Bullish,
    Bearish,
}

impl Display for BosKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => f.write_str("BULLISH"),
            Self::Bearish => f.write_str("BEARISH"),
        }
    }
}

/// A close beyond the most recent opposite swing.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct BreakOfStructure {
    kind: BosKind,
    broken_swing: Swing,
    break_price: Price,
    break_timestamp: Timestamp,
    break_index: usize,
}

impl BreakOfStructure {
    pub(crate) fn new(
        kind: BosKind,
        broken_swing: Swing,
        break_price: Price,
        break_timestamp: Timestamp,
        break_index: usize,
    ) -> Self {
        Self {
            kind,
            broken_swing,
            break_price,
            break_timestamp,
            break_index,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> BosKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn broken_swing(&self) -> &Swing {
        &self.broken_swing
    }

    #[inline]
    #[must_use]
    pub fn break_price(&self) -> Price {
        self.break_price
    }

    #[inline]
    #[must_use]
    pub fn break_timestamp(&self) -> Timestamp {
        self.break_timestamp
    }

    #[inline]
    #[must_use]
    pub fn break_index(&self) -> usize {
        self.break_index
    }

    #[inline]
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.kind == BosKind::Bullish
    }
}

impl Display for BreakOfStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} BOS @ {} through {}",
            self.kind, self.break_price, self.broken_swing
        )
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
    #[default]
    Undefined,
}

impl Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
            Self::Sideways => f.write_str("SIDEWAYS"),
            Self::Undefined => f.write_str("UNDEFINED"),
        }
    }
}

/// Unclassified pivot produced by the extraction passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Pivot {
    pub(crate) index: usize,
    pub(crate) price: Price,
    pub(crate) timestamp: Timestamp,
    pub(crate) kind: SwingType,
}

/// Lookback confirmation: candle `i` is a swing high when its high is at
/// least every high within `lookback` bars on both sides (swing low
/// symmetric). Both labels may land on the same index, high first.
pub(crate) fn lookback_pivots<C: Ohlcv>(candles: &[C], lookback: usize) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    if candles.len() < 2 * lookback + 1 {
        return pivots;
    }

    for i in lookback..candles.len() - lookback {
        let candle = &candles[i];
        let neighbours = (1..=lookback).flat_map(|j| [&candles[i - j], &candles[i + j]]);

        let mut is_high = true;
        let mut is_low = true;
        for other in neighbours {
            is_high &= candle.high() >= other.high();
            is_low &= candle.low() <= other.low();
        }

        if is_high {
            pivots.push(Pivot {
                index: i,
                price: candle.high(),
                timestamp: candle.open_time(),
                kind: SwingType::High,
            });
        }
        if is_low {
            pivots.push(Pivot {
                index: i,
                price: candle.low(),
                timestamp: candle.open_time(),
                kind: SwingType::Low,
            });
        }
    }

    pivots
}

/// Zigzag extraction.
///
/// Anchored on the first close with no direction. The first significant
/// close away from the anchor records the anchor's opposite extreme and
/// starts seeking in the move's direction. While seeking highs a higher high
/// extends the extremum and a significant drop of the low confirms the
/// extremum as a `High` (and vice versa). The last extremum is emitted as a
/// provisional pivot.
pub(crate) fn zigzag_pivots<C: Ohlcv>(candles: &[C], settings: &TrendSettings) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    let Some(anchor) = candles.first() else {
        return pivots;
    };
    if candles.len() < 2 {
        return pivots;
    }

    let pivot_at = |index: usize, price: Price, kind: SwingType| Pivot {
        index,
        price,
        timestamp: candles[index].open_time(),
        kind,
    };

    let mut seeking: Option<SwingType> = None;
    let mut extreme = anchor.close();
    let mut extreme_index = 0;

    for (i, candle) in candles.iter().enumerate().skip(1) {
        match seeking {
            None => {
                if !settings.is_significant_move(extreme, candle.close()) {
                    continue;
                }
                if candle.close() > extreme {
                    pivots.push(pivot_at(0, anchor.low(), SwingType::Low));
                    seeking = Some(SwingType::High);
                    extreme = candle.high();
                    extreme_index = i;
                } else if candle.close() < extreme {
                    pivots.push(pivot_at(0, anchor.high(), SwingType::High));
                    seeking = Some(SwingType::Low);
                    extreme = candle.low();
                    extreme_index = i;
                }
            }
            Some(SwingType::High) => {
                if candle.high() >= extreme {
                    extreme = candle.high();
                    extreme_index = i;
                } else if settings.is_significant_move(extreme, candle.low()) {
                    pivots.push(pivot_at(extreme_index, extreme, SwingType::High));
                    seeking = Some(SwingType::Low);
                    extreme = candle.low();
                    extreme_index = i;
                }
            }
            Some(SwingType::Low) => {
                if candle.low() <= extreme {
                    extreme = candle.low();
                    extreme_index = i;
                } else if settings.is_significant_move(extreme, candle.high()) {
                    pivots.push(pivot_at(extreme_index, extreme, SwingType::Low));
                    seeking = Some(SwingType::High);
                    extreme = candle.high();
                    extreme_index = i;
                }
            }
        }
    }

    if let Some(kind) = seeking {
        pivots.push(pivot_at(extreme_index, extreme, kind));
    }

    pivots
}

/// Classifies `pivot` against the most recent earlier swing of its kind.
pub(crate) fn classify(pivot: &Pivot, previous: Option<&Swing>) -> SwingClassification {
    match (pivot.kind, previous) {
        (SwingType::High, None) => SwingClassification::SwingHigh,
        (SwingType::Low, None) => SwingClassification::SwingLow,
        (SwingType::High, Some(prev)) if pivot.price > prev.price => {
            SwingClassification::HigherHigh
        }
        (SwingType::High, Some(_)) => SwingClassification::LowerHigh,
        (SwingType::Low, Some(prev)) if pivot.price > prev.price => SwingClassification::HigherLow,
        (SwingType::Low, Some(_)) => SwingClassification::LowerLow,
    }
}

impl Pivot {
    pub(crate) fn into_swing(self, classification: SwingClassification) -> Swing {
        Swing::new(
            self.index,
            self.price,
            self.timestamp,
            self.kind,
            classification,
        )
    }
}
