use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Indicator, IndicatorSettings, IndicatorSettingsBuilder, Ohlcv, Price, Result,
    error::ensure,
    ohlcv::is_newest_first,
    ring_buffer::RingBuffer,
    swing::{
        BosKind, BreakOfStructure, Pivot, Swing, SwingType, TrendDirection, classify,
        lookback_pivots, zigzag_pivots,
    },
};

/// How pivots are extracted from a candle sequence.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum PivotMethod {
    /// A bar is a pivot when it is the extreme of `lookback_bars` bars on
    /// both sides.
    #[default]
    Lookback,
    /// Alternating extremes separated by significant moves.
    ZigZag,
}

impl Display for PivotMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookback => f.write_str("Lookback"),
            Self::ZigZag => f.write_str("ZigZag"),
        }
    }
}

/// Settings for the swing/trend engine ([`Trend`]).
///
/// # Example
///
/// ```
/// use market_structure_ta::{IndicatorSettings, IndicatorSettingsBuilder, PivotMethod, TrendSettings};
/// use rust_decimal_macros::dec;
///
/// let settings = TrendSettings::builder()
///     .min_percent_move(dec!(0.01))
///     .pivot_method(PivotMethod::ZigZag)
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.max_swings(), 20);
/// assert!(TrendSettings::builder().max_swings(0).build().is_err());
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct TrendSettings {
    max_swings: usize,
    min_percent_move: Price,
    min_price_move: Option<Price>,
    lookback_bars: usize,
    pivot_method: PivotMethod,
}

impl IndicatorSettings for TrendSettings {
    type Builder = TrendSettingsBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        TrendSettingsBuilder::new()
    }
}

impl Default for TrendSettings {
    fn default() -> Self {
        let b = TrendSettingsBuilder::new();
        Self {
            max_swings: b.max_swings,
            min_percent_move: b.min_percent_move,
            min_price_move: b.min_price_move,
            lookback_bars: b.lookback_bars,
            pivot_method: b.pivot_method,
        }
    }
}

impl TrendSettings {
    /// Capacity of the swing memory kept across calls.
    #[inline]
    #[must_use]
    pub fn max_swings(&self) -> usize {
        self.max_swings
    }

    /// Minimum relative move, as a fraction (`0.003` = 0.3%).
    #[inline]
    #[must_use]
    pub fn min_percent_move(&self) -> Price {
        self.min_percent_move
    }

    #[inline]
    #[must_use]
    pub fn min_price_move(&self) -> Option<Price> {
        self.min_price_move
    }

    #[inline]
    #[must_use]
    pub fn lookback_bars(&self) -> usize {
        self.lookback_bars
    }

    #[inline]
    #[must_use]
    pub fn pivot_method(&self) -> PivotMethod {
        self.pivot_method
    }

    /// Minimum number of candles before any pivot can be extracted.
    #[must_use]
    pub fn min_candles(&self) -> usize {
        match self.pivot_method {
            PivotMethod::Lookback => 2 * self.lookback_bars + 1,
            PivotMethod::ZigZag => 2,
        }
    }

    /// Whether the move `from → to` clears both thresholds.
    ///
    /// A zero reference price always counts as significant.
    #[must_use]
    pub fn is_significant_move(&self, from: Price, to: Price) -> bool {
        let change = (to - from).abs();

        if let Some(min) = self.min_price_move
            && change < min
        {
            return false;
        }

        if from.is_zero() {
            return true;
        }

        change / from.abs() >= self.min_percent_move
    }
}

impl Display for TrendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrendSettings({}, {}, {}, {}",
            self.pivot_method, self.max_swings, self.min_percent_move, self.lookback_bars
        )?;
        if let Some(min) = self.min_price_move {
            write!(f, ", min_price_move: {min}")?;
        }
        f.write_str(")")
    }
}

/// Builder for [`TrendSettings`].
///
/// Defaults: `max_swings` = 20, `min_percent_move` = 0.003,
/// `lookback_bars` = 3, no absolute threshold,
/// [`PivotMethod::Lookback`].
pub struct TrendSettingsBuilder {
    max_swings: usize,
    min_percent_move: Price,
    min_price_move: Option<Price>,
    lookback_bars: usize,
    pivot_method: PivotMethod,
}

impl TrendSettingsBuilder {
    fn new() -> Self {
        Self {
            max_swings: 20,
            min_percent_move: Price::new(3, 3),
            min_price_move: None,
            lookback_bars: 3,
            pivot_method: PivotMethod::Lookback,
        }
    }

    #[inline]
    #[must_use]
    pub fn max_swings(mut self, max_swings: usize) -> Self {
        self.max_swings = max_swings;
        self
    }

    #[inline]
    #[must_use]
    pub fn min_percent_move(mut self, min_percent_move: Price) -> Self {
        self.min_percent_move = min_percent_move;
        self
    }

    #[inline]
    #[must_use]
    pub fn min_price_move(mut self, min_price_move: Option<Price>) -> Self {
        self.min_price_move = min_price_move;
        self
    }

    #[inline]
    #[must_use]
    pub fn lookback_bars(mut self, lookback_bars: usize) -> Self {
        self.lookback_bars = lookback_bars;
        self
    }

    #[inline]
    #[must_use]
    pub fn pivot_method(mut self, pivot_method: PivotMethod) -> Self {
        self.pivot_method = pivot_method;
        self
    }
}

impl IndicatorSettingsBuilder<TrendSettings> for TrendSettingsBuilder {
    fn build(self) -> Result<TrendSettings> {
        ensure(self.max_swings > 0, "max_swings", "must be positive")?;
        ensure(
            !self.min_percent_move.is_sign_negative(),
            "min_percent_move",
            "must not be negative",
        )?;
        ensure(
            self.min_percent_move < Price::ONE,
            "min_percent_move",
            "must be below 1",
        )?;
        if let Some(min) = self.min_price_move {
            ensure(
                min > Price::ZERO,
                "min_price_move",
                "must be positive when set",
            )?;
        }
        ensure(self.lookback_bars > 0, "lookback_bars", "must be positive")?;

        Ok(TrendSettings {
            max_swings: self.max_swings,
            min_percent_move: self.min_percent_move,
            min_price_move: self.min_price_move,
            lookback_bars: self.lookback_bars,
            pivot_method: self.pivot_method,
        })
    }
}

/// Result of one [`Trend::analyze`] call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    trend: TrendDirection,
    confidence: f64,
    swings: Vec<Swing>,
    last_bos: Option<BreakOfStructure>,
    reason: String,
}

impl TrendSignal {
    fn neutral(reason: String) -> Self {
        Self {
            trend: TrendDirection::Undefined,
            confidence: 0.0,
            swings: Vec::new(),
            last_bos: None,
            reason,
        }
    }

    #[inline]
    #[must_use]
    pub fn trend(&self) -> TrendDirection {
        self.trend
    }

    /// In `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Swing memory after this call, oldest first.
    #[inline]
    #[must_use]
    pub fn swings(&self) -> &[Swing] {
        &self.swings
    }

    #[inline]
    #[must_use]
    pub fn last_bos(&self) -> Option<&BreakOfStructure> {
        self.last_bos.as_ref()
    }

    /// Human-readable trace of the decision.
    #[inline]
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for TrendSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (confidence {:.2}, {} swings",
            self.trend,
            self.confidence,
            self.swings.len()
        )?;
        if let Some(bos) = &self.last_bos {
            write!(f, ", {bos}")?;
        }
        write!(f, "): {}", self.reason)
    }
}

/// Swing-structure trend engine.
///
/// Extracts pivots, classifies them as higher/lower highs and lows against
/// a bounded swing memory that survives across calls, detects breaks of
/// structure on the latest close, and derives a direction with confidence.
///
/// # Example
///
/// ```
/// use market_structure_ta::{Candle, PivotMethod, Timeframe, Trend, TrendDirection, TrendSettings};
/// use market_structure_ta::{IndicatorSettings, IndicatorSettingsBuilder};
/// use chrono::{Duration, TimeZone, Utc};
/// use rust_decimal_macros::dec;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let bars = [
///     (dec!(100), dec!(101), dec!(99), dec!(100)),
///     (dec!(101), dec!(105), dec!(100), dec!(104)),
///     (dec!(103), dec!(103), dec!(97), dec!(98)),
///     (dec!(104), dec!(110), dec!(104), dec!(109)),
///     (dec!(105), dec!(108), dec!(102), dec!(103)),
///     (dec!(108), dec!(120), dec!(107), dec!(118)),
/// ];
/// let candles: Vec<Candle> = bars
///     .iter()
///     .zip(0..)
///     .map(|(&(o, h, l, c), i)| {
///         Candle::new("TEST", Timeframe::OneMinute, t0 + Duration::minutes(i), o, h, l, c, dec!(1))
///     })
///     .collect();
///
/// let settings = TrendSettings::builder()
///     .min_percent_move(dec!(0.01))
///     .pivot_method(PivotMethod::ZigZag)
///     .build()
///     .unwrap();
/// let mut trend = Trend::new(settings);
///
/// let signal = trend.analyze(&candles);
/// assert_eq!(signal.trend(), TrendDirection::Up);
/// assert!(signal.confidence() > 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct Trend {
    settings: TrendSettings,
    swings: RingBuffer<Swing>,
    last_bos: Option<BreakOfStructure>,
    current: TrendDirection,
}

impl Indicator for Trend {
    type Settings = TrendSettings;
    type Output = TrendSignal;

    fn new(settings: Self::Settings) -> Self {
        Self {
            swings: RingBuffer::new(settings.max_swings),
            settings,
            last_bos: None,
            current: TrendDirection::Undefined,
        }
    }

    #[inline]
    fn name(&self) -> &'static str {
        "trend"
    }

    fn analyze(&mut self, candles: &[impl Ohlcv]) -> TrendSignal {
        if is_newest_first(candles) {
            let ordered: Vec<_> = candles.iter().rev().collect();
            self.analyze_ordered(&ordered)
        } else {
            self.analyze_ordered(candles)
        }
    }

    fn reset(&mut self) {
        self.swings.clear();
        self.last_bos = None;
        self.current = TrendDirection::Undefined;
    }
}

impl Trend {
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    /// Swing memory, oldest first.
    #[must_use]
    pub fn swings(&self) -> Vec<Swing> {
        self.swings.to_vec()
    }

    #[inline]
    #[must_use]
    pub fn last_bos(&self) -> Option<&BreakOfStructure> {
        self.last_bos.as_ref()
    }

    /// Direction reported by the last call.
    #[inline]
    #[must_use]
    pub fn current_trend(&self) -> TrendDirection {
        self.current
    }

    fn analyze_ordered<C: Ohlcv>(&mut self, candles: &[C]) -> TrendSignal {
        let required = self.settings.min_candles();
        if candles.len() < required {
            return TrendSignal::neutral(format!(
                "Insufficient data: {} candles, {required} required; trend undefined.",
                candles.len()
            ));
        }

        let pivots = match self.settings.pivot_method {
            PivotMethod::Lookback => lookback_pivots(candles, self.settings.lookback_bars),
            PivotMethod::ZigZag => zigzag_pivots(candles, &self.settings),
        };
        self.register_pivots(&pivots);
        self.detect_bos(candles);

        let trend = self.determine_trend();
        self.current = trend;

        TrendSignal {
            trend,
            confidence: self.confidence(trend),
            swings: self.swings.to_vec(),
            last_bos: self.last_bos.clone(),
            reason: self.reason(trend),
        }
    }

    /// Pivots older than the newest swing in memory, or already in it, are
    /// skipped so that overlapping or shifted windows keep memory in
    /// chronological order.
    fn register_pivots(&mut self, pivots: &[Pivot]) {
        for pivot in pivots {
            if let Some(newest) = self.swings.last()
                && pivot.timestamp < newest.timestamp()
            {
                trace!(index = pivot.index, kind = %pivot.kind, "pivot older than swing memory");
                continue;
            }
            let known = self
                .swings
                .iter()
                .any(|s| s.kind() == pivot.kind && s.timestamp() == pivot.timestamp);
            if known {
                trace!(index = pivot.index, kind = %pivot.kind, "pivot already in memory");
                continue;
            }

            match self.settings.pivot_method {
                PivotMethod::Lookback => {
                    let swing = pivot.into_swing(classify(pivot, self.previous(pivot.kind, 0)));
                    self.push(swing);
                }
                PivotMethod::ZigZag => self.register_alternating(*pivot),
            }
        }
    }

    /// Zigzag memory alternates highs and lows. A pivot of the same kind as
    /// the newest swing replaces it when at least as extreme and is dropped
    /// otherwise; a pivot of the other kind needs a significant move from
    /// the newest swing.
    fn register_alternating(&mut self, pivot: Pivot) {
        let Some((kind, price)) = self.swings.last().map(|s| (s.kind(), s.price())) else {
            let swing = pivot.into_swing(classify(&pivot, None));
            self.push(swing);
            return;
        };

        if kind == pivot.kind {
            let more_extreme = match kind {
                SwingType::High => pivot.price >= price,
                SwingType::Low => pivot.price <= price,
            };
            if more_extreme {
                let swing = pivot.into_swing(classify(&pivot, self.previous(kind, 1)));
                trace!(from = %price, to = %swing.price(), %kind, "extremum moved");
                self.swings.replace(swing);
            } else {
                trace!(index = pivot.index, %kind, "less extreme than newest swing");
            }
            return;
        }

        if !self.settings.is_significant_move(price, pivot.price) {
            trace!(index = pivot.index, kind = %pivot.kind, "insignificant swing dropped");
            return;
        }
        let swing = pivot.into_swing(classify(&pivot, self.previous(pivot.kind, 0)));
        self.push(swing);
    }

    /// Most recent swing of `kind` in memory, ignoring the newest `skip`
    /// entries.
    fn previous(&self, kind: SwingType, skip: usize) -> Option<&Swing> {
        self.swings.iter().rev().skip(skip).find(|s| s.kind() == kind)
    }

    fn push(&mut self, swing: Swing) {
        if let Some(evicted) = self.swings.push(swing) {
            trace!(%evicted, "swing memory full, oldest swing dropped");
        }
    }

    fn detect_bos<C: Ohlcv>(&mut self, candles: &[C]) {
        if self.swings.len() < 2 {
            return;
        }
        let Some(current) = candles.last() else {
            return;
        };
        let close = current.close();

        let last_high = self.swings.iter().rev().find(|s| s.is_high());
        let last_low = self.swings.iter().rev().find(|s| s.is_low());

        let broken = match (last_high, last_low) {
            (Some(high), _) if close > high.price() => self
                .settings
                .is_significant_move(high.price(), close)
                .then(|| (BosKind::Bullish, high.clone())),
            (_, Some(low)) if close < low.price() => self
                .settings
                .is_significant_move(low.price(), close)
                .then(|| (BosKind::Bearish, low.clone())),
            _ => None,
        };

        if let Some((kind, swing)) = broken {
            debug!(%kind, broken = %swing.price(), %close, "break of structure");
            self.current = match kind {
                BosKind::Bullish => TrendDirection::Up,
                BosKind::Bearish => TrendDirection::Down,
            };
            self.last_bos = Some(BreakOfStructure::new(
                kind,
                swing,
                close,
                current.open_time(),
                candles.len() - 1,
            ));
        }
    }

    fn determine_trend(&self) -> TrendDirection {
        let highs: Vec<&Swing> = self.swings.iter().filter(|s| s.is_high()).collect();
        let lows: Vec<&Swing> = self.swings.iter().filter(|s| s.is_low()).collect();

        if let ([.., h1, h2], [.., l1, l2]) = (highs.as_slice(), lows.as_slice()) {
            let highs_rising = h2.price() > h1.price();
            let highs_falling = h2.price() < h1.price();
            let lows_rising = l2.price() > l1.price();
            let lows_falling = l2.price() < l1.price();

            if highs_rising && lows_rising {
                return TrendDirection::Up;
            }
            if highs_falling && lows_falling {
                return TrendDirection::Down;
            }
            if highs_falling && lows_rising {
                return TrendDirection::Sideways;
            }
        }

        if let (Some(last), Some(&last_high), Some(&last_low)) =
            (self.swings.last(), highs.last(), lows.last())
        {
            match last.kind() {
                SwingType::Low => {
                    let lower_low = lows
                        .len()
                        .checked_sub(2)
                        .is_some_and(|i| last_low.price() < lows[i].price());
                    let dropped = last_low.price() < last_high.price()
                        && self
                            .settings
                            .is_significant_move(last_high.price(), last_low.price());
                    if lower_low || dropped {
                        return TrendDirection::Down;
                    }
                }
                SwingType::High => {
                    let higher_high = highs
                        .len()
                        .checked_sub(2)
                        .is_some_and(|i| last_high.price() > highs[i].price());
                    let rallied = last_high.price() > last_low.price()
                        && self
                            .settings
                            .is_significant_move(last_low.price(), last_high.price());
                    if higher_high || rallied {
                        return TrendDirection::Up;
                    }
                }
            }
        }

        match self.last_bos.as_ref().map(BreakOfStructure::kind) {
            Some(BosKind::Bullish) => TrendDirection::Up,
            Some(BosKind::Bearish) => TrendDirection::Down,
            None => TrendDirection::Undefined,
        }
    }

    fn confidence(&self, trend: TrendDirection) -> f64 {
        if trend == TrendDirection::Undefined {
            return if self.swings.is_empty() { 0.0 } else { 0.25 };
        }

        #[allow(clippy::cast_precision_loss)]
        let depth = (self.swings.len() as f64 / self.settings.max_swings as f64).min(1.0);

        let bos = if self.last_bos.is_some() { 0.2 } else { 0.0 };

        let recent: Vec<_> = self.swings.iter().rev().take(4).collect();
        let bullish = recent.iter().filter(|s| s.classification().is_bullish()).count();
        let bearish = recent.iter().filter(|s| s.classification().is_bearish()).count();
        let structure = if bullish >= 3 || bearish >= 3 { 0.2 } else { 0.0 };

        (0.3 + 0.3 * depth + bos + structure).clamp(0.0, 1.0)
    }

    fn reason(&self, trend: TrendDirection) -> String {
        if self.swings.is_empty() {
            return "No valid swings detected; trend undefined.".to_owned();
        }

        let recent: Vec<String> = self
            .swings
            .iter()
            .skip(self.swings.len().saturating_sub(4))
            .map(|s| s.classification().to_string())
            .collect();
        let mut parts = vec![format!("Recent structure: {}", recent.join(" -> "))];

        if let Some(bos) = &self.last_bos {
            parts.push(format!(
                "{} break of structure at {}",
                if bos.is_bullish() { "Bullish" } else { "Bearish" },
                bos.break_price()
            ));
        }

        parts.push(
            match trend {
                TrendDirection::Up => "Higher highs and higher lows; trend up",
                TrendDirection::Down => "Lower highs and lower lows; trend down",
                TrendDirection::Sideways => "Lower high with higher low; range contraction",
                TrendDirection::Undefined => "Structure lacks confirmation; trend undefined",
            }
            .to_owned(),
        );

        parts.join(". ") + "."
    }
}

impl Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trend({}, {} swings, {})",
            self.settings,
            self.swings.len(),
            self.current
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;
    use crate::test_util::{CandleSeq, c};
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

    fn rising() -> Vec<Candle> {
        CandleSeq::new()
            .push(c(100.0, 101.0, 99.0, 100.0))
            .push(c(101.0, 105.0, 100.0, 104.0))
            .push(c(103.0, 103.0, 97.0, 98.0))
            .push(c(104.0, 110.0, 104.0, 109.0))
            .push(c(105.0, 108.0, 102.0, 103.0))
            .push(c(108.0, 120.0, 107.0, 118.0))
            .build()
    }

    fn falling() -> Vec<Candle> {
        CandleSeq::new()
            .push(c(120.0, 121.0, 119.0, 120.0))
            .push(c(119.0, 120.0, 115.0, 116.0))
            .push(c(117.0, 123.0, 117.0, 122.0))
            .push(c(116.0, 116.0, 110.0, 111.0))
            .push(c(115.0, 118.0, 112.0, 117.0))
            .push(c(112.0, 113.0, 100.0, 102.0))
            .build()
    }

    fn contracting() -> Vec<Candle> {
        CandleSeq::new()
            .push(c(100.0, 100.0, 100.0, 100.0))
            .push(c(100.0, 110.0, 100.0, 109.0))
            .push(c(109.0, 109.0, 102.0, 103.0))
            .push(c(103.0, 108.0, 103.0, 107.0))
            .push(c(107.0, 107.0, 104.0, 105.0))
            .push(c(105.0, 106.5, 105.0, 106.0))
            .build()
    }

    /// Peak at bar 1, trough at bar 3, last close breaks the peak.
    fn breakout() -> Vec<Candle> {
        CandleSeq::new()
            .push(c(10.0, 10.5, 9.5, 10.0))
            .push(c(10.0, 12.0, 10.0, 11.5))
            .push(c(11.5, 11.6, 10.8, 11.0))
            .push(c(11.0, 11.2, 10.2, 10.5))
            .push(c(10.5, 11.5, 10.4, 11.3))
            .push(c(11.3, 13.0, 11.2, 12.8))
            .build()
    }

    fn lookback_one() -> Trend {
        Trend::new(TrendSettings::builder().lookback_bars(1).build().unwrap())
    }

    mod settings {
        use super::*;
        use crate::Error;

        #[test]
        fn defaults() {
            let s = TrendSettings::default();
            assert_eq!(s.max_swings(), 20);
            assert_eq!(s.min_percent_move(), dec!(0.003));
            assert_eq!(s.min_price_move(), None);
            assert_eq!(s.lookback_bars(), 3);
            assert_eq!(s.pivot_method(), PivotMethod::Lookback);
            assert_eq!(s, TrendSettings::builder().build().unwrap());
        }

        #[test]
        fn rejects_out_of_bounds() {
            let cases = [
                (TrendSettings::builder().max_swings(0), "max_swings"),
                (
                    TrendSettings::builder().min_percent_move(dec!(-0.1)),
                    "min_percent_move",
                ),
                (
                    TrendSettings::builder().min_percent_move(dec!(1)),
                    "min_percent_move",
                ),
                (
                    TrendSettings::builder().min_price_move(Some(dec!(0))),
                    "min_price_move",
                ),
                (TrendSettings::builder().lookback_bars(0), "lookback_bars"),
            ];

            for (builder, expected) in cases {
                match builder.build() {
                    Err(Error::InvalidSettings { field, .. }) => assert_eq!(field, expected),
                    other => panic!("expected {expected} to be rejected, got {other:?}"),
                }
            }
        }

        #[test]
        fn significance_uses_both_thresholds() {
            let s = TrendSettings::builder()
                .min_percent_move(dec!(0.01))
                .min_price_move(Some(dec!(2)))
                .build()
                .unwrap();
            assert!(s.is_significant_move(dec!(100), dec!(102)));
            assert!(!s.is_significant_move(dec!(100), dec!(101.5)));
            assert!(!s.is_significant_move(dec!(1000), dec!(1005)));
            assert!(s.is_significant_move(dec!(0), dec!(5)));
        }

        #[test]
        fn display() {
            assert_eq!(
                TrendSettings::default().to_string(),
                "TrendSettings(Lookback, 20, 0.003, 3)"
            );
        }
    }

    mod insufficient {
        use super::*;

        #[test]
        fn lookback_needs_two_sides() {
            let mut trend = Trend::new(TrendSettings::default());
            let candles = CandleSeq::new().repeat(c(10.0, 11.0, 9.0, 10.0), 6).build();

            let signal = trend.analyze(&candles);
            assert_eq!(signal.trend(), TrendDirection::Undefined);
            assert_eq!(signal.confidence(), 0.0);
            assert!(signal.swings().is_empty());
            assert!(signal.reason().contains("Insufficient"));
        }

        #[test]
        fn zigzag_needs_two_candles() {
            let mut trend = zigzag(dec!(0.01));
            let candles = CandleSeq::new().push(c(10.0, 11.0, 9.0, 10.0)).build();

            let signal = trend.analyze(&candles);
            assert_eq!(signal.trend(), TrendDirection::Undefined);
            assert!(signal.swings().is_empty());
        }

        #[test]
        fn empty_input() {
            let mut trend = Trend::new(TrendSettings::default());
            let signal = trend.analyze(&Vec::<Candle>::new());
            assert_eq!(signal.trend(), TrendDirection::Undefined);
            assert_eq!(signal.confidence(), 0.0);
        }
    }

    mod direction {
        use super::*;
        use crate::SwingType;

        #[test]
        fn higher_highs_and_lows_are_up() {
            let mut trend = zigzag(dec!(0.01));
            let signal = trend.analyze(&rising());

            assert_eq!(signal.trend(), TrendDirection::Up);
            assert!(signal.confidence() > 0.5, "{signal}");
            let highs = signal.swings().iter().filter(|s| s.kind() == SwingType::High).count();
            let lows = signal.swings().iter().filter(|s| s.kind() == SwingType::Low).count();
            assert!(highs >= 2 && lows >= 2);
            assert!(signal.reason().contains("trend up"));
        }

        #[test]
        fn reason_traces_last_four_swings_oldest_first() {
            let signal = zigzag(dec!(0.01)).analyze(&rising());

            assert_eq!(signal.swings().len(), 6);
            assert!(
                signal.reason().starts_with("Recent structure: LL -> HH -> HL -> HH. "),
                "{}",
                signal.reason()
            );
        }

        #[test]
        fn lower_highs_and_lows_are_down() {
            let mut trend = zigzag(dec!(0.01));
            let signal = trend.analyze(&falling());

            assert_eq!(signal.trend(), TrendDirection::Down);
            assert!(signal.confidence() > 0.5, "{signal}");
        }

        #[test]
        fn contraction_is_sideways() {
            let mut trend = zigzag(dec!(0.01));
            let signal = trend.analyze(&contracting());

            assert_eq!(signal.trend(), TrendDirection::Sideways);
            assert!(signal.confidence() < 0.5);
        }

        #[test]
        fn noise_is_undefined() {
            let mut trend = zigzag(dec!(0.05));
            let candles = CandleSeq::new()
                .push(c(100.0, 101.0, 99.0, 100.0))
                .push(c(100.0, 101.1, 99.5, 100.5))
                .push(c(100.0, 101.2, 99.6, 100.4))
                .push(c(100.0, 101.15, 99.4, 100.2))
                .build();

            let signal = trend.analyze(&candles);
            assert_eq!(signal.trend(), TrendDirection::Undefined);
            assert!(signal.confidence() <= 0.25);
            assert!(signal.swings().is_empty());
            assert!(signal.reason().to_lowercase().contains("undefined"));
        }
    }

    mod break_of_structure {
        use super::*;

        #[test]
        fn close_above_last_high_is_bullish() {
            let mut trend = lookback_one();
            let signal = trend.analyze(&breakout());

            let bos = signal.last_bos().expect("bos");
            assert_eq!(bos.kind(), BosKind::Bullish);
            assert_eq!(bos.broken_swing().price(), dec!(12.0));
            assert_eq!(bos.break_price(), dec!(12.8));
            assert_eq!(bos.break_index(), 5);
            // 0.3 base + 0.3 * 2/20 depth + 0.2 for the break
            assert!((signal.confidence() - 0.53).abs() < 1e-9);
        }

        #[test]
        fn persists_until_reset() {
            let mut trend = lookback_one();
            trend.analyze(&breakout());

            let quiet = CandleSeq::new().repeat(c(11.0, 11.0, 11.0, 11.0), 3).build();
            let signal = trend.analyze(&quiet);
            assert!(signal.last_bos().is_some());

            trend.reset();
            assert!(trend.last_bos().is_none());
            assert!(trend.swings().is_empty());
            assert_eq!(trend.current_trend(), TrendDirection::Undefined);
        }

        #[test]
        fn insignificant_break_is_ignored() {
            let mut trend = Trend::new(
                TrendSettings::builder()
                    .lookback_bars(1)
                    .min_percent_move(dec!(0.2))
                    .build()
                    .unwrap(),
            );
            let signal = trend.analyze(&breakout());
            assert!(signal.last_bos().is_none());
        }
    }

    mod memory {
        use super::*;
        use crate::{SwingClassification, SwingType};

        #[test]
        fn reanalysis_does_not_duplicate() {
            let mut trend = zigzag(dec!(0.01));
            let first = trend.analyze(&rising());
            let second = trend.analyze(&rising());

            assert_eq!(first.swings(), second.swings());
            assert_eq!(second.trend(), TrendDirection::Up);
        }

        #[test]
        fn bounded_by_max_swings() {
            let mut trend = Trend::new(
                TrendSettings::builder()
                    .max_swings(3)
                    .min_percent_move(dec!(0.01))
                    .pivot_method(PivotMethod::ZigZag)
                    .build()
                    .unwrap(),
            );
            let signal = trend.analyze(&rising());

            assert_eq!(signal.swings().len(), 3);
            assert_eq!(signal.swings()[2].price(), dec!(120.0));
        }

        #[test]
        fn newest_first_is_reordered() {
            let mut forward = zigzag(dec!(0.01));
            let mut backward = zigzag(dec!(0.01));

            let candles = rising();
            let reversed: Vec<Candle> = candles.iter().rev().cloned().collect();

            assert_eq!(
                forward.analyze(&candles).swings(),
                backward.analyze(&reversed).swings()
            );
        }

        #[test]
        fn classification_continues_across_calls() {
            let mut trend = zigzag(dec!(0.01));
            let candles = rising();
            trend.analyze(&candles[..4]);
            let signal = trend.analyze(&candles);

            let last = signal.swings().last().expect("swing");
            assert_eq!(last.price(), dec!(120.0));
            assert!(last.classification().is_bullish());
        }

        #[test]
        fn provisional_extreme_moves_with_the_series() {
            let candles = CandleSeq::new()
                .push(c(100.0, 100.0, 99.0, 100.0))
                .push(c(100.0, 105.0, 100.0, 104.0))
                .push(c(104.0, 108.0, 104.0, 107.0))
                .push(c(107.0, 112.0, 107.0, 111.0))
                .build();

            let mut extended = zigzag(dec!(0.01));
            let partial = extended.analyze(&candles[..3]);
            assert_eq!(partial.swings()[1].price(), dec!(108.0));

            let signal = extended.analyze(&candles);
            let swings: Vec<_> = signal
                .swings()
                .iter()
                .map(|s| (s.kind(), s.price(), s.classification()))
                .collect();
            assert_eq!(
                swings,
                vec![
                    (SwingType::Low, dec!(99.0), SwingClassification::SwingLow),
                    (SwingType::High, dec!(112.0), SwingClassification::SwingHigh),
                ]
            );
            assert_eq!(signal.swings(), zigzag(dec!(0.01)).analyze(&candles).swings());
        }

        #[test]
        fn less_extreme_same_kind_pivot_is_dropped() {
            let mut trend = zigzag(dec!(0.01));
            let rising = CandleSeq::new()
                .push(c(100.0, 100.0, 99.0, 100.0))
                .push(c(100.0, 108.0, 100.0, 107.0))
                .build();
            trend.analyze(&rising);

            // Later window whose anchor is a lower high: still one high.
            let later = CandleSeq::new()
                .gap(2)
                .push(c(106.0, 106.0, 105.0, 106.0))
                .push(c(106.0, 106.5, 100.0, 101.0))
                .build();
            let signal = trend.analyze(&later);

            let kinds: Vec<_> = signal.swings().iter().map(Swing::kind).collect();
            assert_eq!(kinds, vec![SwingType::Low, SwingType::High, SwingType::Low]);
            assert_eq!(signal.swings()[1].price(), dec!(108.0));
            assert_eq!(signal.swings()[2].classification(), SwingClassification::HigherLow);
        }

        #[test]
        fn shifted_window_keeps_distinct_swing_at_same_index() {
            let candles = CandleSeq::new()
                .push(c(9.5, 10.0, 9.0, 9.5))
                .push(c(10.5, 11.0, 10.0, 10.5))
                .push(c(12.5, 13.0, 12.0, 12.5))
                .push(c(11.3, 11.5, 11.2, 11.3))
                .push(c(11.5, 12.0, 11.0, 11.5))
                .push(c(9.5, 10.0, 9.0, 9.5))
                .push(c(10.0, 10.5, 9.5, 10.0))
                .build();

            let mut trend = lookback_one();
            let first = trend.analyze(&candles[..4]);
            assert_eq!(first.swings().len(), 1);
            assert_eq!(first.swings()[0].index(), 2);

            // Both windows put a high at index 2, two bars apart in time.
            let signal = trend.analyze(&candles[2..]);
            let swings = signal.swings();
            assert_eq!(swings.len(), 3, "{signal}");
            assert_eq!(swings[1].index(), 2);
            assert_eq!(swings[1].price(), dec!(12.0));
            assert_eq!(swings[1].timestamp(), candles[4].timestamp());
            assert_eq!(swings[1].classification(), SwingClassification::LowerHigh);
            assert_eq!(swings[2].kind(), SwingType::Low);
        }
    }

    #[test]
    fn display_and_name() {
        let trend = Trend::new(TrendSettings::default());
        assert_eq!(trend.name(), "trend");
        assert_eq!(
            trend.to_string(),
            "Trend(TrendSettings(Lookback, 20, 0.003, 3), 0 swings, UNDEFINED)"
        );
    }
}
