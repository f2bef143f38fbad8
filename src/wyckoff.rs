use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    IndicatorSettings, IndicatorSettingsBuilder, Ohlcv, Price, Result, error::ensure,
    window::WindowStats,
};

/// Preliminary support must be no wider than this multiple of the average
/// range.
const PS_MAX_RANGE: Price = Price::from_parts(105, 0, 0, false, 2);
/// Minimum range and volume of the automatic rally, as multiples of the
/// window averages.
const AR_MIN_RATIO: Price = Price::from_parts(8, 0, 0, false, 1);
/// Share of the window height above the climax low that still counts as
/// testing support.
const ST_BAND: Price = Price::from_parts(35, 0, 0, false, 2);
const ST_MIN_TOLERANCE: Price = Price::from_parts(1, 0, 0, false, 4);
/// A spring may carry at most this multiple of the climax volume.
const SPRING_MAX_VOLUME: Price = Price::from_parts(13, 0, 0, false, 1);
/// Share of the lookback bars that must print lower highs and lower lows.
const DOWNTREND_MAJORITY: Price = Price::from_parts(6, 0, 0, false, 1);
/// Candles before the climax searched for preliminary support.
const PS_LOOKBACK: usize = 5;

/// Thresholds of the Wyckoff event checks.
///
/// When attached to [`LiquiditySettings`](crate::LiquiditySettings), a
/// window only qualifies as accumulation if it follows a downtrend and shows
/// a selling climax, an automatic rally and enough secondary tests.
///
/// # Example
///
/// ```
/// use market_structure_ta::{IndicatorSettings, IndicatorSettingsBuilder, WyckoffSettings};
/// use rust_decimal_macros::dec;
///
/// let settings = WyckoffSettings::builder()
///     .min_secondary_tests(2)
///     .build()
///     .unwrap();
/// assert_eq!(settings.sc_volume_spike_ratio(), dec!(1.8));
/// assert_eq!(settings.min_secondary_tests(), 2);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct WyckoffSettings {
    sc_volume_spike_ratio: Price,
    sc_range_spike_ratio: Price,
    min_downtrend_drop_percent: Price,
    downtrend_lookback: usize,
    max_candles_sc_to_ar: usize,
    min_secondary_tests: usize,
    spring_penetration_atr: Price,
    st_volume_contraction: Price,
}

impl IndicatorSettings for WyckoffSettings {
    type Builder = WyckoffSettingsBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        WyckoffSettingsBuilder::new()
    }
}

impl Default for WyckoffSettings {
    fn default() -> Self {
        let b = WyckoffSettingsBuilder::new();
        Self {
            sc_volume_spike_ratio: b.sc_volume_spike_ratio,
            sc_range_spike_ratio: b.sc_range_spike_ratio,
            min_downtrend_drop_percent: b.min_downtrend_drop_percent,
            downtrend_lookback: b.downtrend_lookback,
            max_candles_sc_to_ar: b.max_candles_sc_to_ar,
            min_secondary_tests: b.min_secondary_tests,
            spring_penetration_atr: b.spring_penetration_atr,
            st_volume_contraction: b.st_volume_contraction,
        }
    }
}

impl WyckoffSettings {
    #[must_use]
    pub fn sc_volume_spike_ratio(&self) -> Price {
        self.sc_volume_spike_ratio
    }

    #[must_use]
    pub fn sc_range_spike_ratio(&self) -> Price {
        self.sc_range_spike_ratio
    }

    #[must_use]
    pub fn min_downtrend_drop_percent(&self) -> Price {
        self.min_downtrend_drop_percent
    }

    #[must_use]
    pub fn downtrend_lookback(&self) -> usize {
        self.downtrend_lookback
    }

    #[must_use]
    pub fn max_candles_sc_to_ar(&self) -> usize {
        self.max_candles_sc_to_ar
    }

    #[must_use]
    pub fn min_secondary_tests(&self) -> usize {
        self.min_secondary_tests
    }

    #[must_use]
    pub fn spring_penetration_atr(&self) -> Price {
        self.spring_penetration_atr
    }

    #[must_use]
    pub fn st_volume_contraction(&self) -> Price {
        self.st_volume_contraction
    }
}

impl Display for WyckoffSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WyckoffSettings(sc: {}x vol {}x range, downtrend: {}% over {}, ar within {}, st: {} @ {}x, spring: {} atr)",
            self.sc_volume_spike_ratio,
            self.sc_range_spike_ratio,
            self.min_downtrend_drop_percent,
            self.downtrend_lookback,
            self.max_candles_sc_to_ar,
            self.min_secondary_tests,
            self.st_volume_contraction,
            self.spring_penetration_atr,
        )
    }
}

/// Builder for [`WyckoffSettings`].
///
/// Defaults: climax spikes 1.8x volume and 1.6x range, a 1% drop over the
/// 12 preceding candles, rally within 20 candles, one secondary test at
/// 0.7x climax volume, spring penetration 0.35 average ranges.
pub struct WyckoffSettingsBuilder {
    sc_volume_spike_ratio: Price,
    sc_range_spike_ratio: Price,
    min_downtrend_drop_percent: Price,
    downtrend_lookback: usize,
    max_candles_sc_to_ar: usize,
    min_secondary_tests: usize,
    spring_penetration_atr: Price,
    st_volume_contraction: Price,
}

impl WyckoffSettingsBuilder {
    fn new() -> Self {
        Self {
            sc_volume_spike_ratio: Price::new(18, 1),
            sc_range_spike_ratio: Price::new(16, 1),
            min_downtrend_drop_percent: Price::ONE,
            downtrend_lookback: 12,
            max_candles_sc_to_ar: 20,
            min_secondary_tests: 1,
            spring_penetration_atr: Price::new(35, 2),
            st_volume_contraction: Price::new(7, 1),
        }
    }

    #[must_use]
    pub fn sc_volume_spike_ratio(mut self, value: Price) -> Self {
        self.sc_volume_spike_ratio = value;
        self
    }

    #[must_use]
    pub fn sc_range_spike_ratio(mut self, value: Price) -> Self {
        self.sc_range_spike_ratio = value;
        self
    }

    #[must_use]
    pub fn min_downtrend_drop_percent(mut self, value: Price) -> Self {
        self.min_downtrend_drop_percent = value;
        self
    }

    #[must_use]
    pub fn downtrend_lookback(mut self, value: usize) -> Self {
        self.downtrend_lookback = value;
        self
    }

    #[must_use]
    pub fn max_candles_sc_to_ar(mut self, value: usize) -> Self {
        self.max_candles_sc_to_ar = value;
        self
    }

    #[must_use]
    pub fn min_secondary_tests(mut self, value: usize) -> Self {
        self.min_secondary_tests = value;
        self
    }

    #[must_use]
    pub fn spring_penetration_atr(mut self, value: Price) -> Self {
        self.spring_penetration_atr = value;
        self
    }

    #[must_use]
    pub fn st_volume_contraction(mut self, value: Price) -> Self {
        self.st_volume_contraction = value;
        self
    }
}

impl IndicatorSettingsBuilder<WyckoffSettings> for WyckoffSettingsBuilder {
    fn build(self) -> Result<WyckoffSettings> {
        let positive = [
            (self.sc_volume_spike_ratio, "sc_volume_spike_ratio"),
            (self.sc_range_spike_ratio, "sc_range_spike_ratio"),
            (self.min_downtrend_drop_percent, "min_downtrend_drop_percent"),
            (self.spring_penetration_atr, "spring_penetration_atr"),
            (self.st_volume_contraction, "st_volume_contraction"),
        ];
        for (value, field) in positive {
            ensure(value > Price::ZERO, field, "must be positive")?;
        }
        ensure(
            self.st_volume_contraction <= Price::ONE,
            "st_volume_contraction",
            "must not exceed 1",
        )?;
        ensure(self.downtrend_lookback > 0, "downtrend_lookback", "must be positive")?;
        ensure(
            self.max_candles_sc_to_ar > 0,
            "max_candles_sc_to_ar",
            "must be positive",
        )?;
        ensure(
            self.min_secondary_tests > 0,
            "min_secondary_tests",
            "must be positive",
        )?;

        Ok(WyckoffSettings {
            sc_volume_spike_ratio: self.sc_volume_spike_ratio,
            sc_range_spike_ratio: self.sc_range_spike_ratio,
            min_downtrend_drop_percent: self.min_downtrend_drop_percent,
            downtrend_lookback: self.downtrend_lookback,
            max_candles_sc_to_ar: self.max_candles_sc_to_ar,
            min_secondary_tests: self.min_secondary_tests,
            spring_penetration_atr: self.spring_penetration_atr,
            st_volume_contraction: self.st_volume_contraction,
        })
    }
}

/// Candle indices of the accumulation events found in a zone.
///
/// Indices point into the candle sequence passed to
/// [`Liquidity::analyze`](crate::Liquidity::analyze).
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct WyckoffEvents {
    preliminary_support: Option<usize>,
    selling_climax: usize,
    automatic_rally: usize,
    secondary_tests: Vec<usize>,
    spring: Option<usize>,
    #[serde(skip)]
    climax_volume_ratio: Price,
}

impl WyckoffEvents {
    #[must_use]
    pub fn preliminary_support(&self) -> Option<usize> {
        self.preliminary_support
    }

    #[must_use]
    pub fn selling_climax(&self) -> usize {
        self.selling_climax
    }

    #[must_use]
    pub fn automatic_rally(&self) -> usize {
        self.automatic_rally
    }

    #[must_use]
    pub fn secondary_tests(&self) -> &[usize] {
        &self.secondary_tests
    }

    #[must_use]
    pub fn spring(&self) -> Option<usize> {
        self.spring
    }

    /// Climax volume over the window's average volume; zero when the
    /// window carries no volume.
    pub(crate) fn climax_volume_ratio(&self) -> Price {
        self.climax_volume_ratio
    }
}

impl Display for WyckoffEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ps) = self.preliminary_support {
            write!(f, "PS #{ps} -> ")?;
        }
        write!(
            f,
            "SC #{} -> AR #{} -> {} ST",
            self.selling_climax,
            self.automatic_rally,
            self.secondary_tests.len()
        )?;
        if let Some(spring) = self.spring {
            write!(f, " -> Spring #{spring}")?;
        }
        Ok(())
    }
}

/// Whether the candles leading into `start` fell far and steadily enough.
///
/// Uses the `downtrend_lookback` candles before `start`, or the first
/// `downtrend_lookback` candles when the window starts earlier.
pub(crate) fn has_prior_downtrend<C: Ohlcv>(
    candles: &[C],
    start: usize,
    settings: &WyckoffSettings,
) -> bool {
    let lookback = settings.downtrend_lookback;
    let segment = if start < lookback {
        &candles[..lookback.min(candles.len())]
    } else {
        &candles[start - lookback..start]
    };
    if segment.len() < lookback {
        return false;
    }

    let (Some(first), Some(last)) = (segment.first(), segment.last()) else {
        return false;
    };
    if first.close().is_zero() {
        return false;
    }
    let drop = (first.close() - last.close()) / first.close() * Price::ONE_HUNDRED;
    if drop < settings.min_downtrend_drop_percent {
        return false;
    }

    let lower_highs = segment.windows(2).filter(|w| w[1].high() < w[0].high()).count();
    let lower_lows = segment.windows(2).filter(|w| w[1].low() < w[0].low()).count();
    let required = Price::from(lookback) * DOWNTREND_MAJORITY;

    Price::from(lower_highs) >= required && Price::from(lower_lows) >= required
}

/// Runs the SC → AR → ST (+ PS, Spring) sequence over `window`.
///
/// `offset` is the index of `window[0]` in the full sequence; returned
/// indices are absolute. `None` when no climax, no rally or too few tests.
pub(crate) fn detect<C: Ohlcv>(
    window: &[C],
    offset: usize,
    stats: &WindowStats,
    settings: &WyckoffSettings,
) -> Option<WyckoffEvents> {
    let sc = selling_climax(window, stats, settings)?;
    let ar = automatic_rally(window, sc, stats, settings)?;

    let support = window[sc].low();
    let sc_volume = window[sc].volume();

    let tests = secondary_tests(window, ar, support, sc_volume, stats, settings);
    if tests.len() < settings.min_secondary_tests {
        return None;
    }

    let spring_from = tests.first().copied().unwrap_or(ar);
    let spring_at = spring(window, spring_from, support, sc_volume, stats, settings);
    let ps = preliminary_support(window, sc, stats);

    let climax_volume_ratio = if stats.avg_volume > Price::ZERO {
        sc_volume / stats.avg_volume
    } else {
        Price::ZERO
    };

    Some(WyckoffEvents {
        preliminary_support: ps.map(|i| i + offset),
        selling_climax: sc + offset,
        automatic_rally: ar + offset,
        secondary_tests: tests.into_iter().map(|i| i + offset).collect(),
        spring: spring_at.map(|i| i + offset),
        climax_volume_ratio,
    })
}

/// Down-closing candle with the largest combined volume and range spike.
fn selling_climax<C: Ohlcv>(
    window: &[C],
    stats: &WindowStats,
    settings: &WyckoffSettings,
) -> Option<usize> {
    if stats.avg_range.is_zero() || stats.avg_volume.is_zero() {
        return None;
    }

    let mut best: Option<(usize, Price)> = None;
    for (i, candle) in window.iter().enumerate() {
        let volume_ratio = candle.volume() / stats.avg_volume;
        let range_ratio = candle.range() / stats.avg_range;

        if volume_ratio >= settings.sc_volume_spike_ratio
            && range_ratio >= settings.sc_range_spike_ratio
            && candle.close() <= candle.open()
        {
            let score = volume_ratio + range_ratio;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
    }

    best.map(|(i, _)| i)
}

/// Narrow candle among the few before the climax whose low sits farthest
/// from the climax low.
fn preliminary_support<C: Ohlcv>(window: &[C], sc: usize, stats: &WindowStats) -> Option<usize> {
    let from = sc.saturating_sub(PS_LOOKBACK);
    let sc_low = window[sc].low();

    let mut best: Option<(usize, Price)> = None;
    for (i, candle) in window.iter().enumerate().take(sc).skip(from) {
        if candle.range() > stats.avg_range * PS_MAX_RANGE {
            continue;
        }
        let distance = (candle.low() - sc_low).abs();
        if best.is_none_or(|(_, d)| distance > d) {
            best = Some((i, distance));
        }
    }

    best.map(|(i, _)| i)
}

/// Up-closing, wide, active candle after the climax reaching highest above
/// the climax low.
fn automatic_rally<C: Ohlcv>(
    window: &[C],
    sc: usize,
    stats: &WindowStats,
    settings: &WyckoffSettings,
) -> Option<usize> {
    let sc_low = window[sc].low();
    let min_range = stats.avg_range * AR_MIN_RATIO;
    let min_volume = stats.avg_volume * AR_MIN_RATIO;

    let mut best: Option<(usize, Price)> = None;
    for (i, candle) in window
        .iter()
        .enumerate()
        .skip(sc + 1)
        .take(settings.max_candles_sc_to_ar)
    {
        let active = stats.avg_volume.is_zero() || candle.volume() >= min_volume;
        if candle.range() < min_range || !active || candle.close() <= candle.open() {
            continue;
        }
        let height = candle.high() - sc_low;
        if best.is_none_or(|(_, h)| height > h) {
            best = Some((i, height));
        }
    }

    best.map(|(i, _)| i)
}

/// Narrow, quieter candles after the rally that dip back near support.
fn secondary_tests<C: Ohlcv>(
    window: &[C],
    ar: usize,
    support: Price,
    sc_volume: Price,
    stats: &WindowStats,
    settings: &WyckoffSettings,
) -> Vec<usize> {
    let tolerance = stats.height() * ST_BAND;
    let max_range = tolerance.max(ST_MIN_TOLERANCE);
    let max_volume = sc_volume * settings.st_volume_contraction;

    window
        .iter()
        .enumerate()
        .skip(ar + 1)
        .filter(|(_, c)| {
            c.low() <= support + tolerance
                && (sc_volume.is_zero() || c.volume() <= max_volume)
                && c.range() <= max_range
        })
        .map(|(i, _)| i)
        .collect()
}

/// First shakeout below support that closes back above it.
fn spring<C: Ohlcv>(
    window: &[C],
    from: usize,
    support: Price,
    sc_volume: Price,
    stats: &WindowStats,
    settings: &WyckoffSettings,
) -> Option<usize> {
    let penetration = stats.avg_range * settings.spring_penetration_atr;
    if penetration <= Price::ZERO {
        return None;
    }
    let max_volume = sc_volume * SPRING_MAX_VOLUME;

    window
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, c)| {
            c.low() < support - penetration
                && c.close() > support
                && (sc_volume.is_zero() || c.volume() <= max_volume)
        })
        .map(|(i, _)| i)
}
