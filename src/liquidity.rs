use std::{
    fmt::Display,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    AccumulationZone, Indicator, IndicatorSettings, IndicatorSettingsBuilder, LiquidityDirection,
    LiquiditySignal, LiquiditySweep, Ohlcv, Price, RangeBreak, Result, Timestamp, WyckoffEvents,
    WyckoffSettings, ZoneType,
    error::{Error, ensure},
    merge::merge_zones,
    ohlcv::is_newest_first,
    window::{SidewaysLimits, WindowStats, boundary_touches, is_sideways, mid_deviation, to_f64},
    wyckoff,
};

/// Minimum strength a zone needs to be reported.
///
/// Wraps an `f64` in `(0, 1]`. The constructor panics outside that range
/// or on NaN; [`LiquiditySettingsBuilder::min_strength`] validates instead.
///
/// Defaults to `0.55`.
///
/// Implements `Eq` and `Hash` via bit-level comparison, which is safe because
/// NaN is rejected at construction.
#[derive(Clone, Copy, Debug)]
pub struct MinStrength(f64);

impl MinStrength {
    /// # Panics
    ///
    /// Panics if `value` is NaN or outside `(0, 1]`.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(!value.is_nan(), "min_strength must not be NaN");
        assert!(
            value > 0.0 && value <= 1.0,
            "min_strength must be in (0, 1]"
        );
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for MinStrength {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for MinStrength {}

impl Hash for MinStrength {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Default for MinStrength {
    fn default() -> Self {
        Self(0.55)
    }
}

/// How candidate windows are generated.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum DetectionMode {
    /// Validate a seed window, then grow it candle by candle until a
    /// confirmed range break. Zones are invalidated by that break.
    #[default]
    SeedAndGrow,
    /// Validate windows of several sizes at a fixed stride and merge the
    /// survivors. Zones are invalidated by a close beyond the safe zone.
    SlidingWindow,
}

impl Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeedAndGrow => f.write_str("SeedAndGrow"),
            Self::SlidingWindow => f.write_str("SlidingWindow"),
        }
    }
}

/// Settings for the accumulation-zone engine ([`Liquidity`]).
///
/// Percent fields (`max_range_percent`, `max_slope_percent`,
/// `safe_zone_percent`) are in percent; `*_pct` and ratio fields are
/// fractions of the zone height.
///
/// # Example
///
/// ```
/// use market_structure_ta::{DetectionMode, IndicatorSettings, IndicatorSettingsBuilder, LiquiditySettings};
/// use rust_decimal_macros::dec;
///
/// let settings = LiquiditySettings::builder()
///     .min_candles_in_zone(30)
///     .max_range_percent(dec!(1.2))
///     .mode(DetectionMode::SlidingWindow)
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.seed_candles(), 30);
/// assert!(LiquiditySettings::builder().min_strength(1.5).build().is_err());
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct LiquiditySettings {
    min_candles_in_zone: usize,
    seed_candles: usize,
    max_range_percent: Price,
    min_strength: MinStrength,
    min_boundary_touches: usize,
    max_zones: usize,
    min_gap_between_zones: u32,
    break_invalid_pct: Price,
    break_confirm_candles: usize,
    sweep_tolerance_pct: Price,
    sweep_max_duration: usize,
    max_trend_drift_ratio: Price,
    max_slope_percent: Price,
    safe_zone_percent: Price,
    mode: DetectionMode,
    wyckoff: Option<WyckoffSettings>,
}

impl IndicatorSettings for LiquiditySettings {
    type Builder = LiquiditySettingsBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        LiquiditySettingsBuilder::new()
    }
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        let b = LiquiditySettingsBuilder::new();
        Self {
            min_candles_in_zone: b.min_candles_in_zone,
            seed_candles: b.min_candles_in_zone,
            max_range_percent: b.max_range_percent,
            min_strength: MinStrength::default(),
            min_boundary_touches: b.min_boundary_touches,
            max_zones: b.max_zones,
            min_gap_between_zones: b.min_gap_between_zones,
            break_invalid_pct: b.break_invalid_pct,
            break_confirm_candles: b.break_confirm_candles,
            sweep_tolerance_pct: b.sweep_tolerance_pct,
            sweep_max_duration: b.sweep_max_duration,
            max_trend_drift_ratio: b.max_trend_drift_ratio,
            max_slope_percent: b.max_slope_percent,
            safe_zone_percent: b.safe_zone_percent,
            mode: b.mode,
            wyckoff: b.wyckoff,
        }
    }
}

impl LiquiditySettings {
    #[must_use]
    pub fn min_candles_in_zone(&self) -> usize {
        self.min_candles_in_zone
    }

    /// Length of the seed window in [`DetectionMode::SeedAndGrow`].
    #[must_use]
    pub fn seed_candles(&self) -> usize {
        self.seed_candles
    }

    #[must_use]
    pub fn max_range_percent(&self) -> Price {
        self.max_range_percent
    }

    #[must_use]
    pub fn min_strength(&self) -> MinStrength {
        self.min_strength
    }

    #[must_use]
    pub fn min_boundary_touches(&self) -> usize {
        self.min_boundary_touches
    }

    #[must_use]
    pub fn max_zones(&self) -> usize {
        self.max_zones
    }

    /// In minutes.
    #[must_use]
    pub fn min_gap_between_zones(&self) -> u32 {
        self.min_gap_between_zones
    }

    #[must_use]
    pub fn break_invalid_pct(&self) -> Price {
        self.break_invalid_pct
    }

    #[must_use]
    pub fn break_confirm_candles(&self) -> usize {
        self.break_confirm_candles
    }

    #[must_use]
    pub fn sweep_tolerance_pct(&self) -> Price {
        self.sweep_tolerance_pct
    }

    #[must_use]
    pub fn sweep_max_duration(&self) -> usize {
        self.sweep_max_duration
    }

    #[must_use]
    pub fn max_trend_drift_ratio(&self) -> Price {
        self.max_trend_drift_ratio
    }

    #[must_use]
    pub fn max_slope_percent(&self) -> Price {
        self.max_slope_percent
    }

    #[must_use]
    pub fn safe_zone_percent(&self) -> Price {
        self.safe_zone_percent
    }

    #[must_use]
    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    #[must_use]
    pub fn wyckoff(&self) -> Option<&WyckoffSettings> {
        self.wyckoff.as_ref()
    }

    /// Same settings with another detection mode. The mode takes part in no
    /// bound check, so no revalidation is needed.
    #[must_use]
    pub fn with_mode(mut self, mode: DetectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fewest candles for which the engine looks for zones at all.
    #[must_use]
    pub fn min_window(&self) -> usize {
        match self.mode {
            DetectionMode::SeedAndGrow => self.seed_candles.max(self.min_candles_in_zone),
            DetectionMode::SlidingWindow => self.min_candles_in_zone,
        }
    }

    fn sideways_limits(&self) -> SidewaysLimits {
        SidewaysLimits {
            max_drift_ratio: self.max_trend_drift_ratio,
            max_slope_percent: self.max_slope_percent,
        }
    }
}

impl Display for LiquiditySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LiquiditySettings({}, {} candles, {}% range, {} strength, {} touches, {} zones",
            self.mode,
            self.min_candles_in_zone,
            self.max_range_percent,
            self.min_strength.value(),
            self.min_boundary_touches,
            self.max_zones,
        )?;
        if self.wyckoff.is_some() {
            f.write_str(", wyckoff")?;
        }
        f.write_str(")")
    }
}

/// Builder for [`LiquiditySettings`].
///
/// Defaults: 25 candles per zone (seed the same), 0.8% range, strength
/// 0.55, 3 touches, 5 zones, 15 minute gap, break at 20% penetration or 2
/// closes outside, sweeps within 4% tolerance and 5 candles, drift ratio
/// 0.6, slope 1%, safe zone 5%, [`DetectionMode::SeedAndGrow`], no
/// Wyckoff checks.
pub struct LiquiditySettingsBuilder {
    min_candles_in_zone: usize,
    seed_candles: Option<usize>,
    max_range_percent: Price,
    min_strength: f64,
    min_boundary_touches: usize,
    max_zones: usize,
    min_gap_between_zones: u32,
    break_invalid_pct: Price,
    break_confirm_candles: usize,
    sweep_tolerance_pct: Price,
    sweep_max_duration: usize,
    max_trend_drift_ratio: Price,
    max_slope_percent: Price,
    safe_zone_percent: Price,
    mode: DetectionMode,
    wyckoff: Option<WyckoffSettings>,
}

impl LiquiditySettingsBuilder {
    fn new() -> Self {
        Self {
            min_candles_in_zone: 25,
            seed_candles: None,
            max_range_percent: Price::new(8, 1),
            min_strength: MinStrength::default().value(),
            min_boundary_touches: 3,
            max_zones: 5,
            min_gap_between_zones: 15,
            break_invalid_pct: Price::new(2, 1),
            break_confirm_candles: 2,
            sweep_tolerance_pct: Price::new(4, 2),
            sweep_max_duration: 5,
            max_trend_drift_ratio: Price::new(6, 1),
            max_slope_percent: Price::ONE,
            safe_zone_percent: Price::new(5, 0),
            mode: DetectionMode::SeedAndGrow,
            wyckoff: None,
        }
    }

    #[must_use]
    pub fn min_candles_in_zone(mut self, value: usize) -> Self {
        self.min_candles_in_zone = value;
        self
    }

    /// Defaults to `min_candles_in_zone`.
    #[must_use]
    pub fn seed_candles(mut self, value: usize) -> Self {
        self.seed_candles = Some(value);
        self
    }

    #[must_use]
    pub fn max_range_percent(mut self, value: Price) -> Self {
        self.max_range_percent = value;
        self
    }

    #[must_use]
    pub fn min_strength(mut self, value: f64) -> Self {
        self.min_strength = value;
        self
    }

    #[must_use]
    pub fn min_boundary_touches(mut self, value: usize) -> Self {
        self.min_boundary_touches = value;
        self
    }

    #[must_use]
    pub fn max_zones(mut self, value: usize) -> Self {
        self.max_zones = value;
        self
    }

    #[must_use]
    pub fn min_gap_between_zones(mut self, minutes: u32) -> Self {
        self.min_gap_between_zones = minutes;
        self
    }

    #[must_use]
    pub fn break_invalid_pct(mut self, value: Price) -> Self {
        self.break_invalid_pct = value;
        self
    }

    #[must_use]
    pub fn break_confirm_candles(mut self, value: usize) -> Self {
        self.break_confirm_candles = value;
        self
    }

    #[must_use]
    pub fn sweep_tolerance_pct(mut self, value: Price) -> Self {
        self.sweep_tolerance_pct = value;
        self
    }

    #[must_use]
    pub fn sweep_max_duration(mut self, value: usize) -> Self {
        self.sweep_max_duration = value;
        self
    }

    #[must_use]
    pub fn max_trend_drift_ratio(mut self, value: Price) -> Self {
        self.max_trend_drift_ratio = value;
        self
    }

    #[must_use]
    pub fn max_slope_percent(mut self, value: Price) -> Self {
        self.max_slope_percent = value;
        self
    }

    #[must_use]
    pub fn safe_zone_percent(mut self, value: Price) -> Self {
        self.safe_zone_percent = value;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: DetectionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn wyckoff(mut self, wyckoff: Option<WyckoffSettings>) -> Self {
        self.wyckoff = wyckoff;
        self
    }
}

impl IndicatorSettingsBuilder<LiquiditySettings> for LiquiditySettingsBuilder {
    fn build(self) -> Result<LiquiditySettings> {
        let zero = Price::ZERO;
        let seed_candles = self.seed_candles.unwrap_or(self.min_candles_in_zone);

        ensure(
            self.min_candles_in_zone > 0,
            "min_candles_in_zone",
            "must be positive",
        )?;
        ensure(seed_candles >= 3, "seed_candles", "must be at least 3")?;
        ensure(
            self.max_range_percent > zero,
            "max_range_percent",
            "must be positive",
        )?;
        if self.min_strength.is_nan() || self.min_strength <= 0.0 || self.min_strength > 1.0 {
            return Err(Error::invalid("min_strength", "must be in (0, 1]"));
        }
        ensure(
            self.min_boundary_touches > 0,
            "min_boundary_touches",
            "must be positive",
        )?;
        ensure(self.max_zones > 0, "max_zones", "must be positive")?;
        ensure(
            self.break_invalid_pct > zero && self.break_invalid_pct < Price::ONE,
            "break_invalid_pct",
            "must be in (0, 1)",
        )?;
        ensure(
            self.break_confirm_candles > 0,
            "break_confirm_candles",
            "must be positive",
        )?;
        ensure(
            self.sweep_tolerance_pct >= zero && self.sweep_tolerance_pct < self.break_invalid_pct,
            "sweep_tolerance_pct",
            "must be in [0, break_invalid_pct)",
        )?;
        ensure(
            self.sweep_max_duration > 0,
            "sweep_max_duration",
            "must be positive",
        )?;
        ensure(
            self.max_trend_drift_ratio > zero && self.max_trend_drift_ratio < Price::TWO,
            "max_trend_drift_ratio",
            "must be in (0, 2)",
        )?;
        ensure(
            self.max_slope_percent > zero && self.max_slope_percent < Price::new(5, 0),
            "max_slope_percent",
            "must be in (0, 5)",
        )?;
        ensure(
            self.safe_zone_percent >= zero,
            "safe_zone_percent",
            "must not be negative",
        )?;

        Ok(LiquiditySettings {
            min_candles_in_zone: self.min_candles_in_zone,
            seed_candles,
            max_range_percent: self.max_range_percent,
            min_strength: MinStrength(self.min_strength),
            min_boundary_touches: self.min_boundary_touches,
            max_zones: self.max_zones,
            min_gap_between_zones: self.min_gap_between_zones,
            break_invalid_pct: self.break_invalid_pct,
            break_confirm_candles: self.break_confirm_candles,
            sweep_tolerance_pct: self.sweep_tolerance_pct,
            sweep_max_duration: self.sweep_max_duration,
            max_trend_drift_ratio: self.max_trend_drift_ratio,
            max_slope_percent: self.max_slope_percent,
            safe_zone_percent: self.safe_zone_percent,
            mode: self.mode,
            wyckoff: self.wyckoff,
        })
    }
}

/// A window that passed every check.
struct Qualified {
    stats: WindowStats,
    touches: usize,
    wyckoff: Option<WyckoffEvents>,
}

/// Candles beyond the sweep tolerance, not yet resolved.
struct Excursion {
    start_index: usize,
    start_time: Timestamp,
    direction: LiquidityDirection,
    deepest: Price,
}

impl Excursion {
    fn deepen(&mut self, penetration: Price, direction: LiquidityDirection) {
        if penetration > self.deepest {
            self.deepest = penetration;
            self.direction = direction;
        }
    }

    fn into_sweep(self, end_index: usize, end_time: Timestamp) -> LiquiditySweep {
        LiquiditySweep {
            start_time: self.start_time,
            end_time,
            direction: self.direction,
            penetration_percent: to_f64(self.deepest * Price::ONE_HUNDRED),
            candle_count: end_index - self.start_index + 1,
        }
    }

    fn into_break(
        self,
        end_index: usize,
        end_time: Timestamp,
        closes_outside: usize,
    ) -> RangeBreak {
        RangeBreak {
            start_time: self.start_time,
            end_time,
            start_index: self.start_index,
            end_index,
            direction: self.direction,
            penetration_percent: to_f64(self.deepest * Price::ONE_HUNDRED),
            candle_count: end_index - self.start_index + 1,
            closes_outside,
        }
    }
}

/// Outcome of growing a seed window.
struct Growth {
    /// Exclusive end of the absorbed candles.
    end: usize,
    sweeps: Vec<LiquiditySweep>,
    range_break: Option<RangeBreak>,
}

/// Wyckoff-style accumulation-zone engine.
///
/// Finds sideways ranges, scores them, and tracks the sweeps and breaks
/// that confirm or end each one. Two strategies are available through
/// [`DetectionMode`].
///
/// # Example
///
/// ```
/// use market_structure_ta::{Candle, Liquidity, LiquiditySettings, Timeframe};
/// use market_structure_ta::{IndicatorSettings, IndicatorSettingsBuilder};
/// use chrono::{Duration, TimeZone, Utc};
/// use rust_decimal_macros::dec;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let candles: Vec<Candle> = (0..8)
///     .map(|i| {
///         Candle::new("TEST", Timeframe::OneMinute, t0 + Duration::minutes(i),
///             dec!(100), dec!(101), dec!(99), dec!(100), dec!(1))
///     })
///     .collect();
///
/// let settings = LiquiditySettings::builder()
///     .min_candles_in_zone(6)
///     .max_range_percent(dec!(5))
///     .min_strength(0.01)
///     .min_boundary_touches(1)
///     .build()
///     .unwrap();
/// let mut liquidity = Liquidity::new(settings);
///
/// let signal = liquidity.analyze(&candles);
/// assert_eq!(signal.total_zones(), 1);
/// assert_eq!(signal.accumulation_zones()[0].candle_count(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct Liquidity {
    settings: LiquiditySettings,
    zones: Vec<AccumulationZone>,
}

impl Indicator for Liquidity {
    type Settings = LiquiditySettings;
    type Output = LiquiditySignal;

    fn new(settings: Self::Settings) -> Self {
        Self {
            settings,
            zones: Vec::new(),
        }
    }

    #[inline]
    fn name(&self) -> &'static str {
        "liquidity"
    }

    fn analyze(&mut self, candles: &[impl Ohlcv]) -> LiquiditySignal {
        if is_newest_first(candles) {
            let ordered: Vec<_> = candles.iter().rev().collect();
            self.analyze_ordered(&ordered)
        } else {
            self.analyze_ordered(candles)
        }
    }

    fn reset(&mut self) {
        self.zones.clear();
    }
}

impl Liquidity {
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &LiquiditySettings {
        &self.settings
    }

    /// Zones reported by the last call.
    #[inline]
    #[must_use]
    pub fn zones(&self) -> &[AccumulationZone] {
        &self.zones
    }

    fn analyze_ordered<C: Ohlcv>(&mut self, candles: &[C]) -> LiquiditySignal {
        let period = candles
            .first()
            .zip(candles.last())
            .map(|(first, last)| (first.open_time(), last.open_time()));

        if candles.len() < self.settings.min_window() {
            trace!(
                candles = candles.len(),
                required = self.settings.min_window(),
                "not enough candles for a zone"
            );
            self.zones.clear();
            return LiquiditySignal::new(Vec::new(), period);
        }

        let raw = match self.settings.mode {
            DetectionMode::SeedAndGrow => self.seed_and_grow(candles),
            DetectionMode::SlidingWindow => self.sliding_windows(candles),
        };
        let zones = self.select(raw);
        debug!(zones = zones.len(), mode = %self.settings.mode, "liquidity analysis done");

        self.zones.clone_from(&zones);
        LiquiditySignal::new(zones, period)
    }

    fn seed_and_grow<C: Ohlcv>(&self, candles: &[C]) -> Vec<AccumulationZone> {
        let n = candles.len();
        let seed = self.settings.seed_candles;
        let mut zones = Vec::new();
        let mut start = 0;

        while start + seed <= n {
            let Some(seeded) = self.qualify(candles, start, start + seed) else {
                start += 1;
                continue;
            };

            let growth = self.grow(candles, start, start + seed, &seeded.stats);
            let qualified = if growth.end - start >= self.settings.min_candles_in_zone {
                self.qualify(candles, start, growth.end)
            } else {
                None
            };
            let Some(qualified) = qualified else {
                trace!(start, end = growth.end, "grown window failed validation");
                start += 1;
                continue;
            };

            let mut zone = self.zone(candles, start, growth.end, qualified);
            zone.liquidity_sweeps = growth.sweeps;
            zone.invalidated_at = growth.range_break.as_ref().map(RangeBreak::end_time);
            zone.range_break = growth.range_break;
            debug!(
                start,
                end = growth.end,
                low = %zone.low_price,
                high = %zone.high_price,
                sweeps = zone.liquidity_sweeps.len(),
                broken = zone.range_break.is_some(),
                "accumulation zone"
            );
            zones.push(zone);

            start = growth.end;
        }

        zones
    }

    /// Absorbs candles after `seed_end` until a break is confirmed.
    ///
    /// Penetration is measured against the seed range, not the grown one.
    fn grow<C: Ohlcv>(
        &self,
        candles: &[C],
        start: usize,
        seed_end: usize,
        seed: &WindowStats,
    ) -> Growth {
        let s = &self.settings;
        let (ref_high, ref_low) = (seed.high, seed.low);
        let height = seed.height();

        let mut sweeps = Vec::new();
        let mut excursion: Option<Excursion> = None;
        let mut closes_outside = 0;

        for (j, candle) in candles.iter().enumerate().skip(seed_end) {
            let above = (candle.high() - ref_high) / height;
            let below = (ref_low - candle.low()) / height;
            let penetration = above.max(below).max(Price::ZERO);
            let direction = if above >= below {
                LiquidityDirection::Above
            } else {
                LiquidityDirection::Below
            };
            let inside = candle.close() >= ref_low && candle.close() <= ref_high;

            if penetration <= s.sweep_tolerance_pct {
                if inside {
                    closes_outside = 0;
                    if let Some(open) = excursion.take() {
                        sweeps.push(open.into_sweep(j, candle.open_time()));
                    }
                }
                continue;
            }

            let open = excursion.get_or_insert(Excursion {
                start_index: j,
                start_time: candle.open_time(),
                direction,
                deepest: Price::ZERO,
            });
            open.deepen(penetration, direction);

            if penetration < s.break_invalid_pct && inside {
                closes_outside = 0;
                if let Some(open) = excursion.take() {
                    sweeps.push(open.into_sweep(j, candle.open_time()));
                }
                continue;
            }

            if inside {
                closes_outside = 0;
            } else {
                closes_outside += 1;
            }

            let lasted = j - open.start_index + 1;
            if penetration >= s.break_invalid_pct
                || closes_outside >= s.break_confirm_candles
                || lasted > s.sweep_max_duration
            {
                let range_break = excursion
                    .take()
                    .map(|open| open.into_break(j, candle.open_time(), closes_outside));
                debug!(start, at = j, %penetration, closes_outside, "range break confirmed");
                return Growth {
                    end: j,
                    sweeps,
                    range_break,
                };
            }
        }

        Growth {
            end: candles.len(),
            sweeps,
            range_break: None,
        }
    }

    fn sliding_windows<C: Ohlcv>(&self, candles: &[C]) -> Vec<AccumulationZone> {
        let n = candles.len();
        let min = self.settings.min_candles_in_zone;
        let max_window = min.max(n.min(4 * min));
        let size_step = (min / 2).max(1);
        let start_step = (min / 3).max(1);

        let mut raw = Vec::new();
        for size in (min..=max_window).step_by(size_step) {
            for start in (0..=n - size).step_by(start_step) {
                if let Some(qualified) = self.qualify(candles, start, start + size) {
                    raw.push(self.zone(candles, start, start + size, qualified));
                }
            }
        }
        trace!(raw = raw.len(), "sliding windows qualified");

        let mut zones = merge_zones(raw, self.settings.min_gap_between_zones);
        for zone in &mut zones {
            zone.set_safe_zone(self.settings.safe_zone_percent);
            zone.invalidated_at = candles
                .iter()
                .filter(|c| c.open_time() > zone.end_time)
                .find(|c| c.close() > zone.safe_zone_high || c.close() < zone.safe_zone_low)
                .map(Ohlcv::open_time);
        }

        zones
    }

    /// Runs every window check on `candles[start..end]`.
    fn qualify<C: Ohlcv>(&self, candles: &[C], start: usize, end: usize) -> Option<Qualified> {
        let s = &self.settings;
        let window = &candles[start..end];

        let Some(stats) = WindowStats::of(window) else {
            trace!(start, end, "degenerate window");
            return None;
        };
        if stats.range_percent() > s.max_range_percent {
            trace!(start, end, range = %stats.range_percent(), "range too wide");
            return None;
        }
        if !is_sideways(window, &stats, s.sideways_limits()) {
            trace!(start, end, "not sideways");
            return None;
        }

        let touches = boundary_touches(window, stats.high, stats.low);
        if touches < s.min_boundary_touches {
            trace!(start, end, touches, "too few boundary touches");
            return None;
        }

        let events = match &s.wyckoff {
            Some(w) => {
                if !wyckoff::has_prior_downtrend(candles, start, w) {
                    trace!(start, end, "no downtrend before window");
                    return None;
                }
                let Some(events) = wyckoff::detect(window, start, &stats, w) else {
                    trace!(start, end, "no climax, rally and tests");
                    return None;
                };
                Some(events)
            }
            None => None,
        };

        Some(Qualified {
            stats,
            touches,
            wyckoff: events,
        })
    }

    fn zone<C: Ohlcv>(
        &self,
        candles: &[C],
        start: usize,
        end: usize,
        qualified: Qualified,
    ) -> AccumulationZone {
        let window = &candles[start..end];
        let strength = self.strength(window, &qualified);

        let mut zone = AccumulationZone {
            start_time: window[0].open_time(),
            end_time: window[window.len() - 1].open_time(),
            start_index: start,
            end_index: end - 1,
            high_price: qualified.stats.high,
            low_price: qualified.stats.low,
            candle_count: window.len(),
            strength,
            zone_type: ZoneType::Accumulation,
            liquidity_sweeps: Vec::new(),
            range_break: None,
            safe_zone_high: qualified.stats.high,
            safe_zone_low: qualified.stats.low,
            invalidated_at: None,
            wyckoff: qualified.wyckoff,
        };
        zone.set_safe_zone(self.settings.safe_zone_percent);
        zone
    }

    /// Weighted sub-scores, each clamped to its maximum, total capped at 1.
    #[allow(clippy::cast_precision_loss)]
    fn strength<C: Ohlcv>(&self, window: &[C], qualified: &Qualified) -> f64 {
        let s = &self.settings;
        let stats = &qualified.stats;

        let range_ratio = to_f64(stats.range_percent()) / to_f64(s.max_range_percent);
        let range = (1.0 - range_ratio.min(1.0)) * 0.25;

        let bonus = |actual: usize, minimum: usize| {
            let minimum = minimum as f64;
            ((actual as f64 - minimum) / (2.0 * minimum)).clamp(0.0, 1.0)
        };
        let candles = bonus(window.len(), s.min_candles_in_zone) * 0.18;
        let touches = bonus(qualified.touches, s.min_boundary_touches) * 0.2;

        let deviation = to_f64(mid_deviation(window, stats.high, stats.low));
        let concentration = (1.0 - (deviation * 20.0).min(1.0)).max(0.0) * 0.15;

        let structure = qualified.wyckoff.as_ref().map_or(0.0, |events| {
            let climax = (to_f64(events.climax_volume_ratio()) / 3.0).min(1.0) * 0.15;
            let tests = (events.secondary_tests().len() as f64 / 3.0).min(1.0) * 0.1;
            let spring = if events.spring().is_some() { 0.05 } else { 0.0 };
            (climax + tests + spring).min(0.3)
        });

        (range + candles + touches + concentration + structure).min(1.0)
    }

    fn select(&self, mut zones: Vec<AccumulationZone>) -> Vec<AccumulationZone> {
        let min = self.settings.min_strength.value();
        zones.retain(|z| z.strength >= min);
        zones.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        zones.truncate(self.settings.max_zones);
        zones.sort_by_key(|z| (z.start_time, z.end_time));
        zones
    }
}

impl Display for Liquidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Liquidity({}, {} zones)", self.settings, self.zones.len())
    }
}
