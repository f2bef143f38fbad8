use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Price, Timestamp, WyckoffEvents};

/// Kind of consolidation a zone represents.
///
/// Only `Accumulation` is produced; `Distribution` exists so presenters can
/// share one vocabulary with other tools.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    #[default]
    Accumulation,
    Distribution,
}

impl Display for ZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accumulation => f.write_str("ACCUMULATION"),
            Self::Distribution => f.write_str("DISTRIBUTION"),
        }
    }
}

/// Side of the zone an excursion went to.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityDirection {
    /// Above the range high (buy-side liquidity).
    Above,
    /// Below the range low (sell-side liquidity).
    Below,
}

impl Display for LiquidityDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Above => f.write_str("ABOVE"),
            Self::Below => f.write_str("BELOW"),
        }
    }
}

/// Short excursion outside the zone that closed back inside.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,
    pub(crate) direction: LiquidityDirection,
    pub(crate) penetration_percent: f64,
    pub(crate) candle_count: usize,
}

impl LiquiditySweep {
    #[must_use]
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    #[must_use]
    pub fn direction(&self) -> LiquidityDirection {
        self.direction
    }

    /// Deepest penetration, as a percentage of the zone height.
    #[must_use]
    pub fn penetration_percent(&self) -> f64 {
        self.penetration_percent
    }

    #[must_use]
    pub fn candle_count(&self) -> usize {
        self.candle_count
    }
}

impl Display for LiquiditySweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sweep {} {:.1}% over {} candle(s) @ {}",
            self.direction,
            self.penetration_percent,
            self.candle_count,
            self.start_time.to_rfc3339()
        )
    }
}

/// Confirmed exit from the zone.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct RangeBreak {
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,
    pub(crate) start_index: usize,
    pub(crate) end_index: usize,
    pub(crate) direction: LiquidityDirection,
    pub(crate) penetration_percent: f64,
    pub(crate) candle_count: usize,
    pub(crate) closes_outside: usize,
}

impl RangeBreak {
    #[must_use]
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// Timestamp of the confirming candle.
    #[must_use]
    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    #[must_use]
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    #[must_use]
    pub fn direction(&self) -> LiquidityDirection {
        self.direction
    }

    #[must_use]
    pub fn penetration_percent(&self) -> f64 {
        self.penetration_percent
    }

    #[must_use]
    pub fn candle_count(&self) -> usize {
        self.candle_count
    }

    #[must_use]
    pub fn closes_outside(&self) -> usize {
        self.closes_outside
    }
}

impl Display for RangeBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "break {} {:.1}% ({} closes outside) @ {}",
            self.direction,
            self.penetration_percent,
            self.closes_outside,
            self.end_time.to_rfc3339()
        )
    }
}

/// A sideways range with accumulation characteristics.
///
/// `high_price > low_price` always holds and `candle_count` is at least
/// the configured minimum. A zone is active until a candle invalidates it.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct AccumulationZone {
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,
    pub(crate) start_index: usize,
    pub(crate) end_index: usize,
    pub(crate) high_price: Price,
    pub(crate) low_price: Price,
    pub(crate) candle_count: usize,
    pub(crate) strength: f64,
    pub(crate) zone_type: ZoneType,
    pub(crate) liquidity_sweeps: Vec<LiquiditySweep>,
    pub(crate) range_break: Option<RangeBreak>,
    pub(crate) safe_zone_high: Price,
    pub(crate) safe_zone_low: Price,
    pub(crate) invalidated_at: Option<Timestamp>,
    pub(crate) wyckoff: Option<WyckoffEvents>,
}

impl AccumulationZone {
    #[must_use]
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    #[must_use]
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    #[must_use]
    pub fn high_price(&self) -> Price {
        self.high_price
    }

    #[must_use]
    pub fn low_price(&self) -> Price {
        self.low_price
    }

    #[must_use]
    pub fn candle_count(&self) -> usize {
        self.candle_count
    }

    /// In `[0, 1]`.
    #[must_use]
    pub fn strength(&self) -> f64 {
        self.strength
    }

    #[must_use]
    pub fn zone_type(&self) -> ZoneType {
        self.zone_type
    }

    #[must_use]
    pub fn liquidity_sweeps(&self) -> &[LiquiditySweep] {
        &self.liquidity_sweeps
    }

    #[must_use]
    pub fn range_break(&self) -> Option<&RangeBreak> {
        self.range_break.as_ref()
    }

    #[must_use]
    pub fn safe_zone_high(&self) -> Price {
        self.safe_zone_high
    }

    #[must_use]
    pub fn safe_zone_low(&self) -> Price {
        self.safe_zone_low
    }

    #[must_use]
    pub fn invalidated_at(&self) -> Option<Timestamp> {
        self.invalidated_at
    }

    #[must_use]
    pub fn wyckoff(&self) -> Option<&WyckoffEvents> {
        self.wyckoff.as_ref()
    }

    #[must_use]
    pub fn range_size(&self) -> Price {
        self.high_price - self.low_price
    }

    #[must_use]
    pub fn mid_price(&self) -> Price {
        (self.high_price + self.low_price) / Price::TWO
    }

    /// Range size as a percentage of the mid price; zero for a zero mid.
    #[must_use]
    pub fn range_percent(&self) -> Price {
        let mid = self.mid_price();
        if mid.is_zero() {
            return Price::ZERO;
        }
        self.range_size() / mid * Price::ONE_HUNDRED
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.invalidated_at.is_none()
    }

    /// Pads the bounds by `percent` % of the zone height.
    pub(crate) fn set_safe_zone(&mut self, percent: Price) {
        let pad = self.range_size() * percent / Price::ONE_HUNDRED;
        self.safe_zone_high = self.high_price + pad;
        self.safe_zone_low = self.low_price - pad;
    }
}

impl Display for AccumulationZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} .. {} [{} - {}] {} candles, strength {:.2}, safe [{} - {}]",
            self.zone_type,
            self.start_time.to_rfc3339(),
            self.end_time.to_rfc3339(),
            self.low_price,
            self.high_price,
            self.candle_count,
            self.strength,
            self.safe_zone_low,
            self.safe_zone_high,
        )?;
        match self.invalidated_at {
            Some(at) => write!(f, ", invalidated @ {}", at.to_rfc3339()),
            None => f.write_str(", active"),
        }
    }
}

/// Result of one [`Liquidity::analyze`](crate::Liquidity::analyze) call.
///
/// Zones are chronological.
#[derive(PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct LiquiditySignal {
    pub(crate) accumulation_zones: Vec<AccumulationZone>,
    pub(crate) total_zones: usize,
    pub(crate) analysis_period_start: Option<Timestamp>,
    pub(crate) analysis_period_end: Option<Timestamp>,
}

impl LiquiditySignal {
    pub(crate) fn new(
        zones: Vec<AccumulationZone>,
        period: Option<(Timestamp, Timestamp)>,
    ) -> Self {
        Self {
            total_zones: zones.len(),
            accumulation_zones: zones,
            analysis_period_start: period.map(|(start, _)| start),
            analysis_period_end: period.map(|(_, end)| end),
        }
    }

    #[must_use]
    pub fn accumulation_zones(&self) -> &[AccumulationZone] {
        &self.accumulation_zones
    }

    #[must_use]
    pub fn total_zones(&self) -> usize {
        self.total_zones
    }

    #[must_use]
    pub fn analysis_period_start(&self) -> Option<Timestamp> {
        self.analysis_period_start
    }

    #[must_use]
    pub fn analysis_period_end(&self) -> Option<Timestamp> {
        self.analysis_period_end
    }

    #[must_use]
    pub fn has_accumulation(&self) -> bool {
        !self.accumulation_zones.is_empty()
    }

    #[must_use]
    pub fn strongest_zone(&self) -> Option<&AccumulationZone> {
        self.accumulation_zones
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
    }

    #[must_use]
    pub fn most_recent_zone(&self) -> Option<&AccumulationZone> {
        self.accumulation_zones.iter().max_by_key(|z| z.end_time)
    }
}

impl Display for LiquiditySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} accumulation zone(s)", self.total_zones)?;
        if let (Some(start), Some(end)) = (self.analysis_period_start, self.analysis_period_end) {
            write!(f, " in {} .. {}", start.to_rfc3339(), end.to_rfc3339())?;
        }
        for zone in &self.accumulation_zones {
            write!(f, "\n  {zone}")?;
            for sweep in &zone.liquidity_sweeps {
                write!(f, "\n    {sweep}")?;
            }
            if let Some(range_break) = &zone.range_break {
                write!(f, "\n    {range_break}")?;
            }
            if let Some(events) = &zone.wyckoff {
                write!(f, "\n    {events}")?;
            }
        }
        Ok(())
    }
}
