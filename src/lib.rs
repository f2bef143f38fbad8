//! Market-structure detection over OHLCV series.
//!
//! Two engines share one contract ([`Indicator`]):
//!
//! - [`Trend`] extracts swing pivots, classifies them as higher/lower
//!   highs and lows, confirms breaks of structure and reports the trend
//!   direction with a confidence score. It remembers recent swings between
//!   calls.
//! - [`Liquidity`] finds Wyckoff-style accumulation zones: sideways ranges
//!   scored for tightness, duration, boundary touches and, optionally, the
//!   climax/rally/test sequence, with the sweeps and breaks that confirm or
//!   end them.
//!
//! Engines accept any type implementing [`Ohlcv`] and take the whole
//! sequence per call. Settings are built and validated through
//! [`IndicatorSettings::builder`].
//!
//! Each engine exposes [`new`](Trend::new), [`name`](Trend::name),
//! [`analyze`](Trend::analyze) and [`reset`](Trend::reset) as inherent
//! methods, so no trait import is needed. Import [`Indicator`] only for
//! generic code.
//!
//! [`TradingDecision::from_trend`] turns a [`TrendSignal`] into a buy or
//! sell call at the latest candle, falling back to close momentum when the
//! trend is not confident.
//!
//! [`CandleCache`] and the [`config`] loaders are thin plumbing for the
//! `structure-scan` binary, which is built with the `cli` feature.

mod cache;
mod candle;
pub mod config;
mod decision;
mod error;
mod indicator;
mod liquidity;
mod merge;
mod ohlcv;
mod ring_buffer;
mod swing;
mod timeframe;
mod trend;
mod window;
mod wyckoff;
mod zone;

pub use crate::cache::CandleCache;
pub use crate::candle::Candle;
pub use crate::decision::{DecisionBasis, DecisionSide, TradingDecision};
pub use crate::error::{Error, Result};
pub use crate::indicator::{Indicator, IndicatorSettings, IndicatorSettingsBuilder};
pub use crate::ohlcv::{Ohlcv, Price, Timestamp};
pub use crate::timeframe::Timeframe;

pub use crate::liquidity::{
    DetectionMode, Liquidity, LiquiditySettings, LiquiditySettingsBuilder, MinStrength,
};
pub use crate::swing::{
    BosKind, BreakOfStructure, Swing, SwingClassification, SwingType, TrendDirection,
};
pub use crate::trend::{PivotMethod, Trend, TrendSettings, TrendSettingsBuilder, TrendSignal};
pub use crate::wyckoff::{WyckoffEvents, WyckoffSettings, WyckoffSettingsBuilder};
pub use crate::zone::{
    AccumulationZone, LiquidityDirection, LiquiditySignal, LiquiditySweep, RangeBreak, ZoneType,
};

macro_rules! impl_indicator_methods {
    ($type:ty, $settings:ty, $output:ty) => {
        impl $type {
            /// See [`Indicator::new`].
            #[must_use]
            pub fn new(settings: $settings) -> Self {
                <Self as Indicator>::new(settings)
            }

            /// See [`Indicator::name`].
            #[must_use]
            #[inline]
            pub fn name(&self) -> &'static str {
                <Self as Indicator>::name(self)
            }

            /// See [`Indicator::analyze`].
            pub fn analyze(&mut self, candles: &[impl Ohlcv]) -> $output {
                <Self as Indicator>::analyze(self, candles)
            }

            /// See [`Indicator::reset`].
            #[inline]
            pub fn reset(&mut self) {
                <Self as Indicator>::reset(self);
            }
        }
    };
}

impl_indicator_methods!(Trend, TrendSettings, TrendSignal);
impl_indicator_methods!(Liquidity, LiquiditySettings, LiquiditySignal);

#[cfg(test)]
mod test_util;
