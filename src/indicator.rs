use crate::{Ohlcv, Result};

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

/// Settings for a detection [`Indicator`].
///
/// Every engine has a corresponding settings type holding its thresholds.
/// Settings are value types: cheap to clone, compare, and hash. They are
/// only obtainable through a builder that validates every field, so an
/// engine never sees out-of-range thresholds.
pub trait IndicatorSettings: Sized + Clone + PartialEq + Eq + Hash + Display + Debug {
    /// Builder type for constructing these settings.
    type Builder: IndicatorSettingsBuilder<Self>;

    /// Returns a new builder with default values.
    fn builder() -> Self::Builder;
}

/// Builder for an [`IndicatorSettings`].
pub trait IndicatorSettingsBuilder<Settings>
where
    Settings: IndicatorSettings,
{
    /// Validates and builds the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`](crate::Error::InvalidSettings)
    /// naming the first field that violates its bounds.
    fn build(self) -> Result<Settings>;
}

/// A market-structure detection engine.
///
/// Engines are fed a complete candle sequence per call and return a typed
/// signal. They may keep bounded memory between calls (the trend engine
/// remembers swings); [`reset`](Indicator::reset) returns them to their
/// initial state.
///
/// # Example
///
/// ```
/// use market_structure_ta::{Indicator, Trend, TrendSettings, TrendDirection};
/// # use market_structure_ta::Candle;
///
/// let mut trend = Trend::new(TrendSettings::default());
/// let candles: Vec<Candle> = Vec::new();
///
/// let signal = trend.analyze(&candles);
/// assert_eq!(signal.trend(), TrendDirection::Undefined);
/// assert_eq!(signal.confidence(), 0.0);
/// ```
pub trait Indicator: Sized + Clone + Display + Debug {
    /// Settings type for this engine.
    type Settings: IndicatorSettings;

    /// Signal produced by one call to [`analyze`](Indicator::analyze).
    type Output: Send + Sync + Display + Debug;

    /// Creates a new engine from validated settings.
    fn new(settings: Self::Settings) -> Self;

    /// Short stable name, used in logs and presenters.
    fn name(&self) -> &'static str;

    /// Analyzes an ordered candle sequence.
    ///
    /// Oldest-first is expected; newest-first input is detected and
    /// reversed. Never fails: too little data yields a neutral signal.
    fn analyze(&mut self, candles: &[impl Ohlcv]) -> Self::Output;

    /// Clears all state carried between calls.
    fn reset(&mut self);
}
