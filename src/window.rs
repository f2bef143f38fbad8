use rust_decimal::prelude::ToPrimitive;

use crate::{Ohlcv, Price};

/// Share of the range height, measured from each boundary, that counts as
/// touching it.
const TOUCH_BAND: Price = Price::from_parts(15, 0, 0, false, 2);

/// Largest deviation of any third's mean close from the overall mean.
const SIDEWAYS_DEVIATION: Price = Price::from_parts(5, 0, 0, false, 3);

const HUNDRED: Price = Price::ONE_HUNDRED;

/// Aggregates of one candle window, gathered in a single pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WindowStats {
    pub(crate) len: usize,
    pub(crate) high: Price,
    pub(crate) low: Price,
    pub(crate) avg_close: Price,
    pub(crate) avg_range: Price,
    pub(crate) avg_volume: Price,
}

impl WindowStats {
    /// `None` for an empty window, a zero-width range or a non-positive
    /// average close.
    pub(crate) fn of<C: Ohlcv>(window: &[C]) -> Option<Self> {
        let first = window.first()?;

        let mut high = first.high();
        let mut low = first.low();
        let mut sum_close = Price::ZERO;
        let mut sum_range = Price::ZERO;
        let mut sum_volume = Price::ZERO;

        for candle in window {
            high = high.max(candle.high());
            low = low.min(candle.low());
            sum_close += candle.close();
            sum_range += candle.range();
            sum_volume += candle.volume();
        }

        let n = Price::from(window.len());
        let stats = Self {
            len: window.len(),
            high,
            low,
            avg_close: sum_close / n,
            avg_range: sum_range / n,
            avg_volume: sum_volume / n,
        };

        (stats.height() > Price::ZERO && stats.avg_close > Price::ZERO).then_some(stats)
    }

    #[inline]
    pub(crate) fn height(&self) -> Price {
        self.high - self.low
    }

    /// Range height as a percentage of the average close.
    #[inline]
    pub(crate) fn range_percent(&self) -> Price {
        self.height() / self.avg_close * HUNDRED
    }
}

/// Thresholds for [`is_sideways`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct SidewaysLimits {
    pub(crate) max_drift_ratio: Price,
    pub(crate) max_slope_percent: Price,
}

/// Three checks, all of which must pass:
///
/// - mean closes of the three thirds (last takes the remainder) each within
///   0.5% of their common mean;
/// - net drift, first to last close, within `max_drift_ratio` of the height;
/// - least-squares slope of closes, extrapolated over the window, within
///   `max_slope_percent` of the average close.
pub(crate) fn is_sideways<C: Ohlcv>(
    window: &[C],
    stats: &WindowStats,
    limits: SidewaysLimits,
) -> bool {
    let third = window.len() / 3;
    if third == 0 {
        return false;
    }

    let mean_close = |part: &[C]| {
        part.iter().map(Ohlcv::close).sum::<Price>() / Price::from(part.len())
    };
    let thirds = [
        mean_close(&window[..third]),
        mean_close(&window[third..2 * third]),
        mean_close(&window[2 * third..]),
    ];
    let overall = thirds.iter().sum::<Price>() / Price::from(3);
    if overall <= Price::ZERO {
        return false;
    }
    if thirds
        .iter()
        .any(|avg| (avg - overall).abs() / overall >= SIDEWAYS_DEVIATION)
    {
        return false;
    }

    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return false;
    };
    let drift = (last.close() - first.close()).abs();
    if drift > limits.max_drift_ratio * stats.height() {
        return false;
    }

    let travel = close_slope(window) * Price::from(window.len() - 1);
    travel.abs() / stats.avg_close * HUNDRED <= limits.max_slope_percent
}

/// Least-squares slope of closes against bar index, per bar.
pub(crate) fn close_slope<C: Ohlcv>(window: &[C]) -> Price {
    let n = window.len();
    if n < 2 {
        return Price::ZERO;
    }

    let x_mean = Price::from(n - 1) / Price::TWO;
    let mut covariance = Price::ZERO;
    let mut variance = Price::ZERO;
    for (i, candle) in window.iter().enumerate() {
        let dx = Price::from(i) - x_mean;
        covariance += dx * candle.close();
        variance += dx * dx;
    }

    covariance / variance
}

/// Minimum of the candles whose high lies within 15% of the height below
/// `high` and those whose low lies within 15% above `low`.
pub(crate) fn boundary_touches<C: Ohlcv>(window: &[C], high: Price, low: Price) -> usize {
    let height = high - low;
    if height <= Price::ZERO {
        return 0;
    }
    let band = height * TOUCH_BAND;

    let upper = window.iter().filter(|c| high - c.high() <= band).count();
    let lower = window.iter().filter(|c| c.low() - low <= band).count();

    upper.min(lower)
}

/// Mean of `|close - mid| / mid` over the window.
pub(crate) fn mid_deviation<C: Ohlcv>(window: &[C], high: Price, low: Price) -> Price {
    let mid = (high + low) / Price::TWO;
    if window.is_empty() || mid <= Price::ZERO {
        return Price::ZERO;
    }

    window
        .iter()
        .map(|c| (c.close() - mid).abs() / mid)
        .sum::<Price>()
        / Price::from(window.len())
}

/// Lossy conversion for scoring; scores are plain floats.
#[inline]
pub(crate) fn to_f64(value: Price) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
