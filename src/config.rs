//! Detection settings from environment variables.
//!
//! Unset variables keep the builder defaults. Every value still passes
//! through the builders, so out-of-bound values surface as
//! [`Error::InvalidSettings`] and unparsable ones as [`Error::InvalidEnv`].

use std::str::FromStr;

use tracing::debug;

use crate::{
    Error, IndicatorSettings, IndicatorSettingsBuilder, LiquiditySettings, Price, Result,
    TrendSettings,
};

/// Reads `TREND_*` variables from the process environment.
///
/// # Errors
///
/// See the [module docs](self).
pub fn trend_settings_from_env() -> Result<TrendSettings> {
    trend_settings_from_lookup(|var| std::env::var(var).ok())
}

/// Reads `ACCUMULATION_*` variables from the process environment.
///
/// # Errors
///
/// See the [module docs](self).
pub fn liquidity_settings_from_env() -> Result<LiquiditySettings> {
    liquidity_settings_from_lookup(|var| std::env::var(var).ok())
}

/// Like [`trend_settings_from_env`] with a caller-supplied lookup.
///
/// # Errors
///
/// See the [module docs](self).
pub fn trend_settings_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<TrendSettings> {
    let mut builder = TrendSettings::builder();

    if let Some(v) = parse::<usize>(&lookup, "TREND_MAX_SWINGS")? {
        builder = builder.max_swings(v);
    }
    if let Some(v) = parse::<Price>(&lookup, "TREND_MIN_PERCENT_MOVE")? {
        builder = builder.min_percent_move(v);
    }
    if let Some(v) = parse::<usize>(&lookup, "TREND_LOOKBACK_BARS")? {
        builder = builder.lookback_bars(v);
    }

    let settings = builder.build()?;
    debug!(%settings, "trend settings loaded");
    Ok(settings)
}

/// Like [`liquidity_settings_from_env`] with a caller-supplied lookup.
///
/// # Errors
///
/// See the [module docs](self).
pub fn liquidity_settings_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LiquiditySettings> {
    let mut b = LiquiditySettings::builder();

    if let Some(v) = parse(&lookup, "ACCUMULATION_MIN_CANDLES")? {
        b = b.min_candles_in_zone(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MAX_RANGE_PERCENT")? {
        b = b.max_range_percent(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MIN_STRENGTH")? {
        b = b.min_strength(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MIN_BOUNDARY_TOUCHES")? {
        b = b.min_boundary_touches(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MAX_ZONES")? {
        b = b.max_zones(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MIN_GAP_BETWEEN_ZONES")? {
        b = b.min_gap_between_zones(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_BREAK_INVALID_PCT")? {
        b = b.break_invalid_pct(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_BREAK_CONFIRM_CANDLES")? {
        b = b.break_confirm_candles(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_SWEEP_MAX_DURATION")? {
        b = b.sweep_max_duration(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MAX_TREND_DRIFT_RATIO")? {
        b = b.max_trend_drift_ratio(v);
    }
    if let Some(v) = parse(&lookup, "ACCUMULATION_MAX_SLOPE_PERCENT")? {
        b = b.max_slope_percent(v);
    }

    let settings = b.build()?;
    debug!(%settings, "liquidity settings loaded");
    Ok(settings)
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| Error::InvalidEnv { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| map.get(var).cloned()
    }

    mod liquidity {
        use super::*;

        #[test]
        fn empty_environment_gives_defaults() {
            let settings = liquidity_settings_from_lookup(env(&[])).unwrap();
            assert_eq!(settings, LiquiditySettings::default());
        }

        #[test]
        fn overrides_apply() {
            let settings = liquidity_settings_from_lookup(env(&[
                ("ACCUMULATION_MIN_CANDLES", "30"),
                ("ACCUMULATION_MAX_RANGE_PERCENT", "1.2"),
                ("ACCUMULATION_MIN_STRENGTH", "0.6"),
                ("ACCUMULATION_MIN_BOUNDARY_TOUCHES", "4"),
                ("ACCUMULATION_MAX_ZONES", "7"),
                ("ACCUMULATION_MIN_GAP_BETWEEN_ZONES", "20"),
                ("ACCUMULATION_SWEEP_MAX_DURATION", " 8 "),
            ]))
            .unwrap();

            assert_eq!(settings.min_candles_in_zone(), 30);
            assert_eq!(settings.seed_candles(), 30);
            assert_eq!(settings.max_range_percent(), dec!(1.2));
            assert!((settings.min_strength().value() - 0.6).abs() < f64::EPSILON);
            assert_eq!(settings.min_boundary_touches(), 4);
            assert_eq!(settings.max_zones(), 7);
            assert_eq!(settings.min_gap_between_zones(), 20);
            assert_eq!(settings.sweep_max_duration(), 8);
            assert_eq!(settings.break_confirm_candles(), 2);
        }

        #[test]
        fn unparsable_value_names_variable() {
            let err = liquidity_settings_from_lookup(env(&[("ACCUMULATION_MAX_ZONES", "many")]))
                .unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidEnv { var: "ACCUMULATION_MAX_ZONES", ref value } if value == "many"
            ));
        }

        #[test]
        fn out_of_bounds_value_is_rejected_by_builder() {
            let err = liquidity_settings_from_lookup(env(&[("ACCUMULATION_MIN_STRENGTH", "1.5")]))
                .unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidSettings { field: "min_strength", .. }
            ));
        }

        #[test]
        fn blank_value_keeps_default() {
            let settings =
                liquidity_settings_from_lookup(env(&[("ACCUMULATION_MIN_CANDLES", "  ")])).unwrap();
            assert_eq!(settings.min_candles_in_zone(), 25);
        }
    }

    mod trend {
        use super::*;

        #[test]
        fn empty_environment_gives_defaults() {
            let settings = trend_settings_from_lookup(env(&[])).unwrap();
            assert_eq!(settings, TrendSettings::default());
        }

        #[test]
        fn overrides_apply() {
            let settings = trend_settings_from_lookup(env(&[
                ("TREND_MAX_SWINGS", "40"),
                ("TREND_MIN_PERCENT_MOVE", "0.01"),
                ("TREND_LOOKBACK_BARS", "5"),
            ]))
            .unwrap();

            assert_eq!(settings.max_swings(), 40);
            assert_eq!(settings.min_percent_move(), dec!(0.01));
            assert_eq!(settings.lookback_bars(), 5);
        }

        #[test]
        fn zero_lookback_is_rejected() {
            let err = trend_settings_from_lookup(env(&[("TREND_LOOKBACK_BARS", "0")])).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidSettings { field: "lookback_bars", .. }
            ));
        }
    }
}
