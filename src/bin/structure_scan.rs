use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use market_structure_ta::{
    Candle, CandleCache, DetectionMode, Liquidity, LiquiditySignal, Price, Timeframe, Timestamp,
    TradingDecision, Trend, TrendSignal, config,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Detect swing structure and accumulation zones in a candle file.
///
/// Detection thresholds come from `TREND_*` and `ACCUMULATION_*`
/// environment variables (a `.env` file is loaded first).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV with `timestamp,open,high,low,close,volume`, or a candle cache
    /// JSON file
    #[arg(short, long, env = "STRUCTURE_SCAN_INPUT")]
    input: PathBuf,

    /// Symbol the candles belong to
    #[arg(short, long, default_value = "BTC/USD", env = "STRUCTURE_SCAN_SYMBOL")]
    symbol: String,

    /// Candle interval (1min, 5min, 15min, 30min, 45min, 1h, 2h, 4h, 8h, 1day, 1week, 1month)
    #[arg(short, long, default_value = "1h", env = "STRUCTURE_SCAN_TIMEFRAME")]
    timeframe: Timeframe,

    /// Accumulation zone detection strategy
    #[arg(long, value_enum, default_value_t = Mode::Seed)]
    mode: Mode,

    /// Print one JSON document instead of the console report
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Skip the candles, the trend and the decision, print only the zones
    #[arg(long, default_value_t = false)]
    zones_only: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Seed,
    Sliding,
}

impl From<Mode> for DetectionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Seed => Self::SeedAndGrow,
            Mode::Sliding => Self::SlidingWindow,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

#[derive(Serialize)]
struct Report<'a> {
    symbol: &'a str,
    timeframe: Timeframe,
    candles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend: Option<&'a TrendSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'a TradingDecision>,
    liquidity: &'a LiquiditySignal,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("market_structure_ta=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let candles = load_candles(&args)?;
    info!(
        candles = candles.len(),
        input = %args.input.display(),
        symbol = %args.symbol,
        timeframe = %args.timeframe,
        "candles loaded"
    );
    if candles.is_empty() {
        warn!("no candles, signals will be neutral");
    }

    let trend_settings = config::trend_settings_from_env().context("reading TREND_* settings")?;
    let liquidity_settings = config::liquidity_settings_from_env()
        .context("reading ACCUMULATION_* settings")?
        .with_mode(args.mode.into());

    let trend = Trend::new(trend_settings).analyze(&candles);
    let liquidity = Liquidity::new(liquidity_settings).analyze(&candles);
    let decision = TradingDecision::from_trend(&trend, &candles);

    if args.json {
        let report = Report {
            symbol: &args.symbol,
            timeframe: args.timeframe,
            candles: candles.len(),
            trend: (!args.zones_only).then_some(&trend),
            decision: decision.as_ref().filter(|_| !args.zones_only),
            liquidity: &liquidity,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !args.zones_only {
        for candle in &candles {
            println!("{candle}");
        }
        println!();
        println!("{trend}");
        match &decision {
            Some(decision) => println!("{decision}"),
            None => println!("No trading decision"),
        }
        println!();
    }
    println!("{liquidity}");

    Ok(())
}

fn load_candles(args: &Args) -> Result<Vec<Candle>> {
    let is_json = args
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let cache = CandleCache::open(&args.input)
            .with_context(|| format!("opening cache {}", args.input.display()))?;
        return cache
            .latest(&args.symbol, args.timeframe)
            .with_context(|| {
                format!(
                    "no cached candles for {} {} in {}",
                    args.symbol,
                    args.timeframe,
                    args.input.display()
                )
            });
    }

    read_csv(&args.input, &args.symbol, args.timeframe)
}

fn read_csv(path: &Path, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    reader
        .deserialize::<Row>()
        .enumerate()
        .map(|(i, row)| {
            let line = i + 2;
            let row = row.with_context(|| format!("{}:{line}", path.display()))?;
            to_candle(&row, symbol, timeframe)
                .with_context(|| format!("{}:{line}", path.display()))
        })
        .collect()
}

fn to_candle(row: &Row, symbol: &str, timeframe: Timeframe) -> Result<Candle> {
    let price = |field: &str, raw: &str| -> Result<Price> {
        raw.parse::<Price>()
            .with_context(|| format!("{field} {raw:?} is not a decimal"))
    };

    let open = price("open", &row.open)?;
    let high = price("high", &row.high)?;
    let low = price("low", &row.low)?;
    let close = price("close", &row.close)?;
    let volume = price("volume", &row.volume)?;
    if high < low {
        bail!("high {high} below low {low}");
    }

    Ok(Candle::new(
        symbol,
        timeframe,
        parse_timestamp(&row.timestamp)?,
        open,
        high,
        low,
        close,
        volume,
    ))
}

/// RFC 3339, or epoch milliseconds when the field is all digits.
fn parse_timestamp(raw: &str) -> Result<Timestamp> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().context("epoch milliseconds")?;
        return DateTime::from_timestamp_millis(millis)
            .with_context(|| format!("timestamp {millis} out of range"));
    }

    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("timestamp {raw:?} is neither RFC 3339 nor epoch millis"))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_in_both_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("1704067200000").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn row_with_inverted_range_is_rejected() {
        let row = Row {
            timestamp: "2024-01-01T00:00:00Z".into(),
            open: "100".into(),
            high: "99".into(),
            low: "101".into(),
            close: "100".into(),
            volume: "1".into(),
        };
        assert!(to_candle(&row, "TEST", Timeframe::OneHour).is_err());
    }

    #[test]
    fn mode_maps_to_detection_mode() {
        assert_eq!(DetectionMode::from(Mode::Seed), DetectionMode::SeedAndGrow);
        assert_eq!(DetectionMode::from(Mode::Sliding), DetectionMode::SlidingWindow);
    }
}
