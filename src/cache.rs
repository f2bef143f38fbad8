use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Candle, Error, Result, Timeframe, Timestamp};

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    stored_at: Timestamp,
    candles: Vec<Candle>,
}

/// JSON file of candle sequences keyed by symbol, timeframe and count.
///
/// Entries are kept as raw JSON until read, so one undecodable entry does
/// not hide the others. A file that is not a JSON object at all is treated
/// as an empty cache and replaced on the next [`set`](Self::set).
///
/// # Example
///
/// ```no_run
/// use market_structure_ta::{CandleCache, Timeframe};
///
/// let cache = CandleCache::open("candles.json")?;
/// if let Some(candles) = cache.get("BTC/USD", Timeframe::OneHour, 500) {
///     println!("{} cached candles", candles.len());
/// }
/// # Ok::<(), market_structure_ta::Error>(())
/// ```
#[derive(Debug)]
pub struct CandleCache {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl CandleCache {
    /// Loads the cache at `path`. A missing or corrupt file yields an empty
    /// cache.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "corrupt candle cache, starting empty");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(Error::Io { path, source }),
        };

        debug!(path = %path.display(), entries = entries.len(), "candle cache opened");
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn key(symbol: &str, timeframe: Timeframe, count: usize) -> String {
        format!("{symbol}_{timeframe}_{count}")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` when the entry is missing or cannot be decoded.
    #[must_use]
    pub fn get(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Option<Vec<Candle>> {
        let key = Self::key(symbol, timeframe, count);
        Self::decode(&key, self.entries.get(&key)?).map(|entry| entry.candles)
    }

    /// Most recently stored entry for `symbol` and `timeframe`, whatever its
    /// count.
    #[must_use]
    pub fn latest(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<Candle>> {
        let prefix = format!("{symbol}_{timeframe}_");
        self.entries
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(&prefix)
                    .is_some_and(|count| count.parse::<usize>().is_ok())
            })
            .filter_map(|(key, value)| Self::decode(key, value))
            .max_by_key(|entry| entry.stored_at)
            .map(|entry| entry.candles)
    }

    /// Stores `candles` under their count and rewrites the file.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if encoding fails, [`Error::Io`] if the file or its
    /// parent directory cannot be written.
    pub fn set(&mut self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<()> {
        let key = Self::key(symbol, timeframe, candles.len());
        let entry = CacheEntry {
            stored_at: Utc::now(),
            candles: candles.to_vec(),
        };
        self.entries.insert(key.clone(), serde_json::to_value(entry)?);

        let text = serde_json::to_string_pretty(&self.entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, text).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(%key, candles = candles.len(), "candles cached");
        Ok(())
    }

    fn decode(key: &str, value: &Value) -> Option<CacheEntry> {
        serde_json::from_value(value.clone())
            .inspect_err(|err| warn!(%key, %err, "undecodable cache entry"))
            .ok()
    }
}
