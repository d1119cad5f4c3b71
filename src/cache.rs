//! Disk-backed, time-expiring key-value caches.
//!
//! Two caches share this implementation: geocoding results keyed by the raw
//! address, and road distances keyed by an ordered coordinate pair. Each is a
//! single JSON object on disk whose values carry an ISO-8601 timestamp.
//!
//! [`CacheStore`] is the file format: `load` purges expired entries, `save`
//! rewrites the whole file. [`SharedCache`] is the single owner the workers
//! go through; it keeps the map in memory behind a lock, so concurrent
//! writers never drop each other's entries. `insert` saves immediately;
//! `insert_deferred` only marks the map dirty until the next `flush`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coordinate::Coordinate;
use crate::error::CacheError;

/// A cached value plus the moment it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    #[serde(flatten)]
    pub value: V,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    /// Visible only while `now - timestamp < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.timestamp < ttl
    }
}

/// Geocode cache payload: `{"coords": [lat, lon]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoValue {
    pub coords: [f64; 2],
}

impl From<Coordinate> for GeoValue {
    fn from(coord: Coordinate) -> Self {
        Self {
            coords: [coord.lat, coord.lon],
        }
    }
}

impl From<GeoValue> for Coordinate {
    fn from(value: GeoValue) -> Self {
        Self::new(value.coords[0], value.coords[1])
    }
}

/// Distance cache payload: `{"distance": km}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceValue {
    pub distance: f64,
}

/// Ordered-pair key `"lat1,lon1_lat2,lon2"`. `(a, b)` and `(b, a)` differ.
pub fn distance_key(from: Coordinate, to: Coordinate) -> String {
    format!("{}_{}", from.key(), to.key())
}

/// A JSON object file of timestamped entries.
#[derive(Debug, Clone)]
pub struct CacheStore<V> {
    path: PathBuf,
    ttl: TimeDelta,
    _value: PhantomData<fn() -> V>,
}

impl<V> CacheStore<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, ttl: TimeDelta) -> Self {
        Self {
            path: path.into(),
            ttl,
            _value: PhantomData,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Read the file and keep only fresh, well-formed entries.
    ///
    /// A missing file is an empty cache.
    pub fn try_load(&self, now: DateTime<Utc>) -> Result<HashMap<String, CacheEntry<V>>, CacheError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(|source| CacheError::Json {
                path: self.path.clone(),
                source,
            })?;

        let total = raw.len();
        let entries: HashMap<_, _> = raw
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<CacheEntry<V>>(value) {
                Ok(entry) => Some((key, entry)),
                Err(err) => {
                    debug!(%key, error = %err, "dropping unreadable cache entry");
                    None
                }
            })
            .filter(|(_, entry)| entry.is_fresh(now, self.ttl))
            .collect();

        debug!(
            path = %self.path.display(),
            kept = entries.len(),
            dropped = total - entries.len(),
            "cache loaded"
        );
        Ok(entries)
    }

    /// Like [`try_load`](Self::try_load), but a failure is logged and yields
    /// an empty cache.
    pub fn load(&self, now: DateTime<Utc>) -> HashMap<String, CacheEntry<V>> {
        self.try_load(now).unwrap_or_else(|err| {
            warn!(error = %err, "cache unavailable, starting empty");
            HashMap::new()
        })
    }

    /// Overwrite the file with `entries`.
    pub fn save(&self, entries: &HashMap<String, CacheEntry<V>>) -> Result<(), CacheError> {
        let sorted: BTreeMap<&String, &CacheEntry<V>> = entries.iter().collect();
        let json = serde_json::to_string_pretty(&sorted).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// The one owner of a cache during a run.
#[derive(Debug)]
pub struct SharedCache<V> {
    store: CacheStore<V>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    /// Set by `insert_deferred`, cleared by a successful save.
    dirty: AtomicBool,
}

pub type GeoCache = SharedCache<GeoValue>;
pub type DistanceCache = SharedCache<DistanceValue>;

impl<V> SharedCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn open(store: CacheStore<V>, now: DateTime<Utc>) -> Self {
        let entries = store.load(now);
        Self {
            store,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    /// The value under `key`, if present and still within its TTL.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.store.ttl()))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` stamped with `now` and flush the whole cache to disk.
    ///
    /// A failed flush is logged; the in-memory entry stays visible.
    pub fn insert(&self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("cache lock poisoned, skipping insert");
            return;
        };
        entries.insert(key.into(), CacheEntry::new(value, now));
        self.save_locked(&entries);
    }

    /// Store `value` in memory only; the next `flush` writes it out.
    pub fn insert_deferred(&self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("cache lock poisoned, skipping insert");
            return;
        };
        entries.insert(key.into(), CacheEntry::new(value, now));
        self.dirty.store(true, Ordering::Release);
    }

    /// Write the cache to disk if a deferred insert is pending.
    pub fn flush(&self) {
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        let Ok(entries) = self.entries.lock() else {
            warn!("cache lock poisoned, skipping flush");
            return;
        };
        self.save_locked(&entries);
    }

    fn save_locked(&self, entries: &HashMap<String, CacheEntry<V>>) {
        match self.store.save(entries) {
            Ok(()) => self.dirty.store(false, Ordering::Release),
            Err(err) => warn!(error = %err, "failed to save cache"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RFC 3339 on write; RFC 3339 or naive ISO-8601 (read as UTC) on read.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| de::Error::custom(format!("invalid timestamp {text:?}")))
    }

    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
