//! # State Store
//! Loads the durable history record at startup and writes it back at
//! shutdown.
//!
//! Loading never fails: a missing or corrupt file yields the empty record,
//! and every absent field falls back to its default on its own. Records
//! written by older gateways (numbers as strings, float bucket keys) load
//! as well.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::accumulator::AccumulatorState;

pub const DEFAULT_STATE_PATH: &str = "data/history.json";

/// Lightning additionally remembers the last absolute strike counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningState {
    #[serde(flatten)]
    pub totals: AccumulatorState,
    #[serde(deserialize_with = "lenient::number")]
    pub offset: f64,
}

/// Everything the gateway persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    pub rain: AccumulatorState,
    pub lightning: LightningState,
}

impl HistoryRecord {
    /// Parse a record, defaulting whatever is missing.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parse history record")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize history record")
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record; any failure is logged and replaced by defaults.
    pub async fn load(&self) -> HistoryRecord {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) => {
                tracing::info!(
                    target: "store",
                    path = %self.path.display(),
                    "cannot read history data ({e}); using empty dataset"
                );
                return HistoryRecord::default();
            }
        };
        match HistoryRecord::from_json(&raw) {
            Ok(rec) => {
                tracing::info!(target: "store", path = %self.path.display(), "history data loaded");
                rec
            }
            Err(e) => {
                tracing::info!(
                    target: "store",
                    path = %self.path.display(),
                    "history data unreadable ({e:#}); using empty dataset"
                );
                HistoryRecord::default()
            }
        }
    }

    /// Write the record through a temp file so a crash mid-write keeps the
    /// previous copy.
    pub async fn save(&self, rec: &HistoryRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create state dir {}", dir.display()))?;
        }
        let body = rec.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename into {}", self.path.display()))?;
        tracing::info!(target: "store", path = %self.path.display(), "history data saved");
        Ok(())
    }
}

/// Tolerant deserializers for fields that older records stored as text.
pub(crate) mod lenient {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    impl NumOrText {
        /// `null` and non-finite values read as 0.
        fn or_zero<E: serde::de::Error>(v: Option<Self>) -> Result<f64, E> {
            match v {
                Some(v) => v.value().map(|n| if n.is_finite() { n } else { 0.0 }),
                None => Ok(0.0),
            }
        }

        fn value<E: serde::de::Error>(self) -> Result<f64, E> {
            match self {
                NumOrText::Num(n) => Ok(n),
                NumOrText::Text(s) if s.trim().is_empty() => Ok(0.0),
                NumOrText::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| E::custom(format!("bad number {s:?}: {e}"))),
            }
        }
    }

    fn parse_key<E: serde::de::Error>(k: &str) -> Result<f64, E> {
        k.trim()
            .parse::<f64>()
            .map_err(|e| E::custom(format!("bad key {k:?}: {e}")))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        NumOrText::or_zero(Option::<NumOrText>::deserialize(d)?)
    }

    /// Unix seconds; fractional seconds are dropped.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        number(d).map(|v| v.trunc() as i64)
    }

    pub fn epoch_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<i64, f64>, D::Error> {
        let raw = Option::<BTreeMap<String, Option<NumOrText>>>::deserialize(d)?.unwrap_or_default();
        raw.into_iter()
            .map(|(k, v)| {
                let ts = parse_key::<D::Error>(&k)?.trunc() as i64;
                Ok((ts, NumOrText::or_zero::<D::Error>(v)?))
            })
            .collect()
    }

    pub fn year_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<i32, f64>, D::Error> {
        let raw = Option::<BTreeMap<String, Option<NumOrText>>>::deserialize(d)?.unwrap_or_default();
        raw.into_iter()
            .map(|(k, v)| {
                let y = k
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| D::Error::custom(format!("bad year {k:?}: {e}")))?;
                Ok((y, NumOrText::or_zero::<D::Error>(v)?))
            })
            .collect()
    }
}
