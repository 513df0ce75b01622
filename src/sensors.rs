//! Sensor kinds the gateway understands, and the stateless ones' conversions.
//!
//! Stateful kinds (wind, rain, lightning counter) are handled by the engine;
//! everything else maps one raw payload to a fixed set of output slots here.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::SensorConfig;
use crate::convert::{c_to_f, hpa_to_inhg, parse_f64, round_to, SENTINEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "pressure")]
    Pressure,
    #[serde(rename = "illuminance")]
    Illuminance,
    #[serde(rename = "twilight")]
    Twilight,
    #[serde(rename = "uv")]
    Uv,
    #[serde(rename = "windspeed")]
    WindSpeed,
    #[serde(rename = "winddir")]
    WindDir,
    #[serde(rename = "solarradiation")]
    SolarRadiation,
    #[serde(rename = "rainstate")]
    RainState,
    #[serde(rename = "rainrate")]
    RainRate,
    #[serde(rename = "lightning_last")]
    LightningLast,
    #[serde(rename = "lightning_distance")]
    LightningDistance,
    #[serde(rename = "lightning_number")]
    LightningNumber,
}

impl SensorKind {
    pub const ALL: [SensorKind; 14] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Pressure,
        SensorKind::Illuminance,
        SensorKind::Twilight,
        SensorKind::Uv,
        SensorKind::WindSpeed,
        SensorKind::WindDir,
        SensorKind::SolarRadiation,
        SensorKind::RainState,
        SensorKind::RainRate,
        SensorKind::LightningLast,
        SensorKind::LightningDistance,
        SensorKind::LightningNumber,
    ];

    /// Config key of this kind.
    pub fn key(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temp",
            SensorKind::Humidity => "humidity",
            SensorKind::Pressure => "pressure",
            SensorKind::Illuminance => "illuminance",
            SensorKind::Twilight => "twilight",
            SensorKind::Uv => "uv",
            SensorKind::WindSpeed => "windspeed",
            SensorKind::WindDir => "winddir",
            SensorKind::SolarRadiation => "solarradiation",
            SensorKind::RainState => "rainstate",
            SensorKind::RainRate => "rainrate",
            SensorKind::LightningLast => "lightning_last",
            SensorKind::LightningDistance => "lightning_distance",
            SensorKind::LightningNumber => "lightning_number",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    /// Kinds whose output depends on earlier readings.
    pub fn is_stateful(self) -> bool {
        matches!(
            self,
            SensorKind::WindSpeed
                | SensorKind::WindDir
                | SensorKind::RainState
                | SensorKind::RainRate
                | SensorKind::LightningNumber
        )
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One published value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// Output slot ("1".."9") → value.
pub type Fields = BTreeMap<u8, FieldValue>;

/// Number the values from slot 1.
pub fn numbered(values: &[f64]) -> Fields {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u8 + 1, FieldValue::Number(*v)))
        .collect()
}

/// Convert a payload of a stateless kind.
pub fn convert_stateless(kind: SensorKind, raw: &str, cfg: &SensorConfig) -> Result<Fields> {
    let fields = match kind {
        SensorKind::Temperature => numbered(&[c_to_f(parse_f64(raw)?, 1)]),
        SensorKind::Humidity | SensorKind::LightningDistance => {
            numbered(&[round_to(parse_f64(raw)?, 1)])
        }
        SensorKind::Pressure => {
            let hpa = parse_f64(raw)?;
            numbered(&[
                hpa_to_inhg(hpa, 3),
                hpa_to_inhg(hpa + altitude_correction(cfg.height), 3),
            ])
        }
        SensorKind::Illuminance => {
            let lux = round_to(parse_f64(raw)?, 1);
            if cfg.calc_sr > 0.0 {
                // 126.7 lux per W/m² is the factor Ecowitt uses.
                numbered(&[lux, round_to(lux / 126.7, 2)])
            } else {
                numbered(&[lux])
            }
        }
        SensorKind::Twilight => {
            let v = parse_f64(raw)?;
            let pct = match cfg.max {
                Some(max) if max > 0.0 => round_to(v / max * 100.0, 1),
                _ => SENTINEL,
            };
            numbered(&[pct])
        }
        SensorKind::Uv => numbered(&[round_to(parse_f64(raw)? / 0.1, 1)]),
        SensorKind::SolarRadiation => {
            let v = (parse_f64(raw)? - cfg.offset.unwrap_or(0.0)).max(0.0);
            let sr = match cfg.max {
                Some(max) if max > 0.0 => {
                    let sr = round_to(v * 1000.0 / max * 1000.0, 1);
                    if sr < 0.6 {
                        0.0
                    } else {
                        sr
                    }
                }
                _ => SENTINEL,
            };
            numbered(&[sr])
        }
        SensorKind::LightningLast => {
            // Unparseable timestamps publish 0 rather than being dropped.
            let last = parse_f64(raw).map(|v| v.max(0.0).trunc() as i64).unwrap_or(0);
            let mut f = Fields::new();
            f.insert(1, FieldValue::Text(last.to_string()));
            f
        }
        other => anyhow::bail!("{other} is handled by the engine"),
    };
    Ok(fields)
}

/// hPa to add for relative (sea-level) pressure at `height` metres.
fn altitude_correction(height: Option<f64>) -> f64 {
    match height {
        Some(h) if h > 880.0 => h / 11.0,
        Some(h) if h > 0.0 => h / 8.0,
        _ => 0.0,
    }
}
