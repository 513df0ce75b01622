// src/config/mod.rs
pub mod gateway;

pub use gateway::{ApiConfig, EngineConfig, GatewayConfig, ReportConfig, SensorConfig};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "GATEWAY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// Load configuration from an explicit TOML file.
pub fn load_config_from(path: &Path) -> Result<GatewayConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading gateway config from {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load configuration using env var + fallbacks:
/// 1) $GATEWAY_CONFIG_PATH
/// 2) config/gateway.toml
/// 3) built-in defaults (no sensors, reporting off)
pub fn load_config_default() -> Result<GatewayConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("GATEWAY_CONFIG_PATH points to non-existent path"));
        }
    }
    let p = PathBuf::from(DEFAULT_CONFIG_PATH);
    if p.exists() {
        return load_config_from(&p);
    }
    tracing::info!(target: "config", "no config file found; using defaults");
    Ok(GatewayConfig::default())
}

pub fn parse_config(s: &str) -> Result<GatewayConfig> {
    let mut cfg: GatewayConfig = toml::from_str(s)?;

    // Sanitize intervals so the loops can't spin or stall.
    cfg.engine.tick_ms = cfg.engine.tick_ms.clamp(10, 60_000);
    cfg.engine.queue_capacity = cfg.engine.queue_capacity.max(1);
    cfg.report.interval_secs = cfg.report.interval_secs.max(1);
    cfg.report.timeout_secs = cfg.report.timeout_secs.max(1);

    for (kind, sc) in &cfg.sensors {
        if sc.topic.trim().is_empty() {
            tracing::warn!(target: "config", sensor = %kind, "sensor has no topic; it will never match");
        }
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollover::ClockZone;
    use crate::sensors::SensorKind;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.engine.tick_ms, 100);
        assert_eq!(cfg.engine.queue_capacity, 10_000);
        assert_eq!(cfg.engine.timezone, ClockZone::Local);
        assert!(!cfg.report.enabled);
        assert!(cfg.sensors.is_empty());
    }

    #[test]
    fn sensors_and_report_parse() {
        let cfg = parse_config(
            r#"
[engine]
tick_ms = 1
timezone = "utc"

[report]
enabled = true
server = "http://rtd.example/"
port = 8090

[sensors.winddir]
topic = "w4l/winddir"
names = { "1" = "winddir", "2" = "winddir_avg2m" }
converttable = { "0.4" = 0.0, "2.5" = 90.0 }

[sensors.rainrate]
topic = "w4l/rain"
"#,
        )
        .unwrap();
        assert_eq!(cfg.engine.tick_ms, 10);
        assert_eq!(cfg.engine.timezone, ClockZone::Utc);
        assert_eq!(cfg.report.url(), "http://rtd.example:8090/data/report/");
        let wd = &cfg.sensors[&SensorKind::WindDir];
        assert_eq!(wd.name_for(2), Some("winddir_avg2m"));
        assert_eq!(wd.name_for(3), None);
        assert_eq!(wd.converttable.get("2.5"), Some(&90.0));
        assert!(cfg.sensors.contains_key(&SensorKind::RainRate));
    }

    #[test]
    fn unknown_sensor_kind_is_rejected() {
        assert!(parse_config("[sensors.sonar]\ntopic = \"x\"").is_err());
    }
}
