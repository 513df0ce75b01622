// tests/state_store.rs
use std::collections::BTreeMap;
use std::fs;

use weather_gateway::config::SensorConfig;
use weather_gateway::engine::Engine;
use weather_gateway::ingest::types::SensorEvent;
use weather_gateway::rollover::ClockZone;
use weather_gateway::sensors::SensorKind;
use weather_gateway::store::{HistoryRecord, StateStore};

const T: i64 = 1_715_681_100;

fn ev(at: i64, kind: SensorKind, raw: &str) -> SensorEvent {
    SensorEvent {
        at,
        kind,
        raw: raw.to_string(),
    }
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nested/data/history.json"));

    let mut rec = HistoryRecord::default();
    rec.rain.daily.amount = 0.039;
    rec.rain.daily.last = 1_715_681_100;
    rec.rain.yearly.insert(2024, 12.5);
    rec.rain.minutes.insert(1_715_681_100, 0.013);
    rec.lightning.offset = 42.0;
    rec.lightning.totals.monthly.amount = 17.0;

    store.save(&rec).await.unwrap();
    assert!(store.path().exists());
    assert!(!store.path().with_extension("json.tmp").exists());

    let back = store.load().await;
    assert_eq!(back, rec);
}

#[tokio::test]
async fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nope.json"));
    assert_eq!(store.load().await, HistoryRecord::default());
}

#[tokio::test]
async fn corrupt_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("history.json");
    fs::write(&p, "{ not json").unwrap();
    let store = StateStore::new(&p);
    assert_eq!(store.load().await, HistoryRecord::default());
}

#[tokio::test]
async fn legacy_text_fields_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("history.json");
    fs::write(
        &p,
        r#"{
            "rain": {
                "daily": { "amount": "0.12", "last": "1715681100" },
                "1h": { "1715681100.0": "0.01" },
                "yearly": { "2023": "30.5" }
            },
            "lightning": { "offset": "7" }
        }"#,
    )
    .unwrap();
    let rec = StateStore::new(&p).load().await;
    assert_eq!(rec.rain.daily.amount, 0.12);
    assert_eq!(rec.rain.daily.last, 1_715_681_100);
    assert_eq!(rec.rain.minutes.get(&1_715_681_100), Some(&0.01));
    assert_eq!(rec.rain.yearly.get(&2023), Some(&30.5));
    assert_eq!(rec.lightning.offset, 7.0);
    assert_eq!(rec.rain.hourly, Default::default());
}

#[tokio::test]
async fn engine_history_survives_restart_despite_bad_readings() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("history.json"));

    let mut sensors = BTreeMap::new();
    sensors.insert(SensorKind::RainRate, SensorConfig::default());
    sensors.insert(SensorKind::LightningNumber, SensorConfig::default());
    let mut e = Engine::new(sensors.clone(), ClockZone::Utc, HistoryRecord::default());

    let readings = [
        (SensorKind::RainRate, "0.33"),
        (SensorKind::RainRate, "nan"),
        (SensorKind::RainRate, "-5"),
        (SensorKind::LightningNumber, "4"),
        (SensorKind::LightningNumber, "inf"),
        (SensorKind::RainRate, "1.0"),
        (SensorKind::LightningNumber, "9"),
    ];
    for (i, (kind, raw)) in readings.into_iter().enumerate() {
        let _ = e.ingest(&ev(T + i as i64 * 60, kind, raw));
    }
    let rec = e.record();
    assert!(rec.rain.yearly.values().all(|v| v.is_finite() && *v > 0.0));
    assert_eq!(rec.lightning.offset, 9.0);

    store.save(&rec).await.unwrap();
    let back = store.load().await;
    assert_ne!(back, HistoryRecord::default());
    assert_eq!(back, rec);

    // A restarted engine carries the same history forward.
    let restarted = Engine::new(sensors, ClockZone::Utc, back);
    assert_eq!(restarted.record(), rec);
}

#[tokio::test]
async fn nulls_in_saved_file_do_not_discard_history() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("history.json");
    fs::write(
        &p,
        r#"{
            "rain": {
                "daily": { "amount": 0.5, "last": 1715681100 },
                "yearly": { "2024": null, "2023": 30.5 }
            },
            "lightning": { "offset": null }
        }"#,
    )
    .unwrap();
    let rec = StateStore::new(&p).load().await;
    assert_eq!(rec.rain.daily.amount, 0.5);
    assert_eq!(rec.rain.yearly.get(&2023), Some(&30.5));
    assert_eq!(rec.rain.yearly.get(&2024), Some(&0.0));
    assert_eq!(rec.lightning.offset, 0.0);
}
