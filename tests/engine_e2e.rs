// tests/engine_e2e.rs
//
// Whole-pipeline scenarios: lines → router → queue → tick → snapshot → report payload.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use weather_gateway::config::SensorConfig;
use weather_gateway::engine::{Engine, EngineSnapshot};
use weather_gateway::ingest::lines::LineSource;
use weather_gateway::ingest::scheduler::run_tick;
use weather_gateway::ingest::types::SensorEvent;
use weather_gateway::ingest::{event_queue, pump, TopicRouter};
use weather_gateway::report::build_payload;
use weather_gateway::rollover::ClockZone;
use weather_gateway::sensors::{FieldValue, SensorKind};
use weather_gateway::store::HistoryRecord;

// 2024-05-14 10:05:00 UTC (Tuesday)
const T: i64 = 1_715_681_100;

fn sensor(topic: &str, names: &[(&str, &str)]) -> SensorConfig {
    SensorConfig {
        topic: topic.to_string(),
        names: names
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..Default::default()
    }
}

fn sensors() -> BTreeMap<SensorKind, SensorConfig> {
    let mut m = BTreeMap::new();
    m.insert(SensorKind::Temperature, sensor("w4l/temp", &[("1", "tempf")]));
    m.insert(SensorKind::Humidity, sensor("w4l/humidity", &[("1", "humidity")]));
    m.insert(
        SensorKind::WindSpeed,
        sensor(
            "w4l/windspeed",
            &[("1", "windspeedmph"), ("2", "windgustmph"), ("3", "windspdmph_avg2m")],
        ),
    );
    m.insert(
        SensorKind::RainRate,
        sensor(
            "w4l/rainrate",
            &[
                ("1", "rainratein"),
                ("2", "eventrainin"),
                ("3", "hourlyrainin"),
                ("4", "dailyrainin"),
                ("9", "last24hrainin"),
            ],
        ),
    );
    m.insert(
        SensorKind::LightningNumber,
        sensor(
            "w4l/lightning_number",
            &[("1", "lightning_num"), ("2", "lightning_event"), ("4", "lightning_day")],
        ),
    );
    m
}

fn engine() -> Engine {
    Engine::new(sensors(), ClockZone::Utc, HistoryRecord::default())
}

fn ev(at: i64, kind: SensorKind, raw: &str) -> SensorEvent {
    SensorEvent {
        at,
        kind,
        raw: raw.to_string(),
    }
}

fn num(v: &FieldValue) -> f64 {
    match v {
        FieldValue::Number(n) => *n,
        FieldValue::Text(t) => panic!("expected number, got {t:?}"),
    }
}

#[test]
fn rain_three_readings_ten_minutes_apart() {
    let mut e = engine();
    // 0.33 mm per 10 minutes → 1.98 mm/h, above the event threshold.
    for i in 0..3 {
        e.ingest(&ev(T + i * 600, SensorKind::RainRate, "0.33")).unwrap();
    }
    let rec = e.record();
    assert!((rec.rain.hourly.amount - 0.039).abs() < 1e-9);
    assert!((rec.rain.event.amount - 0.039).abs() < 1e-9);
    assert_eq!(rec.rain.minutes.len(), 3);

    let v = e.values();
    assert!((num(&v["hourlyrainin"]) - 0.039).abs() < 1e-9);
    assert!((num(&v["eventrainin"]) - 0.039).abs() < 1e-9);
    assert!((num(&v["dailyrainin"]) - 0.039).abs() < 1e-9);
    assert!((num(&v["rainratein"]) - 0.078).abs() < 1e-9);
}

#[test]
fn rolling_hour_decays_but_daily_survives() {
    let mut e = engine();
    e.ingest(&ev(T, SensorKind::RainRate, "1.0")).unwrap();
    let daily = num(&e.values()["dailyrainin"]);
    assert!(daily > 0.0);

    // 10:05 + 1h + 1s: minute bucket expired, same day.
    e.tick(T + 3_601);
    assert_eq!(num(&e.values()["hourlyrainin"]), 0.0);
    assert_eq!(num(&e.values()["dailyrainin"]), daily);
    assert!(num(&e.values()["last24hrainin"]) > 0.0);
}

#[test]
fn daily_total_resets_at_midnight() {
    let mut e = engine();
    e.ingest(&ev(T, SensorKind::RainRate, "1.0")).unwrap();
    // 2024-05-15 00:00:05 UTC
    let next_day = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 5).unwrap().timestamp();
    let out = e.tick(next_day);
    assert!(out.rain.daily);
    assert!(!out.rain.weekly);
    assert_eq!(num(&e.values()["dailyrainin"]), 0.0);
    assert!(e.record().rain.weekly.amount > 0.0);
}

#[test]
fn lightning_counter_sequence() {
    let mut e = engine();
    let mut event_totals = vec![];
    for (i, raw) in ["5", "5", "12", "3"].iter().enumerate() {
        let f = e
            .ingest(&ev(T + i as i64 * 30, SensorKind::LightningNumber, raw))
            .unwrap();
        // Slot 2: event tier. Increments are 5, 0, 7, then 3 after the reset.
        event_totals.push(num(&f[&2]));
    }
    assert_eq!(event_totals, vec![5.0, 5.0, 12.0, 15.0]);
    assert_eq!(e.record().lightning.offset, 3.0);
    assert_eq!(num(&e.values()["lightning_num"]), 3.0);
    assert_eq!(num(&e.values()["lightning_day"]), 15.0);
}

#[tokio::test]
async fn lines_flow_through_to_report_payload() {
    let input: &[u8] = b"station/w4l/temp 20.0\n\
station/w4l/humidity 55.04\n\
station/w4l/windspeed 2.0\n\
station/w4l/windspeed 4.0\n\
station/unknown 1\n\
station/w4l/temp oops\n";
    let cfg = sensors();
    let router = TopicRouter::from_sensors(&cfg);
    let (tx, mut rx) = event_queue(64);
    let mut src = LineSource::new(input);
    let queued = pump(&mut src, &router, &tx).await;
    assert_eq!(queued, 5);

    let mut e = Engine::new(cfg, ClockZone::Utc, HistoryRecord::default());
    let (snap_tx, snap_rx) = watch::channel(Arc::new(EngineSnapshot::default()));
    let drained = run_tick(&mut e, &mut rx, &snap_tx, T);
    assert_eq!(drained, 5);

    let snap = snap_rx.borrow().clone();
    let now = Utc.timestamp_opt(T, 0).single().unwrap();
    let payload = build_payload(&snap, now);
    assert_eq!(payload["tempf"], "68");
    assert_eq!(payload["humidity"], "55");
    assert_eq!(payload["windgustmph"], num(&snap.values["windgustmph"]).to_string());
    assert!(num(&snap.values["windgustmph"]) > num(&snap.values["windspdmph_avg2m"]));
    assert_eq!(payload["dateutc"], "2024-05-14 10:05:00");
    assert!(!payload.contains_key("rainratein"));
}
