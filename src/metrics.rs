use chrono_tz::Tz;
use izypower_rs::model::Snapshot;
use izypower_rs::presentation::{self, Reading, Value};
use izypower_rs::Error;
use prometheus::{Counter, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::collections::BTreeMap;

lazy_static! {
    pub static ref UP_GAUGE: Gauge = register_gauge!(opts!(
        "izypower_up",
        "whether the last polling cycle succeeded",
    ))
    .unwrap();
    pub static ref LAST_SUCCESS_GAUGE: Gauge = register_gauge!(opts!(
        "izypower_last_success_timestamp_seconds",
        "unix time of the last successful polling cycle",
    ))
    .unwrap();
    pub static ref COLLECT_DURATION_GAUGE: Gauge = register_gauge!(opts!(
        "izypower_collect_duration_seconds",
        "duration of the last polling cycle",
    ))
    .unwrap();
    pub static ref COLLECT_FAILURES_COUNTER: Counter = register_counter!(opts!(
        "izypower_collect_failures_total",
        "number of polling cycles that failed",
    ))
    .unwrap();
}

fn metric_name(reading: &Reading) -> String {
    format!("izypower_{}", reading.key)
}

fn help(reading: &Reading) -> String {
    match reading.unit {
        Some(unit) => format!("{} ({}, {})", reading.key, unit, reading.category.as_str()),
        None => format!("{} ({})", reading.key, reading.category.as_str()),
    }
}

/// Build a registry holding one gauge per reading of `snapshot`.
///
/// Text values are exported as `1` with the text in a `value` label; timestamps as unix seconds.
pub fn snapshot_registry(snapshot: &Snapshot, tz: Tz) -> Result<Registry, Error> {
    let registry = Registry::new();
    let mut gauges: BTreeMap<String, GaugeVec> = BTreeMap::new();

    for reading in presentation::readings(snapshot, tz) {
        let mut label_names: Vec<&str> = reading.labels.iter().map(|(name, _)| *name).collect();
        let mut label_values: Vec<&str> = reading.labels.iter().map(|(_, value)| value.as_str()).collect();

        let value = match &reading.value {
            Value::Number(n) => *n,
            Value::Timestamp(t) => t.timestamp() as f64,
            Value::Text(text) => {
                label_names.push("value");
                label_values.push(text.as_str());
                1.0
            }
        };

        let name = metric_name(&reading);
        if !gauges.contains_key(&name) {
            let gauge = GaugeVec::new(opts!(name.as_str(), help(&reading)), &label_names)
                .or(Err(Error::FormatError))?;
            registry
                .register(Box::new(gauge.clone()))
                .or(Err(Error::FormatError))?;
            gauges.insert(name.clone(), gauge);
        }
        let gauge = &gauges[&name];

        match gauge.get_metric_with_label_values(&label_values) {
            Ok(metric) => metric.set(value),
            Err(e) => log::error!("Unable to export {} {:?}: {}", name, reading.labels, e),
        }
    }

    Ok(registry)
}

/// Encode process metrics and, when present, the metrics of `snapshot`.
pub fn read(snapshot: Option<&Snapshot>, tz: Tz) -> Result<String, Error> {
    let mut metric_families = prometheus::gather();
    if let Some(snapshot) = snapshot {
        metric_families.extend(snapshot_registry(snapshot, tz)?.gather());
    }

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}

#[cfg(test)]
mod test {
    use super::*;
    use izypower_rs::api::response::devices::DeviceRecord;
    use izypower_rs::api::response::station_info::StationInfo;
    use izypower_rs::api::response::stations::StationRecord;
    use izypower_rs::model::StationDevices;

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot {
            stations: vec![StationRecord {
                stations_id: Some("42".to_owned()),
                installed_capacity: Some(6000.0),
                ..StationRecord::default()
            }],
            ..Snapshot::default()
        };
        snapshot.stations_info.insert(
            "42".to_owned(),
            StationInfo {
                power: Some(1520.0),
                last_update: Some("2026-02-10 22:39:29 UTC+01:00".to_owned()),
                ..StationInfo::default()
            },
        );
        snapshot.stations_devices.insert(
            "42".to_owned(),
            StationDevices {
                devices: vec![DeviceRecord {
                    device_id: Some("7".to_owned()),
                    online_state: Some(serde_json::json!(1)),
                    ..DeviceRecord::default()
                }],
                ..StationDevices::default()
            },
        );
        snapshot
    }

    fn has_sample(text: &str, name: &str, labels: &[&str], value: &str) -> bool {
        text.lines().any(|line| {
            line.starts_with(&format!("{}{{", name))
                && labels.iter().all(|label| line.contains(label))
                && line.ends_with(&format!(" {}", value))
        })
    }

    #[test]
    fn renders_snapshot() {
        let text = read(Some(&snapshot()), chrono_tz::UTC).unwrap();

        assert!(has_sample(&text, "izypower_installed_capacity", &["station=\"42\""], "6000"));
        assert!(has_sample(&text, "izypower_production_power", &["station=\"42\""], "1520"));
        assert!(has_sample(&text, "izypower_production_energy", &["period=\"day\"", "station=\"42\""], "0"));
        assert!(has_sample(&text, "izypower_last_update", &["station=\"42\""], "1770763169"));
        assert!(has_sample(
            &text,
            "izypower_online_state",
            &["device=\"7\"", "station=\"42\"", "value=\"1\""],
            "1"
        ));
        assert!(text.contains("# TYPE izypower_production_power gauge"));
    }

    #[test]
    fn renders_without_snapshot() {
        UP_GAUGE.set(0.0);
        let text = read(None, chrono_tz::UTC).unwrap();
        assert!(text.contains("izypower_up 0"));
        assert!(!text.contains("izypower_installed_capacity"));
    }
}
