use crate::api::response::battery::{BatteryAggregate, BatteryLinkItem, FlowState, PvEntry};
use crate::api::response::component::PvData;
use crate::api::response::devices::DeviceRecord;
use crate::api::response::report::Report;
use crate::api::response::station_info::{Counters, StationInfo};
use crate::api::response::stations::StationRecord;
use crate::api::response::wifi::WifiInfo;
use crate::model::Snapshot;
use chrono::DateTime;
use chrono_tz::Tz;
use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Measurement,
    TotalIncreasing,
    Diagnostic,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Measurement => "measurement",
            Category::TotalIncreasing => "total_increasing",
            Category::Diagnostic => "diagnostic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Tz>),
}

type Extract<S> = Box<dyn Fn(&S, Tz) -> Option<Value> + Send + Sync>;

/// Static description of one exported value of a snapshot element of type `S`.
pub struct Descriptor<S> {
    pub key: &'static str,
    pub unit: Option<&'static str>,
    pub category: Category,
    pub labels: Vec<(&'static str, &'static str)>,
    extract: Extract<S>,
}

impl<S> Descriptor<S> {
    fn new<F>(key: &'static str, unit: Option<&'static str>, category: Category, extract: F) -> Descriptor<S>
    where
        F: Fn(&S, Tz) -> Option<Value> + Send + Sync + 'static,
    {
        Descriptor {
            key,
            unit,
            category,
            labels: Vec::new(),
            extract: Box::new(extract),
        }
    }

    fn label(mut self, name: &'static str, value: &'static str) -> Descriptor<S> {
        self.labels.push((name, value));
        self
    }

    pub fn extract(&self, source: &S, tz: Tz) -> Option<Value> {
        (self.extract)(source, tz)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub key: &'static str,
    pub unit: Option<&'static str>,
    pub category: Category,
    pub labels: Vec<(&'static str, String)>,
    pub value: Value,
}

const W: Option<&str> = Some("W");
const KWH: Option<&str> = Some("kWh");
const PERCENT: Option<&str> = Some("%");
const DBM: Option<&str> = Some("dBm");

/* (label, consumption, battery discharge, grid import) */
const CONSUMPTION_FROM_PV: [(&str, &str, &str, &str); 4] = [
    ("day", "day", "day_out", "day2"),
    ("month", "month", "month_out", "month2"),
    ("year", "year", "year_out", "year2"),
    ("total", "all", "total_out", "total2"),
];

const PERIODS: [(&str, &str); 4] = [("day", "day"), ("month", "month"), ("year", "year"), ("total", "all")];

const REPORT_RATES: [&str; 7] = [
    "cover_rate",
    "storage_in_rate",
    "energy_self_rate",
    "meter_energy_p_rate",
    "storage_out_rate",
    "consumption_rate",
    "meter_energy_n_rate",
];

lazy_static! {
    static ref STATION_RECORD: Vec<Descriptor<StationRecord>> = vec![Descriptor::new(
        "installed_capacity",
        W,
        Category::Diagnostic,
        |s: &StationRecord, _| s.installed_capacity.map(Value::Number),
    )];
    static ref STATION_INFO: Vec<Descriptor<StationInfo>> = station_info_descriptors();
    static ref REPORT: Vec<Descriptor<Report>> = REPORT_RATES
        .iter()
        .map(|&rate| {
            Descriptor::new(rate, PERCENT, Category::Measurement, move |r: &Report, _| {
                r.rate(rate).map(Value::Number)
            })
        })
        .collect();
    static ref DEVICE: Vec<Descriptor<DeviceRecord>> = device_descriptors();
    static ref WIFI: Vec<Descriptor<WifiInfo>> = vec![
        Descriptor::new("wifi_signal", DBM, Category::Diagnostic, |w: &WifiInfo, _| w.rssi.map(Value::Number)),
        Descriptor::new("wifi_network", None, Category::Diagnostic, |w: &WifiInfo, _| {
            w.wifi.clone().map(Value::Text)
        }),
        Descriptor::new("ip_address", None, Category::Diagnostic, |w: &WifiInfo, _| {
            w.ip.clone().map(Value::Text)
        }),
    ];
    static ref BATTERY: Vec<Descriptor<BatteryAggregate>> = battery_descriptors();
    static ref BATTERY_PV: Vec<Descriptor<PvEntry>> = vec![Descriptor::new(
        "battery_device_pv_power",
        W,
        Category::Measurement,
        |p: &PvEntry, _| p.power.map(Value::Number),
    )];
    static ref BATTERY_LINK: Vec<Descriptor<BatteryLinkItem>> = vec![
        Descriptor::new("battery_link_soc", PERCENT, Category::Measurement, |i: &BatteryLinkItem, _| {
            i.soc.map(Value::Number)
        }),
        Descriptor::new("battery_link_kwh", KWH, Category::Measurement, |i: &BatteryLinkItem, _| {
            i.kwh.map(Value::Number)
        }),
    ];
    static ref PV_STRING: Vec<Descriptor<PvData>> = vec![Descriptor::new(
        "pv_power",
        W,
        Category::Measurement,
        |p: &PvData, _| Some(Value::Number(p.pv_power.unwrap_or(0.0))),
    )];
}

fn power(key: &'static str, field: fn(&StationInfo) -> Option<f64>) -> Descriptor<StationInfo> {
    Descriptor::new(key, W, Category::Measurement, move |s: &StationInfo, _| {
        Some(Value::Number(field(s).unwrap_or(0.0)))
    })
}

fn energy(
    key: &'static str,
    counters: fn(&StationInfo) -> &Counters,
    period: &'static str,
    field: String,
) -> Descriptor<StationInfo> {
    Descriptor::new(key, KWH, Category::TotalIncreasing, move |s: &StationInfo, _| {
        Some(Value::Number(counters(s).get(&field).unwrap_or(0.0)))
    })
    .label("period", period)
}

fn station_info_descriptors() -> Vec<Descriptor<StationInfo>> {
    let mut descriptors = vec![
        power("production_power", |s| s.power),
        power("grid_power", |s| s.grid_power),
        power("consumption_power", |s| s.consumption),
        power("battery_power", |s| s.battery_power),
        power("battery_pv_power", |s| s.battery_pv_power),
        Descriptor::new("battery_soc", PERCENT, Category::Measurement, |s: &StationInfo, _| {
            s.battery_soc.map(Value::Number)
        }),
        Descriptor::new("last_update", None, Category::Diagnostic, |s: &StationInfo, tz| {
            s.last_update_at(tz).map(Value::Timestamp)
        }),
    ];

    for (label, field) in PERIODS {
        descriptors.push(energy("production_energy", |s| &s.extra_data.production, label, field.to_owned()));
        descriptors.push(energy("consumption_energy", |s| &s.extra_data.consumption, label, field.to_owned()));
        descriptors.push(energy("grid_export_energy", |s| &s.extra_data.grid, label, format!("{}1", field)));
        descriptors.push(energy("grid_import_energy", |s| &s.extra_data.grid, label, format!("{}2", field)));
        descriptors.push(energy("battery_charge_energy", |s| &s.extra_data.battery, label, format!("{}_in", field)));
        descriptors.push(energy(
            "battery_discharge_energy",
            |s| &s.extra_data.battery,
            label,
            format!("{}_out", field),
        ));
    }

    for (label, consumption, battery, grid) in CONSUMPTION_FROM_PV {
        descriptors.push(
            Descriptor::new(
                "consumption_from_pv_energy",
                KWH,
                Category::TotalIncreasing,
                move |s: &StationInfo, _| {
                    let extra = &s.extra_data;
                    let total = extra.consumption.get(consumption).unwrap_or(0.0)
                        - extra.battery.get(battery).unwrap_or(0.0)
                        - extra.grid.get(grid).unwrap_or(0.0);
                    Some(Value::Number(total.max(0.0)))
                },
            )
            .label("period", label),
        );
    }

    descriptors
}

/* strings as-is, other scalars stringified */
fn text(value: Option<&serde_json::Value>) -> Option<Value> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(Value::Text(s.to_owned())),
        other => Some(Value::Text(other.to_string())),
    }
}

fn battery_power(flow: &'static str, field: fn(&BatteryAggregate) -> Option<f64>) -> Descriptor<BatteryAggregate> {
    Descriptor::new("battery_device_power", W, Category::Measurement, move |b: &BatteryAggregate, _| {
        field(b).map(Value::Number)
    })
    .label("flow", flow)
}

fn flow_state(
    direction: &'static str,
    state: fn(&BatteryAggregate) -> Option<&FlowState>,
) -> Vec<Descriptor<BatteryAggregate>> {
    vec![
        Descriptor::new("battery_device_flow_power", W, Category::Measurement, move |b: &BatteryAggregate, _| {
            state(b)?.power1.map(Value::Number)
        })
        .label("direction", direction)
        .label("channel", "1"),
        Descriptor::new("battery_device_flow_power", W, Category::Measurement, move |b: &BatteryAggregate, _| {
            state(b)?.power2.map(Value::Number)
        })
        .label("direction", direction)
        .label("channel", "2"),
        Descriptor::new("battery_device_remaining_time", None, Category::Diagnostic, move |b: &BatteryAggregate, _| {
            text(state(b)?.remaining_time.as_ref())
        })
        .label("direction", direction),
    ]
}

fn battery_descriptors() -> Vec<Descriptor<BatteryAggregate>> {
    let mut descriptors = vec![
        Descriptor::new("battery_device_energy", KWH, Category::Measurement, |b: &BatteryAggregate, _| {
            b.soc_kwh.map(Value::Number)
        }),
        Descriptor::new("battery_device_soc", PERCENT, Category::Measurement, |b: &BatteryAggregate, _| {
            b.soc.map(Value::Number)
        }),
        Descriptor::new("battery_device_avg_energy", KWH, Category::Measurement, |b: &BatteryAggregate, _| {
            b.avg_soc_kwh.map(Value::Number)
        }),
        Descriptor::new("battery_device_avg_soc", PERCENT, Category::Measurement, |b: &BatteryAggregate, _| {
            b.avg_soc.map(Value::Number)
        }),
        Descriptor::new("battery_device_online_state", None, Category::Diagnostic, |b: &BatteryAggregate, _| {
            text(b.online_state.as_ref())
        }),
        battery_power("battery", |b| b.battery_power),
        battery_power("consumption", |b| b.consumption_power),
        battery_power("solar", |b| b.solar_power),
        battery_power("pv", |b| b.pv_power),
        battery_power("off_grid", |b| b.off_grid_power),
    ];
    descriptors.extend(flow_state("charge", |b| b.charge_data.as_ref()));
    descriptors.extend(flow_state("discharge", |b| b.discharge_data.as_ref()));
    descriptors
}

fn device_descriptors() -> Vec<Descriptor<DeviceRecord>> {
    vec![
        Descriptor::new("online_state", None, Category::Diagnostic, |d: &DeviceRecord, _| {
            text(d.online_state.as_ref())
        }),
        Descriptor::new("device_battery_soc", PERCENT, Category::Measurement, |d: &DeviceRecord, _| {
            d.battery_soc().map(Value::Number)
        }),
        Descriptor::new("cluster_mode", None, Category::Diagnostic, |d: &DeviceRecord, _| {
            d.cluster_mode().map(Value::Text)
        }),
    ]
}

fn emit<S>(
    descriptors: &[Descriptor<S>],
    source: &S,
    tz: Tz,
    labels: &[(&'static str, String)],
    readings: &mut Vec<Reading>,
) {
    for descriptor in descriptors {
        if let Some(value) = descriptor.extract(source, tz) {
            let mut all_labels = labels.to_vec();
            all_labels.extend(descriptor.labels.iter().map(|&(name, value)| (name, value.to_owned())));
            readings.push(Reading {
                key: descriptor.key,
                unit: descriptor.unit,
                category: descriptor.category,
                labels: all_labels,
                value,
            });
        }
    }
}

fn with(labels: &[(&'static str, String)], name: &'static str, value: &str) -> Vec<(&'static str, String)> {
    let mut labels = labels.to_vec();
    labels.push((name, value.to_owned()));
    labels
}

/// Flatten a snapshot into labelled readings. Elements without an identifier are skipped.
pub fn readings(snapshot: &Snapshot, tz: Tz) -> Vec<Reading> {
    let mut readings = Vec::new();

    for record in &snapshot.stations {
        let station_id = match record.stations_id.as_deref() {
            Some(id) => id,
            None => continue,
        };
        let station = vec![("station", station_id.to_owned())];
        emit(&STATION_RECORD, record, tz, &station, &mut readings);

        if let Some(info) = snapshot.stations_info.get(station_id) {
            emit(&STATION_INFO, info, tz, &station, &mut readings);
        }

        if let Some(reports) = snapshot.stations_reports.get(station_id) {
            for (window, report) in reports {
                emit(&REPORT, report, tz, &with(&station, "window", window.as_str()), &mut readings);
            }
        }

        let devices = match snapshot.stations_devices.get(station_id) {
            Some(devices) => devices,
            None => continue,
        };
        let component = snapshot.stations_component.get(station_id);

        for device in &devices.devices {
            let device_id = match device.device_id.as_deref() {
                Some(id) => id,
                None => continue,
            };
            let serial = device.serial();
            let labels = with(&station, "device", device_id);

            emit(&DEVICE, device, tz, &labels, &mut readings);
            if let Some(wifi) = serial.and_then(|sn| devices.wifi.get(sn)) {
                emit(&WIFI, wifi, tz, &labels, &mut readings);
            }

            if let Some(links) = devices.battery_links.get(device_id) {
                emit(&BATTERY, &links.data, tz, &labels, &mut readings);
                for (index, pv) in links.data.pv_list.iter().enumerate() {
                    let pv_index = (index + 1).to_string();
                    emit(&BATTERY_PV, pv, tz, &with(&labels, "pv", &pv_index), &mut readings);
                }
                for item in &links.data.items {
                    if let Some(sn) = item.sn.as_deref() {
                        emit(&BATTERY_LINK, item, tz, &with(&labels, "link", sn), &mut readings);
                    }
                }
            }

            if let (Some(serial), Some(component)) = (serial, component) {
                for pv in component.pv_data.iter().filter(|pv| pv.sn.as_deref() == Some(serial)) {
                    let string = pv.pv.as_deref().unwrap_or_default();
                    emit(&PV_STRING, pv, tz, &with(&labels, "pv", string), &mut readings);
                }
            }
        }
    }

    readings
}
