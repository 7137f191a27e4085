use super::{as_number, lenient};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Per-period energy counters (kWh) of one category, keyed by period name
/// (`day`, `month1`, `all_in`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counters(BTreeMap<String, Value>);

impl Counters {
    pub fn get(&self, period: &str) -> Option<f64> {
        self.0.get(period).and_then(as_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraData {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub production: Counters,
    /* `*1` export, `*2` import */
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub grid: Counters,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub consumption: Counters,
    /* `*_in` charge, `*_out` discharge */
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub battery: Counters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    #[serde(default, deserialize_with = "lenient::text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    #[serde(rename = "deviceTypes", default, deserialize_with = "lenient::null_default")]
    pub device_types: Vec<DeviceType>,
    #[serde(rename = "extraData", default, deserialize_with = "lenient::null_default")]
    pub extra_data: ExtraData,
    #[serde(default, deserialize_with = "lenient::number")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub grid_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub consumption: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_pv_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_soc: Option<f64>,
    /* local time, e.g. "2026-02-10 22:39:29 UTC+01:00" */
    #[serde(rename = "lastUpdate", default, deserialize_with = "lenient::text")]
    pub last_update: Option<String>,
}

impl StationInfo {
    /// Device type code to display name, from the station-scoped type enumeration.
    pub fn device_type_names(&self) -> HashMap<String, String> {
        self.device_types
            .iter()
            .filter_map(|t| match (t.value.as_deref(), t.name.as_deref()) {
                (Some(code), Some(name)) if !code.is_empty() && !name.is_empty() => {
                    Some((code.to_owned(), name.to_owned()))
                }
                _ => None,
            })
            .collect()
    }

    /// Last update instant: the `UTC±hh:mm` suffix is dropped and the wall-clock time
    /// is interpreted in `tz`.
    pub fn last_update_at(&self, tz: Tz) -> Option<DateTime<Tz>> {
        let raw = self.last_update.as_deref()?;
        let local = raw.split(" UTC").next().unwrap_or(raw).trim();

        match NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S") {
            Ok(naive) => tz.from_local_datetime(&naive).earliest(),
            Err(e) => {
                log::warn!("Could not parse lastUpdate value '{}': {}", raw, e);
                None
            }
        }
    }
}
