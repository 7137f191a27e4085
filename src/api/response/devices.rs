use super::{as_number, lenient, Page};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* dataDtos key carrying the device battery state of charge */
const BATTERY_SOC_KEY: &str = "6002";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDto {
    #[serde(default, deserialize_with = "lenient::text")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default, deserialize_with = "lenient::id")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sn: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub software_version: Option<String>,
    #[serde(default)]
    pub online_state: Option<Value>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub data_dtos: Vec<DataDto>,
    #[serde(default)]
    pub cluster_mode: Option<Value>,
    #[serde(default)]
    pub connect_info_json: Option<Value>,
}

impl DeviceRecord {
    pub fn serial(&self) -> Option<&str> {
        self.sn
            .as_deref()
            .filter(|sn| !sn.is_empty())
            .or_else(|| self.serial_number.as_deref().filter(|sn| !sn.is_empty()))
    }

    /// Instrument reading from the `dataDtos` array.
    pub fn reading(&self, key: &str) -> Option<&Value> {
        self.data_dtos
            .iter()
            .find(|dto| dto.key.as_deref() == Some(key))
            .map(|dto| &dto.value)
    }

    pub fn battery_soc(&self) -> Option<f64> {
        let value = self.reading(BATTERY_SOC_KEY)?;
        let soc = as_number(value);
        if soc.is_none() && !value.is_null() {
            log::warn!("Could not parse battery SOC value: {}", value);
        }
        soc
    }

    /// Cluster configuration, reported only when the root `clusterMode` flag is set.
    pub fn cluster_mode(&self) -> Option<String> {
        let enabled = match &self.cluster_mode {
            None | Some(Value::Null) => false,
            Some(flag) => as_number(flag) != Some(0.0),
        };
        if !enabled {
            return None;
        }

        /* connectInfoJson is sometimes delivered as an embedded JSON string */
        let connect_info = match &self.connect_info_json {
            Some(Value::String(s)) => serde_json::from_str::<Value>(s).ok()?,
            Some(v) => v.clone(),
            None => return None,
        };

        match connect_info.get("clusterMode")? {
            Value::String(s) => Some(s.to_owned()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

pub type DevicePage = Page<DeviceRecord>;
