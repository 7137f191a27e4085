use super::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    #[serde(default, deserialize_with = "lenient::number")]
    pub power1: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub power2: Option<f64>,
    #[serde(default)]
    pub remaining_time: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvEntry {
    #[serde(default, deserialize_with = "lenient::number")]
    pub power: Option<f64>,
}

/// One sub-unit of a battery pack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryLinkItem {
    #[serde(default, deserialize_with = "lenient::text")]
    pub sn: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub soc: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub kwh: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryAggregate {
    #[serde(default, deserialize_with = "lenient::number")]
    pub soc_kwh: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub soc: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_soc_kwh: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_soc: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub consumption_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub solar_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pv_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub off_grid_power: Option<f64>,
    #[serde(default)]
    pub online_state: Option<Value>,
    #[serde(default)]
    pub charge_data: Option<FlowState>,
    #[serde(default)]
    pub discharge_data: Option<FlowState>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub pv_list: Vec<PvEntry>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub items: Vec<BatteryLinkItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryLinks {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub data: BatteryAggregate,
}

impl BatteryLinks {
    pub fn is_empty(&self) -> bool {
        *self == BatteryLinks::default()
    }
}
