use super::lenient;
use serde::{Deserialize, Serialize};

/// Instantaneous power of one PV string, tied to its device by serial number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvData {
    #[serde(default, deserialize_with = "lenient::text")]
    pub sn: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub pv: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pv_power: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub pv_data: Vec<PvData>,
}
