use super::lenient;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiInfo {
    /* dBm */
    #[serde(default, deserialize_with = "lenient::number")]
    pub rssi: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub wifi: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub ip: Option<String>,
}
