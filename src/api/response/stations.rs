use super::{lenient, Page};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    #[serde(default, deserialize_with = "lenient::id")]
    pub stations_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub station_name: Option<String>,
    /* W */
    #[serde(default, deserialize_with = "lenient::number")]
    pub installed_capacity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: Option<String>,
}

pub type StationsPage = Page<StationRecord>;
