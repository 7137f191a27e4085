use super::as_number;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Percentage-rate metrics of one report window (`cover_rate`, `energy_self_rate`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report(BTreeMap<String, Value>);

impl Report {
    pub fn rate(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(as_number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
