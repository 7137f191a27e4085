pub mod battery;
pub mod component;
pub mod devices;
pub mod login;
pub mod report;
pub mod station_info;
pub mod stations;
pub mod wifi;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/* Paged listing: `{"data": {"records": [...]}}` */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub data: PageData<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PageData<T> {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub records: Vec<T>,
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        PageData {
            records: Vec::new(),
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            data: PageData::default(),
        }
    }
}

impl<T> Page<T> {
    pub fn records(&self) -> &[T] {
        &self.data.records
    }
}

/// Numeric value that may arrive as a JSON number or as a string such as `"4.0%"`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Deserializers tolerating the type drift the cloud API shows between payloads.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Identifier sent either as a string or a number.
    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        text(d).map(|id| id.filter(|id| !id.is_empty()))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Value::deserialize(d).map(|v| super::as_number(&v))
    }

    pub fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Option::<T>::deserialize(d).map(Option::unwrap_or_default)
    }
}
