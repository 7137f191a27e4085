use crate::api::response::battery::BatteryLinks;
use crate::api::response::component::Component;
use crate::api::response::devices::DeviceRecord;
use crate::api::response::report::Report;
use crate::api::response::station_info::StationInfo;
use crate::api::response::stations::StationRecord;
use crate::api::response::wifi::WifiInfo;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub type StationId = String;
pub type DeviceId = String;
pub type SerialNumber = String;

/// Account credentials. Replaced wholesale on reconfiguration, never mutated.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Fr,
}

impl Locale {
    /// Derive the API locale from a host language tag such as `fr-FR`.
    pub fn from_language(language: &str) -> Locale {
        if language.trim().to_lowercase().starts_with("fr") {
            Locale::Fr
        } else {
            Locale::En
        }
    }

    pub fn header_value(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportWindow {
    All,
    Day,
    Month,
    Year,
}

impl ReportWindow {
    pub const ALL: [ReportWindow; 4] = [
        ReportWindow::All,
        ReportWindow::Day,
        ReportWindow::Month,
        ReportWindow::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportWindow::All => "all",
            ReportWindow::Day => "day",
            ReportWindow::Month => "month",
            ReportWindow::Year => "year",
        }
    }

    /// `searchTime` parameter for this window's granularity.
    pub fn search_time(&self, date: NaiveDate) -> String {
        match self {
            ReportWindow::All | ReportWindow::Day => date.format("%Y-%m-%d").to_string(),
            ReportWindow::Month => date.format("%Y-%m").to_string(),
            ReportWindow::Year => date.format("%Y").to_string(),
        }
    }
}

/// Battery devices get an additional battery-links lookup.
pub fn is_battery(type_code: Option<&str>, type_name: Option<&str>) -> bool {
    type_name.map_or(false, |name| name.to_lowercase().contains("battery")) || type_code == Some("battery")
}

/// Device list of a station augmented with its per-device sub-resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationDevices {
    pub devices: Vec<DeviceRecord>,
    pub wifi: BTreeMap<SerialNumber, WifiInfo>,
    pub battery_links: BTreeMap<DeviceId, BatteryLinks>,
}

/// Result of one polling cycle. Built fresh every cycle and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub stations: Vec<StationRecord>,
    pub stations_info: BTreeMap<StationId, StationInfo>,
    pub stations_reports: BTreeMap<StationId, BTreeMap<ReportWindow, Report>>,
    pub stations_component: BTreeMap<StationId, Component>,
    pub stations_devices: BTreeMap<StationId, StationDevices>,
}
