use crate::api::response::devices::DeviceRecord;
use crate::api::response::station_info::StationInfo;
use crate::api::{Client, Error};
use crate::model::{self, ReportWindow, Snapshot, StationDevices};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

const STATIONS_PAGE: u32 = 1;
const STATIONS_LIMIT: u32 = 100;
const DEVICES_PAGE: u32 = 1;
const DEVICES_LIMIT: u32 = 100;
const ALL_DEVICE_TYPES: &str = "all";

/// Run one polling cycle and assemble a `Snapshot`.
///
/// `today` is the host-local date used for report and component requests. Only a failing
/// station list aborts the cycle; every other failure degrades to an empty placeholder for
/// the resource concerned. Stations beyond the first page are not polled.
pub async fn collect(client: &Client, today: NaiveDate) -> Result<Snapshot, Error> {
    log::debug!("Fetching stations list (page={}, limit={})", STATIONS_PAGE, STATIONS_LIMIT);
    let stations = client.stations(STATIONS_PAGE, STATIONS_LIMIT).await?;

    let mut snapshot = Snapshot {
        stations: stations.records().to_vec(),
        ..Snapshot::default()
    };

    for record in stations.records() {
        let station_id = match record.stations_id.as_deref() {
            Some(id) => id,
            None => {
                log::warn!("Skipping station record without stationsId: {:?}", record);
                continue;
            }
        };
        collect_station(client, station_id, today, &mut snapshot).await;
    }

    log::info!(
        "Collected {} station(s), {} with details",
        snapshot.stations.len(),
        snapshot.stations_info.len()
    );
    Ok(snapshot)
}

async fn collect_station(client: &Client, station_id: &str, today: NaiveDate, snapshot: &mut Snapshot) {
    let info = match client.station_info(station_id).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Failed to fetch info for station {}: {}", station_id, e);
            return;
        }
    };
    log::debug!("Fetched info for station {}", station_id);

    let mut reports = BTreeMap::new();
    for window in ReportWindow::ALL {
        let search_time = window.search_time(today);
        let report = client
            .report(station_id, window, &search_time)
            .await
            .unwrap_or_else(|e| {
                log::debug!(
                    "Failed to fetch report for station {} (timeType={}): {}",
                    station_id,
                    window.as_str(),
                    e
                );
                Default::default()
            });
        reports.insert(window, report);
    }

    let component = client
        .component(station_id, &ReportWindow::Day.search_time(today))
        .await
        .unwrap_or_else(|e| {
            log::debug!("Failed to fetch component data for station {}: {}", station_id, e);
            Default::default()
        });

    let devices = match client
        .device_page(station_id, ALL_DEVICE_TYPES, DEVICES_PAGE, DEVICES_LIMIT)
        .await
    {
        Ok(page) => collect_devices(client, &info, page.data.records).await,
        Err(e) => {
            log::debug!("Failed to fetch device page data for station {}: {}", station_id, e);
            StationDevices::default()
        }
    };

    let station_id = station_id.to_owned();
    snapshot.stations_info.insert(station_id.clone(), info);
    snapshot.stations_reports.insert(station_id.clone(), reports);
    snapshot.stations_component.insert(station_id.clone(), component);
    snapshot.stations_devices.insert(station_id, devices);
}

async fn collect_devices(client: &Client, info: &StationInfo, devices: Vec<DeviceRecord>) -> StationDevices {
    let type_names = info.device_type_names();
    let mut station_devices = StationDevices::default();

    for device in &devices {
        let serial = match device.serial() {
            Some(serial) => serial,
            None => continue,
        };

        let wifi = client.device_wifi(serial).await.unwrap_or_else(|e| {
            log::debug!("Failed to fetch WiFi data for device SN {}: {}", serial, e);
            Default::default()
        });
        station_devices.wifi.insert(serial.to_owned(), wifi);

        if !is_battery_device(device, &type_names) {
            continue;
        }

        let device_id = match device.device_id.as_deref() {
            Some(id) => id,
            None => {
                log::warn!("Battery device SN {} has no deviceId; skipping battery links", serial);
                continue;
            }
        };

        log::info!(
            "Detected battery device {} (ID: {}, SN: {}), fetching battery links",
            device.device_name.as_deref().unwrap_or("Unknown"),
            device_id,
            serial
        );
        let links = client.battery_links(serial).await.unwrap_or_else(|e| {
            log::warn!("Failed to fetch battery links for device SN {}: {}", serial, e);
            Default::default()
        });
        station_devices.battery_links.insert(device_id.to_owned(), links);
    }

    station_devices.devices = devices;
    station_devices
}

fn is_battery_device(device: &DeviceRecord, type_names: &HashMap<String, String>) -> bool {
    let code = device.device_type.as_deref();
    let name = code.and_then(|code| type_names.get(code)).map(String::as_str);
    model::is_battery(code, name)
}
