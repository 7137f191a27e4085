pub type Endpoint = str;

pub const LOGIN: &Endpoint = "/api/login";
pub const STATIONS: &Endpoint = "/api/powerStations/page";
pub const DEVICES: &Endpoint = "/api/device/page";

pub const TOKEN_HEADER: &str = "x-tts-access-token";
pub const APP_PLATFORM_HEADER: &str = "app-platform";
pub const APP_PLATFORM: &str = "izy";

pub fn station_info(station_id: &str) -> String {
    format!("/api/v3/powerStations/info/{}", station_id)
}

pub fn component(station_id: &str) -> String {
    format!("/api/component/{}", station_id)
}

pub fn report(station_id: &str) -> String {
    format!("/api/report/v2/powerStations/data/{}", station_id)
}

pub fn device_wifi(serial_number: &str) -> String {
    format!("/api/v3/device/wifi/{}", serial_number)
}

pub fn battery_links(serial_number: &str) -> String {
    format!("/izy/v2/battery/{}", serial_number)
}
