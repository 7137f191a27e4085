pub mod endpoint;
pub mod error;
pub mod response;
pub mod retry;
pub mod token;

use crate::model::{Credentials, Locale, ReportWindow};
pub use error::Error;
use http::header::ACCEPT_LANGUAGE;
use http::StatusCode;
use response::battery::BatteryLinks;
use response::component::Component;
use response::devices::DevicePage;
use response::login::Login;
use response::report::Report;
use response::station_info::StationInfo;
use response::stations::StationsPage;
use response::wifi::WifiInfo;
pub use retry::RetryPolicy;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use token::Token;
use tokio::sync::Mutex;

pub const API_URL: &str = "http://application.izypowercloud.fr/photo_voltaic";

const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Authenticated client for the cloud API.
///
/// Owns the credentials and the current session token. Every fetch makes sure a valid
/// token is present, logging in inline when it is not, and retries failed attempts
/// according to its fetch `RetryPolicy`. Token refresh is serialised behind a mutex so
/// concurrent callers never trigger redundant logins.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    api_url: String,
    credentials: Credentials,
    locale: Locale,
    login_retry: RetryPolicy,
    fetch_retry: RetryPolicy,
    login_timeout: Duration,
    fetch_timeout: Duration,
    token: Mutex<Option<Token>>,
}

impl Client {
    /// `http` is the shared, connection-pooled client supplied by the host.
    pub fn new(http: reqwest::Client, api_url: &str, credentials: Credentials, locale: Locale) -> Client {
        Client {
            http,
            api_url: api_url.trim_end_matches('/').to_owned(),
            credentials,
            locale,
            login_retry: RetryPolicy::LOGIN,
            fetch_retry: RetryPolicy::FETCH,
            login_timeout: LOGIN_TIMEOUT,
            fetch_timeout: FETCH_TIMEOUT,
            token: Mutex::new(None),
        }
    }

    pub fn with_retry_policies(mut self, login: RetryPolicy, fetch: RetryPolicy) -> Client {
        self.login_retry = login;
        self.fetch_retry = fetch;
        self
    }

    /// Per-attempt timeouts for login and fetch requests.
    pub fn with_timeouts(mut self, login: Duration, fetch: Duration) -> Client {
        self.login_timeout = login;
        self.fetch_timeout = fetch;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn token_is_valid(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .map_or(false, |token| token.is_valid_at(chrono::Utc::now()))
    }

    /// Obtain a fresh token, retrying per the login policy.
    pub async fn login(&self) -> Result<(), Error> {
        let mut slot = self.token.lock().await;
        self.login_locked(&mut slot).await
    }

    async fn login_locked(&self, slot: &mut Option<Token>) -> Result<(), Error> {
        let token = retry::retry(&self.login_retry, "login", || self.login_once())
            .await
            .map_err(|e| match e {
                Error::Authentication(_) => e,
                e => Error::Authentication(format!("login failed after retries: {}", e)),
            })?;

        log::debug!("Obtained token, expires at {}", token.expiry());
        *slot = Some(token);
        Ok(())
    }

    async fn login_once(&self) -> Result<Token, Error> {
        let url = format!("{}{}", self.api_url, endpoint::LOGIN);
        let request_body = HashMap::from([
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ]);

        let response = self
            .http
            .post(url)
            .json(&request_body)
            .header(ACCEPT_LANGUAGE, self.locale.header_value())
            .header(endpoint::APP_PLATFORM_HEADER, endpoint::APP_PLATFORM)
            .timeout(self.login_timeout)
            .send()
            .await?;

        log::debug!("Login response (status {})", response.status());
        let text = response.text().await?;

        let login = serde_json::from_str::<Login>(&text).map_err(|e| {
            log::error!("Login response not JSON");
            Error::Parse(e.to_string())
        })?;

        match login.token() {
            Some(token) => Ok(Token::issued(token.to_owned(), chrono::Utc::now())),
            None => {
                log::error!("Login failed or token missing");
                Err(Error::Authentication("no token returned".to_owned()))
            }
        }
    }

    /// Current token, logging in first when it is missing or about to expire.
    async fn ensure_token(&self) -> Result<String, Error> {
        let mut slot = self.token.lock().await;
        let valid = slot
            .as_ref()
            .map_or(false, |token| token.is_valid_at(chrono::Utc::now()));

        if !valid {
            self.login_locked(&mut slot).await?;
        }

        slot.as_ref()
            .map(|token| token.value().to_owned())
            .ok_or(Error::InternalError)
    }

    /// Log in again after `rejected` was refused, unless another caller already replaced it.
    async fn relogin_rejected(&self, rejected: &str) -> Result<(), Error> {
        let mut slot = self.token.lock().await;
        if slot.as_ref().map_or(false, |token| token.value() != rejected) {
            log::debug!("Token already renewed, skipping re-login");
            return Ok(());
        }
        self.login_locked(&mut slot).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = format!("{}{}", self.api_url, path);
        let url = url.as_str();

        retry::retry(&self.fetch_retry, resource, || self.get_once(resource, url, query))
            .await
            .map_err(|e| Error::Fetch {
                resource: resource.to_owned(),
                reason: e.to_string(),
            })
    }

    /// One attempt: every failure mode is reported as an error for the retry loop.
    async fn get_once<T: DeserializeOwned>(
        &self,
        resource: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let token = self.ensure_token().await?;

        let response = self
            .http
            .get(url)
            .query(query)
            .header(endpoint::TOKEN_HEADER, token.as_str())
            .header(ACCEPT_LANGUAGE, self.locale.header_value())
            .header(endpoint::APP_PLATFORM_HEADER, endpoint::APP_PLATFORM)
            .timeout(self.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        log::trace!("{} response (status {}): {}", resource, status, text);

        match status {
            StatusCode::OK => serde_json::from_str::<T>(&text).map_err(|e| {
                log::error!("Invalid JSON from {}: {}", resource, text);
                Error::Parse(e.to_string())
            }),
            StatusCode::UNAUTHORIZED => {
                log::warn!("Unauthorized (401) when fetching {}; will re-login", resource);
                if let Err(e) = self.relogin_rejected(&token).await {
                    log::warn!("Re-login after 401 failed: {}", e);
                }
                Err(Error::Unauthorized)
            }
            status if status.is_server_error() => {
                log::warn!("Server error {} when fetching {}", status, resource);
                Err(Error::Status(status.as_u16()))
            }
            status => {
                log::error!("Failed fetching {}: status {} body {}", resource, status, text);
                Err(Error::Status(status.as_u16()))
            }
        }
    }

    /// List power stations (one page).
    pub async fn stations(&self, page: u32, limit: u32) -> Result<StationsPage, Error> {
        self.get(
            "stations",
            endpoint::STATIONS,
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Station details, including the device type enumeration and energy counters.
    pub async fn station_info(&self, station_id: &str) -> Result<StationInfo, Error> {
        self.get(
            &format!("station info {}", station_id),
            &endpoint::station_info(station_id),
            &[],
        )
        .await
    }

    pub async fn device_page(
        &self,
        station_id: &str,
        device_type: &str,
        page: u32,
        limit: u32,
    ) -> Result<DevicePage, Error> {
        self.get(
            &format!("device page {}", station_id),
            endpoint::DEVICES,
            &[
                ("powerId", station_id.to_owned()),
                ("deviceType", device_type.to_owned()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// PV string data of a station for `search_time` (`YYYY-MM-DD`).
    pub async fn component(&self, station_id: &str, search_time: &str) -> Result<Component, Error> {
        self.get(
            &format!("component {}", station_id),
            &endpoint::component(station_id),
            &[("searchTime", search_time.to_owned())],
        )
        .await
    }

    pub async fn report(
        &self,
        station_id: &str,
        window: ReportWindow,
        search_time: &str,
    ) -> Result<Report, Error> {
        self.get(
            &format!("report {} ({})", station_id, window.as_str()),
            &endpoint::report(station_id),
            &[
                ("timeType", window.as_str().to_owned()),
                ("dataFlag", "energy".to_owned()),
                ("searchTime", search_time.to_owned()),
            ],
        )
        .await
    }

    pub async fn device_wifi(&self, serial_number: &str) -> Result<WifiInfo, Error> {
        self.get(
            &format!("device WiFi {}", serial_number),
            &endpoint::device_wifi(serial_number),
            &[],
        )
        .await
    }

    pub async fn battery_links(&self, serial_number: &str) -> Result<BatteryLinks, Error> {
        self.get(
            &format!("battery links {}", serial_number),
            &endpoint::battery_links(serial_number),
            &[],
        )
        .await
    }
}

/// Check credentials with exactly one login attempt-sequence.
///
/// On success the returned client already holds a token and can be used for polling.
pub async fn validate_credentials(
    http: reqwest::Client,
    api_url: &str,
    credentials: Credentials,
    locale: Locale,
) -> Result<Client, Error> {
    log::debug!("Validating credentials for user: {}", credentials.username);
    let client = Client::new(http, api_url, credentials, locale);
    client.login().await?;
    log::debug!("Credentials validated successfully for user: {}", client.credentials().username);
    Ok(client)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::api::response::test::read_resource;
    use crate::api::token::test::jwt;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;
    use std::io::Write;

    pub(crate) fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::ZERO)
    }

    pub(crate) fn test_client(server: &ServerGuard) -> Client {
        Client::new(
            reqwest::Client::new(),
            &server.url(),
            Credentials {
                username: "user@example.com".to_owned(),
                password: "secret".to_owned(),
            },
            Locale::Fr,
        )
        .with_retry_policies(fast_policy(2), fast_policy(3))
    }

    pub(crate) fn token_expiring_in(secs: i64) -> String {
        jwt(&json!({"exp": chrono::Utc::now().timestamp() + secs}))
    }

    pub(crate) async fn mock_login(server: &mut ServerGuard, token: &str, hits: usize) -> Mock {
        server
            .mock("POST", "/api/login")
            .match_header("accept-language", "fr")
            .match_header("app-platform", "izy")
            .match_body(Matcher::Json(json!({
                "username": "user@example.com",
                "password": "secret"
            })))
            .with_status(200)
            .with_body(json!({"code": 0, "data": {"token": token}}).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn login_reads_token() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let login = mock_login(&mut server, &token, 1).await;

        let client = test_client(&server);
        assert!(!client.token_is_valid().await);
        client.login().await.unwrap();
        assert!(client.token_is_valid().await);
        login.assert_async().await;
    }

    #[tokio::test]
    async fn login_without_token_fails_after_two_attempts() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/login")
            .with_status(200)
            .with_body(r#"{"code": 1, "msg": "bad credentials", "data": null}"#)
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.login().await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert!(!client.token_is_valid().await);
        login.assert_async().await;
    }

    #[tokio::test]
    async fn login_invalid_json() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/login")
            .with_status(502)
            .with_body("<html>Bad gateway</html>")
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server);
        assert!(matches!(client.login().await, Err(Error::Authentication(_))));
        login.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_sends_headers_and_params() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let login = mock_login(&mut server, &token, 1).await;
        let stations = server
            .mock("GET", "/api/powerStations/page")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
            ]))
            .match_header("x-tts-access-token", token.as_str())
            .match_header("accept-language", "fr")
            .match_header("app-platform", "izy")
            .with_status(200)
            .with_body(read_resource("stationsPage.json"))
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server);
        let page = client.stations(1, 100).await.unwrap();
        assert_eq!(3, page.records().len());
        /* token still valid: no second login */
        client.stations(1, 100).await.unwrap();

        login.assert_async().await;
        stations.assert_async().await;
    }

    #[tokio::test]
    async fn expiring_token_triggers_one_login_per_fetch() {
        let mut server = Server::new_async().await;
        /* inside the 10 s safety margin: never considered valid */
        let token = token_expiring_in(5);
        let login = mock_login(&mut server, &token, 2).await;
        let wifi = server
            .mock("GET", "/api/v3/device/wifi/SN1")
            .with_status(200)
            .with_body(read_resource("deviceWifi.json"))
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server);
        client.device_wifi("SN1").await.unwrap();
        client.device_wifi("SN1").await.unwrap();

        login.assert_async().await;
        wifi.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_retried_three_times() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let _login = mock_login(&mut server, &token, 1).await;
        let info = server
            .mock("GET", "/api/v3/powerStations/info/42")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server);
        match client.station_info("42").await {
            Err(Error::Fetch { resource, reason }) => {
                assert_eq!("station info 42", resource);
                assert_eq!("HTTP 503", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        info.assert_async().await;
    }

    #[tokio::test]
    async fn client_error_and_malformed_body_are_retried() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let _login = mock_login(&mut server, &token, 1).await;
        let not_found = server
            .mock("GET", "/izy/v2/battery/SN404")
            .with_status(404)
            .expect(3)
            .create_async()
            .await;
        let malformed = server
            .mock("GET", "/api/component/42")
            .match_query(Matcher::UrlEncoded("searchTime".into(), "2024-03-05".into()))
            .with_status(200)
            .with_body("{\"pvData\": [")
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server);
        assert!(matches!(client.battery_links("SN404").await, Err(Error::Fetch { .. })));
        assert!(matches!(client.component("42", "2024-03-05").await, Err(Error::Fetch { .. })));

        not_found.assert_async().await;
        malformed.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_triggers_relogin() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        /* initial login plus one per 401 */
        let login = mock_login(&mut server, &token, 4).await;
        let report = server
            .mock("GET", "/api/report/v2/powerStations/data/42")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timeType".into(), "month".into()),
                Matcher::UrlEncoded("dataFlag".into(), "energy".into()),
                Matcher::UrlEncoded("searchTime".into(), "2024-03".into()),
            ]))
            .with_status(401)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.report("42", ReportWindow::Month, "2024-03").await;
        assert!(matches!(result, Err(Error::Fetch { .. })));

        login.assert_async().await;
        report.assert_async().await;
    }

    #[tokio::test]
    async fn relogin_skipped_when_token_already_renewed() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let login = mock_login(&mut server, &token, 2).await;

        let client = test_client(&server);
        client.login().await.unwrap();

        /* another caller already swapped the rejected token */
        client.relogin_rejected("previous-token").await.unwrap();
        /* the current token itself was rejected */
        client.relogin_rejected(&token).await.unwrap();

        login.assert_async().await;
    }

    fn slow_body(w: &mut dyn Write) -> std::io::Result<()> {
        std::thread::sleep(Duration::from_millis(300));
        w.write_all(b"{}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_timeout_retried_three_times() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let _login = mock_login(&mut server, &token, 1).await;
        let wifi = server
            .mock("GET", "/api/v3/device/wifi/SN1")
            .with_status(200)
            .with_chunked_body(slow_body)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server).with_timeouts(Duration::from_secs(5), Duration::from_millis(50));
        match client.device_wifi("SN1").await {
            Err(Error::Fetch { reason, .. }) => assert_eq!(Error::Timeout.to_string(), reason),
            other => panic!("unexpected result: {:?}", other),
        }
        wifi.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn login_timeout_retried_twice() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/login")
            .with_status(200)
            .with_chunked_body(slow_body)
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server).with_timeouts(Duration::from_millis(50), Duration::from_secs(5));
        match client.login().await {
            Err(Error::Authentication(reason)) => assert!(reason.contains("timed out"), "{}", reason),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!client.token_is_valid().await);
        login.assert_async().await;
    }

    #[tokio::test]
    async fn device_page_params() {
        let mut server = Server::new_async().await;
        let token = token_expiring_in(3600);
        let _login = mock_login(&mut server, &token, 1).await;
        let devices = server
            .mock("GET", "/api/device/page")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("powerId".into(), "42".into()),
                Matcher::UrlEncoded("deviceType".into(), "all".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(read_resource("devicePage.json"))
            .create_async()
            .await;

        let client = test_client(&server);
        let page = client.device_page("42", "all", 1, 100).await.unwrap();
        assert_eq!(3, page.records().len());
        devices.assert_async().await;
    }

    #[tokio::test]
    async fn validate_credentials_reports_failure() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/login")
            .with_status(200)
            .with_body(r#"{"data": {}}"#)
            .expect(2)
            .create_async()
            .await;

        let result = validate_credentials(
            reqwest::Client::new(),
            &server.url(),
            Credentials {
                username: "user@example.com".to_owned(),
                password: "wrong".to_owned(),
            },
            Locale::En,
        )
        .await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        login.assert_async().await;
    }
}
