#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use chrono::Utc;
use chrono_tz::Tz;
use izypower_rs::{api, settings, Client, Snapshot};
use rocket::http::ContentType;
use rocket::State;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

mod metrics;

/// Structure containing state for API handlers.
pub struct StateData {
    client: Client,
    interval: Duration,
    tz: Tz,
    /// Last known good snapshot
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Timestamp of last polling cycle, successful or not
    timestamp: Mutex<Option<Instant>>,
    /// Held for the duration of a polling cycle
    refresh: tokio::sync::Mutex<()>,
}

impl StateData {
    fn new(client: Client, interval: Duration, tz: Tz) -> StateData {
        StateData {
            client,
            interval,
            tz,
            snapshot: RwLock::new(None),
            timestamp: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Updates `timestamp` to `now()`.
    fn touch(&self) {
        if let Ok(mut ts) = self.timestamp.lock() {
            *ts = Some(Instant::now());
        } else {
            log::trace!("Unable to lock timestamp mutex, will refresh again")
        }
    }

    /// Checks whether `interval` elapsed since last `touch()`
    fn interval_elapsed(&self) -> bool {
        let elapsed_opt = self
            .timestamp
            .lock()
            .ok()
            .and_then(|a| a.map(|b| b.elapsed()));

        match elapsed_opt {
            Some(elapsed) => elapsed >= self.interval,
            /* no cycle yet */
            None => true,
        }
    }

    fn cached(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }

    fn publish(&self, snapshot: Snapshot) {
        match self.snapshot.write() {
            Ok(mut cached) => *cached = Some(Arc::new(snapshot)),
            Err(_) => log::error!("Unable to lock snapshot, keeping previous one"),
        }
    }

    /// Run a polling cycle if the refresh period elapsed since the previous one, whatever its
    /// outcome. Concurrent callers wait for the running cycle and then reuse its result.
    async fn refresh(&self) {
        let _guard = self.refresh.lock().await;
        if !self.interval_elapsed() {
            log::info!("interval time not yet elapsed since last run; returning cached result");
            return;
        }

        let started = Instant::now();
        self.touch();
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        match izypower_rs::collect(&self.client, today).await {
            Ok(snapshot) => {
                self.publish(snapshot);
                metrics::UP_GAUGE.set(1.0);
                metrics::LAST_SUCCESS_GAUGE.set(Utc::now().timestamp() as f64);
            }
            Err(e) => {
                log::error!("Polling cycle failed, keeping last known data: {}", e);
                metrics::UP_GAUGE.set(0.0);
                metrics::COLLECT_FAILURES_COUNTER.inc();
            }
        }
        metrics::COLLECT_DURATION_GAUGE.set(started.elapsed().as_secs_f64());
    }
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, api::Error> {
    state.refresh().await;
    let snapshot = state.cached().ok_or(api::Error::Unavailable)?;
    metrics::read(Some(&snapshot), state.tz)
}

#[get("/snapshot")]
async fn snapshot_route(state: &State<StateData>) -> Result<(ContentType, String), api::Error> {
    let snapshot = state.cached().ok_or(api::Error::Unavailable)?;
    let json = serde_json::to_string_pretty(&*snapshot).or(Err(api::Error::FormatError))?;
    Ok((ContentType::JSON, json))
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = settings::read_settings().map_err(|e| {
        log::error!("{}", e);
        e
    })?;
    let tz = settings.tz()?;

    let http = reqwest::Client::builder().build()?;
    let client = api::validate_credentials(http, &settings.api_url, settings.credentials(), settings.locale())
        .await
        .map_err(|e| {
            log::error!("Unable to log in as {}: {}", settings.username, e);
            e
        })?;
    log::info!(
        "Logged in as {}, polling every {} minutes",
        settings.username,
        settings.refresh_period
    );

    metrics::UP_GAUGE.set(0.0);
    metrics::COLLECT_FAILURES_COUNTER.inc_by(0.0);

    let state = StateData::new(client, settings.refresh_interval(), tz);
    let _rocket = rocket::build()
        .manage(state)
        .mount("/", routes![metrics_route, snapshot_route])
        .launch()
        .await?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use izypower_rs::api::response::stations::StationRecord;
    use izypower_rs::api::RetryPolicy;
    use izypower_rs::model::{Credentials, Locale};
    use mockito::{Matcher, Server};

    fn client(api_url: &str) -> Client {
        let fast = |attempts| RetryPolicy::new(attempts, Duration::from_millis(1), Duration::ZERO);
        Client::new(
            reqwest::Client::new(),
            api_url,
            Credentials {
                username: "user".to_owned(),
                password: "secret".to_owned(),
            },
            Locale::En,
        )
        .with_retry_policies(fast(2), fast(3))
    }

    fn state(interval: Duration) -> StateData {
        StateData::new(client("http://127.0.0.1:9"), interval, chrono_tz::UTC)
    }

    #[test]
    fn interval() {
        let state = state(Duration::from_secs(60));
        assert!(state.interval_elapsed());
        state.touch();
        assert!(!state.interval_elapsed());

        let state = self::state(Duration::ZERO);
        state.touch();
        assert!(state.interval_elapsed());
    }

    #[test]
    fn publish_replaces_snapshot() {
        let state = state(Duration::from_secs(60));
        assert!(state.cached().is_none());

        let snapshot = Snapshot {
            stations: vec![StationRecord::default()],
            ..Snapshot::default()
        };
        state.publish(snapshot.clone());
        assert_eq!(Some(snapshot), state.cached().map(|s| (*s).clone()));
    }

    #[tokio::test]
    async fn failed_cycle_waits_for_next_period() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/login")
            .with_status(200)
            .with_body(r#"{"data": {"token": "opaque"}}"#)
            .expect(1)
            .create_async()
            .await;
        let stations = server
            .mock("GET", "/api/powerStations/page")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let state = StateData::new(client(&server.url()), Duration::from_secs(180), chrono_tz::UTC);
        for _ in 0..5 {
            state.refresh().await;
        }

        assert!(state.cached().is_none());
        assert!(!state.interval_elapsed());
        login.assert_async().await;
        stations.assert_async().await;
    }
}
