use crate::api::{Error, API_URL};
use crate::model::{Credentials, Locale};
use chrono_tz::Tz;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

/// Minimum and default polling period, in minutes.
pub const MIN_REFRESH_PERIOD: u64 = 3;

const CONFIG_FILE: &str = "izypower";
const ENV_PREFIX: &str = "IZY";

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub username: String,
    password: String,
    /// Minutes between two polling cycles.
    pub refresh_period: u64,
    pub language: String,
    pub time_zone: String,
}

/// Read settings from the optional `izypower.*` file, then from `IZY_*` environment variables.
pub fn read_settings() -> Result<Settings, Error> {
    let mut config = Config::default();
    config
        .merge(config::File::with_name(CONFIG_FILE).required(false))
        .and_then(|c| c.merge(config::Environment::with_prefix(ENV_PREFIX)))
        .map_err(|e| Error::Configuration(e.to_string()))?;

    Settings::from_config(config)
}

impl Settings {
    pub fn from_config(mut config: Config) -> Result<Settings, Error> {
        config
            .set_default("api_url", API_URL)
            .and_then(|c| c.set_default("refresh_period", MIN_REFRESH_PERIOD as i64))
            .and_then(|c| c.set_default("language", "en"))
            .and_then(|c| c.set_default("time_zone", "UTC"))
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let settings: Settings = config
            .try_into()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.username.trim().is_empty() {
            return Err(Error::Configuration("username must not be empty".to_owned()));
        }
        if self.refresh_period < MIN_REFRESH_PERIOD {
            return Err(Error::Configuration(format!(
                "refresh_period must be at least {} minutes (got {})",
                MIN_REFRESH_PERIOD, self.refresh_period
            )));
        }
        self.tz()?;
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.to_owned(),
            password: self.password.to_owned(),
        }
    }

    pub fn locale(&self) -> Locale {
        Locale::from_language(&self.language)
    }

    pub fn tz(&self) -> Result<Tz, Error> {
        self.time_zone
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid time_zone '{}': {}", self.time_zone, e)))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_period * 60)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let mut config = Config::default();
        for (key, value) in pairs {
            config.set(key, *value).unwrap();
        }
        config
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_config(config(&[("username", "user"), ("password", "secret")])).unwrap();

        assert_eq!(API_URL, settings.api_url);
        assert_eq!(3, settings.refresh_period);
        assert_eq!(Duration::from_secs(180), settings.refresh_interval());
        assert_eq!(Locale::En, settings.locale());
        assert_eq!(chrono_tz::UTC, settings.tz().unwrap());
        assert_eq!("secret", settings.credentials().password);
    }

    #[test]
    fn overrides() {
        let settings = Settings::from_config(config(&[
            ("username", "user"),
            ("password", "secret"),
            ("refresh_period", "10"),
            ("language", "fr-FR"),
            ("time_zone", "Europe/Paris"),
            ("api_url", "http://localhost:8080"),
        ]))
        .unwrap();

        assert_eq!(10, settings.refresh_period);
        assert_eq!(Locale::Fr, settings.locale());
        assert_eq!(chrono_tz::Europe::Paris, settings.tz().unwrap());
        assert_eq!("http://localhost:8080", settings.api_url);
    }

    #[test]
    fn refresh_period_below_minimum() {
        let result = Settings::from_config(config(&[
            ("username", "user"),
            ("password", "secret"),
            ("refresh_period", "2"),
        ]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn missing_credentials() {
        assert!(matches!(
            Settings::from_config(config(&[("password", "secret")])),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Settings::from_config(config(&[("username", " "), ("password", "secret")])),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn invalid_time_zone() {
        let result = Settings::from_config(config(&[
            ("username", "user"),
            ("password", "secret"),
            ("time_zone", "Mars/Olympus"),
        ]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
