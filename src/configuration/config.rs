use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::handlers::ute::api::BASE_URL;
use crate::handlers::ute::session::{ClientOptions, ReadingOptions};

// --------------------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    // --- account ---

    /// Email registered in the UTE mobile app.
    pub email: String,
    /// Phone registered in the UTE mobile app, international format without '+', e.g. "59899123456".
    pub phone: String,
    /// Service point to poll. Run `ute_energy setup` to list the ones available to this user.
    pub account_service_point_id: String,

    // --- connectivity ---

    /// API root. Only changed for testing against a local mock.
    pub base_url: String,
    /// Time between two scheduled refreshes.
    /// The account data changes at most a few times a day; 10 minutes keeps the live reading useful.
    pub poll_interval_seconds: u64,
    /// Budget for obtaining a token at the start of a refresh.
    pub login_timeout_seconds: u64,
    /// Budget for a whole refresh. Must exceed reading_max_iterations * reading_sleep_seconds.
    pub refresh_timeout_seconds: u64,

    // --- live reading ---

    /// How many times the last-reading endpoint is polled after a reading request was accepted.
    pub reading_max_iterations: u32,
    /// Pause between two polls of the last-reading endpoint.
    pub reading_sleep_seconds: u64,
    /// When set, the live power is also integrated over this interval into an energy figure (kWh).
    pub sync_interval_minutes: Option<u64>,

    // --- logging ---

    /// Log level: "Trace", "Debug", "Info", "Warn", "Error"
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // account
            email:                    String::new(),
            phone:                    String::new(),
            account_service_point_id: String::new(),
            // connectivity
            base_url:                 BASE_URL.to_string(),
            poll_interval_seconds:    600,
            login_timeout_seconds:    20,
            refresh_timeout_seconds:  180,
            // live reading - 20 polls, 5 s apart
            reading_max_iterations:   20,
            reading_sleep_seconds:    5,
            sync_interval_minutes:    None,
            // logging
            log_level: "Info".to_string(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_seconds)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds)
    }

    /// Longest time the live-reading loop can spend sleeping.
    pub fn reading_budget(&self) -> Duration {
        Duration::from_secs(self.reading_sleep_seconds * u64::from(self.reading_max_iterations))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            reading:  ReadingOptions {
                max_iterations: self.reading_max_iterations,
                sleep_interval: Duration::from_secs(self.reading_sleep_seconds),
                sync_interval:  self.sync_interval_minutes.map(|m| Duration::from_secs(m * 60)),
            },
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

pub fn load_config(path: &Path) -> Result<Config> {
    let config_data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    parse_config(&config_data)
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))
}

pub fn parse_config(json: &str) -> Result<Config> {
    Ok(serde_json::from_str(json)?)
}

// --------------------------------------------------------------------------------------------------------------
