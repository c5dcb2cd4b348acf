use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::sweep::SweepSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub check_in_base_url: String,
    pub sweep: SweepSettings,
    pub staffing_check_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let sweep = SweepSettings {
            buffer_minutes: try_load("SWEEP_BUFFER_MINUTES", 1)?,
            max_late_window_minutes: try_load("SWEEP_MAX_LATE_MINUTES", 30)?,
            interval: Duration::from_secs(try_load("SWEEP_INTERVAL_SECS", 60)?),
        };
        anyhow::ensure!(sweep.buffer_minutes >= 0, "SWEEP_BUFFER_MINUTES must not be negative");
        anyhow::ensure!(
            sweep.max_late_window_minutes >= 0,
            "SWEEP_MAX_LATE_MINUTES must not be negative"
        );
        anyhow::ensure!(!sweep.interval.is_zero(), "SWEEP_INTERVAL_SECS must be positive");

        let staffing_check_interval = Duration::from_secs(try_load("STAFFING_CHECK_SECS", 60)?);
        anyhow::ensure!(
            !staffing_check_interval.is_zero(),
            "STAFFING_CHECK_SECS must be positive"
        );

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            max_connections: try_load("DB_MAX_CONNECTIONS", 5)?,
            check_in_base_url: env::var("CHECKIN_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            sweep,
            staffing_check_interval,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value '{value}'")),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
