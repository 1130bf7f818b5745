//! Process settings from the environment (`.env` honored).

use crate::error::ConfigError;
use crate::query::parse_timezone;
use chrono_tz::Tz;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 250;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Directory holding the model config JSON files.
    pub config_path: String,
    /// Timezone assumed for client timestamps when the request names none.
    pub default_timezone: Tz,
    /// Timezone timestamps are stored in.
    pub storage_timezone: Tz,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/libris".into(),
            bind_addr: "0.0.0.0:3000".into(),
            config_path: "sample".into(),
            default_timezone: chrono_tz::UTC,
            storage_timezone: chrono_tz::UTC,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(ConfigError::Load(format!(".env: {}", e)));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = Settings::default();
        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("CONFIG_PATH") {
            s.config_path = v;
        }
        if let Some(v) = lookup("DEFAULT_TIMEZONE").or_else(|| lookup("TZ")) {
            s.default_timezone = timezone("DEFAULT_TIMEZONE", &v)?;
        }
        if let Some(v) = lookup("STORAGE_TIMEZONE") {
            s.storage_timezone = timezone("STORAGE_TIMEZONE", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_PAGE_SIZE") {
            s.default_page_size = page_size("DEFAULT_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_PAGE_SIZE") {
            s.max_page_size = page_size("MAX_PAGE_SIZE", &v)?;
        }
        if s.default_page_size > s.max_page_size {
            return Err(ConfigError::Validation(format!(
                "DEFAULT_PAGE_SIZE {} exceeds MAX_PAGE_SIZE {}",
                s.default_page_size, s.max_page_size
            )));
        }
        Ok(s)
    }
}

fn timezone(key: &str, value: &str) -> Result<Tz, ConfigError> {
    // TZ may carry a leading ':' (":Europe/Paris")
    parse_timezone(value.trim_start_matches(':'))
        .map_err(|e| ConfigError::Validation(format!("{}: {}", key, e)))
}

fn page_size(key: &str, value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Validation(format!("{} must be a positive integer, got '{}'", key, value))),
    }
}
