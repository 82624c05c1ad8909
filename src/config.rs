use crate::error::{AppError, Result};

pub const PROVIDER_URL: &str =
    "https://webapi.sporttery.cn/gateway/uniform/football/getMatchCalculatorV1.qry";

/// Fixed client identifier sent with every provider request.
pub const USER_AGENT: &str = "football-odds-sync/1.0";

/// Sync interval (seconds): how often the scheduler runs a full cycle.
pub const SYNC_INTERVAL_SECS: u64 = 600;

/// Per-request provider timeout (seconds). There is no per-cycle timeout.
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// Provider kickoff date/time strings are China Standard Time.
pub const PROVIDER_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Kickoff format after joining `matchDate` and `matchTime` with a space.
pub const KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read API page size bounds.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub provider_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub sync_interval_secs: u64,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; real environment variables still apply.
        let _ = dotenvy::dotenv();

        let sync_interval_secs = parse_var("SYNC_INTERVAL_SECS", SYNC_INTERVAL_SECS)?;
        if sync_interval_secs == 0 {
            return Err(AppError::Config(
                "SYNC_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            provider_url: std::env::var("PROVIDER_URL")
                .unwrap_or_else(|_| PROVIDER_URL.to_string()),
            user_agent: std::env::var("USER_AGENT").unwrap_or_else(|_| USER_AGENT.to_string()),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
            sync_interval_secs,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH")
                .unwrap_or_else(|_| "football_odds.sqlite".to_string()),
            api_port: parse_var("API_PORT", 8000u16)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} must be a valid number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
