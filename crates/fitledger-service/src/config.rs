//! Service configuration.

use std::str::FromStr;

use fitledger_engine::EngineConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/fitledger").
    pub data_dir: String,

    /// Service API key for `/v1` requests.
    pub service_api_key: Option<String>,

    /// Admin API key for `/v1/admin` requests.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Points, feature flags and calendar settings passed to the engine.
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            points_routine_complete: env_or("POINTS_ROUTINE_COMPLETE", defaults.points_routine_complete),
            points_meal_logged: env_or("POINTS_MEAL_LOGGED", defaults.points_meal_logged),
            points_checkin_complete: env_or("POINTS_CHECKIN_COMPLETE", defaults.points_checkin_complete),
            award_meal_points: env_or("AWARD_MEAL_POINTS", defaults.award_meal_points),
            award_checkin_points: env_or("AWARD_CHECKIN_POINTS", defaults.award_checkin_points),
            max_range_days: env_or("MAX_RANGE_DAYS", defaults.max_range_days),
            utc_offset_minutes: env_or("UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/fitledger".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_or("MAX_BODY_BYTES", 1024 * 1024), // 1MB
            request_timeout_seconds: env_or("REQUEST_TIMEOUT_SECONDS", 30),
            engine,
        }
    }
}

/// Parse an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = %name, value = %raw, "Unparsable setting, using default");
            default
        }),
        Err(_) => default,
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/fitledger".into(),
            service_api_key: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            engine: EngineConfig::default(),
        }
    }
}
