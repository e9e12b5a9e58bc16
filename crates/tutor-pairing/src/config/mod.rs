use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::workflows::pairing::PairingConfig;
use crate::workflows::performance::{ScoringConfig, ScoringWeights, TierThresholds};

/// Longest response window an operator may configure.
pub const MAX_RESPONSE_WINDOW_HOURS: i64 = 24 * 365;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pairing: PairingConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let seed_dir = env::var("APP_SEED_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let pairing = PairingConfig {
            response_window_hours: parse_var("PAIRING_RESPONSE_WINDOW_HOURS", 48)?,
            max_commit_attempts: parse_var("PAIRING_MAX_COMMIT_ATTEMPTS", 3)?,
        };
        if !(1..=MAX_RESPONSE_WINDOW_HOURS).contains(&pairing.response_window_hours) {
            return Err(ConfigError::OutOfRange {
                name: "PAIRING_RESPONSE_WINDOW_HOURS",
                detail: format!("must be between 1 and {MAX_RESPONSE_WINDOW_HOURS} hours"),
            });
        }
        if pairing.max_commit_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                name: "PAIRING_MAX_COMMIT_ATTEMPTS",
                detail: "must allow at least one attempt".to_string(),
            });
        }

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            weights: ScoringWeights {
                attendance: parse_var("SCORING_WEIGHT_ATTENDANCE", defaults.weights.attendance)?,
                assignments: parse_var(
                    "SCORING_WEIGHT_ASSIGNMENTS",
                    defaults.weights.assignments,
                )?,
                exams: parse_var("SCORING_WEIGHT_EXAMS", defaults.weights.exams)?,
                reviews: parse_var("SCORING_WEIGHT_REVIEWS", defaults.weights.reviews)?,
            },
            min_completed_sessions: parse_var(
                "SCORING_MIN_COMPLETED_SESSIONS",
                defaults.min_completed_sessions,
            )?,
            min_graded_assignments: parse_var(
                "SCORING_MIN_GRADED_ASSIGNMENTS",
                defaults.min_graded_assignments,
            )?,
            thresholds: TierThresholds {
                tier_two_min_score: parse_var(
                    "TIER_TWO_MIN_SCORE",
                    defaults.thresholds.tier_two_min_score,
                )?,
                tier_three_above_score: parse_var(
                    "TIER_THREE_ABOVE_SCORE",
                    defaults.thresholds.tier_three_above_score,
                )?,
            },
        };
        scoring
            .validate()
            .map_err(|detail| ConfigError::OutOfRange {
                name: "SCORING_*",
                detail,
            })?;

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                seed_dir,
            },
            telemetry: TelemetryConfig { log_level },
            pairing,
            scoring,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        _ => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of roster CSVs loaded into the store at startup.
    pub seed_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    OutOfRange { name: &'static str, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be numeric (found '{value}')")
            }
            ConfigError::OutOfRange { name, detail } => write!(f, "{name} {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. } => None,
        }
    }
}
