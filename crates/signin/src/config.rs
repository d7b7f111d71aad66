//! Sign-in configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SIGNIN_GOOGLE_WEB_CLIENT_ID` - Google web client id the SDK mints ID tokens for
//! - `SIGNIN_FACEBOOK_APP_ID` - Facebook application id
//! - `SIGNIN_APPLE_SERVICE_ID` - Apple services id (bundle id on iOS)
//! - `IDENTITY_TOOLKIT_API_KEY` - Backend auth service API key (high entropy)
//!
//! ## Optional
//! - `SIGNIN_GOOGLE_IOS_CLIENT_ID` - Google iOS client id
//! - `SIGNIN_FACEBOOK_CLIENT_TOKEN` - Facebook client token
//! - `IDENTITY_TOOLKIT_ENDPOINT` - Backend base URL (default: `https://identitytoolkit.googleapis.com`)
//! - `SIGNIN_DATABASE_URL` - `PostgreSQL` profile store (falls back to `DATABASE_URL`)
//! - `SIGNIN_LOG_FORMAT` - `pretty` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate, 0.0 to 1.0 (default: 1.0)

use std::collections::HashMap;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_IDENTITY_TOOLKIT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Complete sign-in configuration.
#[derive(Debug, Clone)]
pub struct SignInConfig {
    pub google: GoogleConfig,
    pub facebook: FacebookConfig,
    pub apple: AppleConfig,
    pub identity_toolkit: IdentityToolkitConfig,
    /// `PostgreSQL` profile store connection URL (contains password)
    pub database_url: Option<SecretString>,
    pub telemetry: TelemetryConfig,
}

/// Google Sign-In client ids.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub web_client_id: String,
    pub ios_client_id: Option<String>,
}

/// Facebook Login application.
///
/// Implements `Debug` manually to redact the client token.
#[derive(Clone)]
pub struct FacebookConfig {
    pub app_id: String,
    pub client_token: Option<SecretString>,
}

impl std::fmt::Debug for FacebookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookConfig")
            .field("app_id", &self.app_id)
            .field("client_token", &self.client_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Sign in with Apple.
#[derive(Debug, Clone)]
pub struct AppleConfig {
    pub service_id: String,
}

/// Backend identity exchange.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct IdentityToolkitConfig {
    pub api_key: SecretString,
    pub endpoint: Url,
}

impl std::fmt::Debug for IdentityToolkitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToolkitConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Logging and Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
}

impl SignInConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&env_lookup)
    }

    /// Load configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`SignInConfig::from_env`].
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        Ok(Self {
            google: GoogleConfig {
                web_client_id: env.required("SIGNIN_GOOGLE_WEB_CLIENT_ID")?,
                ios_client_id: env.optional("SIGNIN_GOOGLE_IOS_CLIENT_ID"),
            },
            facebook: FacebookConfig {
                app_id: env.required("SIGNIN_FACEBOOK_APP_ID")?,
                client_token: env.optional("SIGNIN_FACEBOOK_CLIENT_TOKEN").map(SecretString::from),
            },
            apple: AppleConfig {
                service_id: env.required("SIGNIN_APPLE_SERVICE_ID")?,
            },
            identity_toolkit: IdentityToolkitConfig {
                api_key: env.validated_secret("IDENTITY_TOOLKIT_API_KEY")?,
                endpoint: env.url_or_default(
                    "IDENTITY_TOOLKIT_ENDPOINT",
                    DEFAULT_IDENTITY_TOOLKIT_ENDPOINT,
                )?,
            },
            database_url: env.database_url("SIGNIN_DATABASE_URL"),
            telemetry: TelemetryConfig::from_lookup(lookup)?,
        })
    }
}

impl TelemetryConfig {
    /// Load only the telemetry settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for an unknown log format or a
    /// sample rate outside `0.0..=1.0`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let log_format = match env.optional("SIGNIN_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::InvalidEnvVar("SIGNIN_LOG_FORMAT".to_string(), e))?,
            None => LogFormat::default(),
        };

        let sentry_sample_rate = match env.optional("SENTRY_SAMPLE_RATE") {
            Some(raw) => {
                let rate = raw.parse::<f32>().map_err(|e| {
                    ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
                })?;
                if !(0.0..=1.0).contains(&rate) {
                    return Err(ConfigError::InvalidEnvVar(
                        "SENTRY_SAMPLE_RATE".to_string(),
                        format!("must be between 0.0 and 1.0 (got {rate})"),
                    ));
                }
                rate
            }
            None => 1.0,
        };

        Ok(Self {
            log_format,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

/// Database URL for tools that only need the profile store.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `SIGNIN_DATABASE_URL` nor
/// `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    Env(&env_lookup)
        .database_url("SIGNIN_DATABASE_URL")
        .ok_or_else(|| ConfigError::MissingEnvVar("SIGNIN_DATABASE_URL".to_string()))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Environment accessor. Empty values count as unset.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }

    fn url_or_default(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Primary key first, then the generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Option<SecretString> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholder values and low-entropy secrets.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
