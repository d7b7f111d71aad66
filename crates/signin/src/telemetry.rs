//! Logging and error tracking.
//!
//! `tracing` events go to stderr and, when `SENTRY_DSN` is set, to Sentry:
//! warnings and errors as events, info and debug as breadcrumbs.

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, TelemetryConfig};

const DEFAULT_FILTER: &str = "social_signin=info";

/// Initialize Sentry (if configured) and the global tracing subscriber.
///
/// The returned guard flushes Sentry on drop and must be kept alive for the
/// lifetime of the process.
#[must_use = "dropping the guard disables Sentry"]
pub fn init(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    // Sentry must be initialized before the subscriber.
    let guard = init_sentry(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(sentry_tracing::layer().event_filter(sentry_event_filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(sentry_tracing::layer().event_filter(sentry_event_filter))
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }

    guard
}

fn init_sentry(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Associate subsequent Sentry events with a signed-in user.
pub fn set_sentry_user(uid: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(uid.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Stop associating Sentry events with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_without_dsn_has_no_guard() {
        let guard = init(&TelemetryConfig::default());
        assert!(guard.is_none());
        // A second install is tolerated.
        assert!(init(&TelemetryConfig::default()).is_none());
    }

    #[test]
    fn test_init_json_format() {
        let config = TelemetryConfig {
            log_format: LogFormat::Json,
            ..TelemetryConfig::default()
        };
        assert!(init(&config).is_none());
    }

    #[test]
    fn test_sentry_user_roundtrip_without_client() {
        set_sentry_user(&"uid-1", Some("jo@x.com"));
        clear_sentry_user();
    }
}
