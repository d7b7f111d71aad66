//! One-time provider SDK initialization.
//!
//! Google and Facebook SDKs hold process-wide configuration. It is applied
//! here, once, by the hosting application before any sign-in runs.
//! [`configure_providers`] hands back a [`ConfiguredSdk`], and the
//! orchestrator only accepts that type.

use std::fmt;
use std::ops::Deref;

use secrecy::SecretString;
use tracing::{info, instrument};

use social_signin_core::Provider;

use crate::config::SignInConfig;
use crate::services::{ProviderSdk, SdkError};

/// Graph API fields requested after Facebook Login.
pub const FACEBOOK_GRAPH_FIELDS: &str = "id,name,email,picture.type(large),first_name,last_name";

/// Scopes requested from Google Sign-In.
pub const GOOGLE_SCOPES: &[&str] = &["openid", "email", "profile"];

/// Scopes requested from Sign in with Apple.
pub const APPLE_SCOPES: &[&str] = &["email", "fullName"];

/// Facebook Login permissions.
pub const FACEBOOK_PERMISSIONS: &[&str] = &["public_profile", "email"];

/// Per-provider SDK settings.
#[derive(Clone)]
pub enum ProviderSettings {
    Google {
        web_client_id: String,
        ios_client_id: Option<String>,
        scopes: Vec<String>,
    },
    Facebook {
        app_id: String,
        client_token: Option<SecretString>,
        permissions: Vec<String>,
        graph_fields: String,
    },
    Apple {
        service_id: String,
        scopes: Vec<String>,
    },
}

impl ProviderSettings {
    /// Settings for every provider, derived from configuration.
    #[must_use]
    pub fn all(config: &SignInConfig) -> [Self; 3] {
        [
            Self::Google {
                web_client_id: config.google.web_client_id.clone(),
                ios_client_id: config.google.ios_client_id.clone(),
                scopes: owned(GOOGLE_SCOPES),
            },
            Self::Facebook {
                app_id: config.facebook.app_id.clone(),
                client_token: config.facebook.client_token.clone(),
                permissions: owned(FACEBOOK_PERMISSIONS),
                graph_fields: FACEBOOK_GRAPH_FIELDS.to_owned(),
            },
            Self::Apple {
                service_id: config.apple.service_id.clone(),
                scopes: owned(APPLE_SCOPES),
            },
        ]
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Google { .. } => Provider::Google,
            Self::Facebook { .. } => Provider::Facebook,
            Self::Apple { .. } => Provider::Apple,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google {
                web_client_id,
                ios_client_id,
                scopes,
            } => f
                .debug_struct("Google")
                .field("web_client_id", web_client_id)
                .field("ios_client_id", ios_client_id)
                .field("scopes", scopes)
                .finish(),
            Self::Facebook {
                app_id,
                client_token,
                permissions,
                graph_fields,
            } => f
                .debug_struct("Facebook")
                .field("app_id", app_id)
                .field("client_token", &client_token.as_ref().map(|_| "[REDACTED]"))
                .field("permissions", permissions)
                .field("graph_fields", graph_fields)
                .finish(),
            Self::Apple { service_id, scopes } => f
                .debug_struct("Apple")
                .field("service_id", service_id)
                .field("scopes", scopes)
                .finish(),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

/// A provider SDK that has been configured for every provider.
#[derive(Debug)]
pub struct ConfiguredSdk<S> {
    sdk: S,
}

impl<S> ConfiguredSdk<S> {
    /// Give the SDK back.
    pub fn into_inner(self) -> S {
        self.sdk
    }
}

impl<S> Deref for ConfiguredSdk<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.sdk
    }
}

/// Configure every provider SDK exactly once.
///
/// # Errors
///
/// Returns the first `SdkError` reported by `ProviderSdk::configure`.
#[instrument(skip_all)]
pub async fn configure_providers<S: ProviderSdk>(
    sdk: S,
    config: &SignInConfig,
) -> Result<ConfiguredSdk<S>, SdkError> {
    for settings in ProviderSettings::all(config) {
        sdk.configure(&settings).await?;
        info!(provider = %settings.provider(), "Provider SDK configured");
    }
    Ok(ConfiguredSdk { sdk })
}
