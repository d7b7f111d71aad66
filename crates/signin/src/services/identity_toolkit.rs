//! Identity Toolkit `accounts:signInWithIdp` client.
//!
//! Exchanges a provider token for a backend uid and federated identity
//! token. The backend verifies the provider token; this client only maps
//! the request and the response.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use social_signin_core::{Uid, claim::non_blank};

use super::{ExchangeError, ExchangeResult, IdentityExchange};
use crate::config::IdentityToolkitConfig;
use crate::models::{FederatedIdentity, IdpAssertion, IdpToken};

const SIGN_IN_WITH_IDP_PATH: &str = "v1/accounts:signInWithIdp";

/// Redirect URI sent with native-SDK tokens. Required by the API, unused.
const DEFAULT_REQUEST_URI: &str = "http://localhost";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    #[serde(default)]
    local_id: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    federated_id: Option<String>,
    #[serde(default)]
    raw_user_info: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    need_confirmation: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Provider user info echoed back by the backend (`rawUserInfo`).
#[derive(Debug, Deserialize)]
struct RawUserInfo {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

/// Client for the backend identity exchange.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    inner: Arc<IdentityToolkitClientInner>,
}

struct IdentityToolkitClientInner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    request_uri: String,
}

impl IdentityToolkitClient {
    #[must_use]
    pub fn new(config: &IdentityToolkitConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &IdentityToolkitConfig) -> Self {
        Self {
            inner: Arc::new(IdentityToolkitClientInner {
                client,
                endpoint: config.endpoint.clone(),
                api_key: config.api_key.clone(),
                request_uri: DEFAULT_REQUEST_URI.to_owned(),
            }),
        }
    }

    fn sign_in_url(&self) -> Result<Url, ExchangeError> {
        let mut url = self
            .inner
            .endpoint
            .join(SIGN_IN_WITH_IDP_PATH)
            .map_err(|e| ExchangeError::Unexpected(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }
}

impl std::fmt::Debug for IdentityToolkitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToolkitClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Form-encoded `postBody` carrying the provider token.
fn post_body(assertion: &IdpAssertion) -> String {
    let mut body = url::form_urlencoded::Serializer::new(String::new());
    match &assertion.token {
        IdpToken::IdToken(token) => body.append_pair("id_token", token.expose_secret()),
        IdpToken::AccessToken(token) => body.append_pair("access_token", token.expose_secret()),
    };
    body.append_pair("providerId", assertion.provider.federated_id());
    if let Some(nonce) = &assertion.nonce {
        body.append_pair("nonce", nonce);
    }
    body.finish()
}

/// Map a backend error message (`"CODE : detail"`) to an exchange error.
fn map_error_message(message: &str, email: Option<String>) -> ExchangeError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or_default()
        .trim();
    match code {
        "FEDERATED_USER_ID_ALREADY_LINKED" | "EMAIL_EXISTS" => {
            ExchangeError::AccountConflict { email }
        }
        "USER_DISABLED" => ExchangeError::AccountDisabled,
        "OPERATION_NOT_ALLOWED" => ExchangeError::OperationNotAllowed,
        c if c == "INVALID_IDP_RESPONSE" || c.starts_with("INVALID_CREDENTIAL") => {
            ExchangeError::InvalidCredential(message.to_owned())
        }
        _ => ExchangeError::Unexpected(message.to_owned()),
    }
}

/// The provider-scoped id: `rawUserInfo.sub`/`id`, else the last segment of
/// `federatedId` (`https://accounts.google.com/<sub>`).
fn provider_user_id(response: &SignInWithIdpResponse) -> Option<String> {
    let from_raw = response
        .raw_user_info
        .as_deref()
        .and_then(|raw| serde_json::from_str::<RawUserInfo>(raw).ok())
        .and_then(|info| info.sub.or(info.id))
        .filter(|id| !id.trim().is_empty());

    from_raw.or_else(|| {
        let federated_id = non_blank(response.federated_id.as_deref())?;
        let last = federated_id.rsplit('/').next().unwrap_or(federated_id);
        non_blank(Some(last)).map(str::to_owned)
    })
}

#[async_trait]
impl IdentityExchange for IdentityToolkitClient {
    #[instrument(skip_all, fields(provider = %assertion.provider))]
    async fn exchange(&self, assertion: &IdpAssertion) -> Result<ExchangeResult, ExchangeError> {
        let request = SignInWithIdpRequest {
            post_body: post_body(assertion),
            request_uri: &self.inner.request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };

        let response = self
            .inner
            .client
            .post(self.sign_in_url()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ExchangeError::Transport(format!("backend returned {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("backend returned {status}"));
            debug!(%status, %message, "Identity exchange rejected");
            return Err(map_error_message(&message, None));
        }

        let body: SignInWithIdpResponse = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::Unexpected(format!("invalid response body: {e}")))?;

        if body.need_confirmation.unwrap_or(false) {
            return Err(ExchangeError::AccountConflict { email: body.email });
        }

        let uid = body
            .local_id
            .as_deref()
            .and_then(|id| Uid::parse(id).ok())
            .ok_or_else(|| ExchangeError::Unexpected("response has no localId".to_owned()))?;
        let token = non_blank(body.id_token.as_deref())
            .map(|t| SecretString::from(t.to_owned()))
            .ok_or_else(|| ExchangeError::Unexpected("response has no idToken".to_owned()))?;

        let federated = FederatedIdentity {
            provider_user_id: provider_user_id(&body),
            email: body.email,
            email_verified: body.email_verified,
            display_name: body.display_name,
            photo_url: body.photo_url,
        };

        Ok(ExchangeResult {
            token,
            uid,
            federated,
        })
    }
}
