//! Bearer token acquisition: static tokens or an OAuth refresh-token exchange.

use pushload_types::error::PushError;
use reqwest::header::HeaderValue;
use serde::Deserialize;

use crate::config::types::AuthConfig;

/// Bearer token for the destination API.
///
/// Stored without the `Bearer ` prefix. Validated at construction to contain
/// only visible ASCII, so it always converts to a header value. `Debug`
/// output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Validate and wrap a raw token.
    ///
    /// # Errors
    ///
    /// Returns an `auth` error if the token is empty or contains characters
    /// outside the visible ASCII range.
    pub fn new(token: impl Into<String>) -> Result<Self, PushError> {
        let token = token.into();
        if token.is_empty() {
            return Err(PushError::auth("INVALID_TOKEN", "bearer token is empty"));
        }
        if let Some((idx, _)) = token
            .char_indices()
            .find(|(_, ch)| !(' '..='~').contains(ch))
        {
            return Err(PushError::auth(
                "INVALID_TOKEN",
                format!("bearer token contains an invalid character at byte {idx}"),
            ));
        }
        Ok(Self(token))
    }

    /// `Authorization` header value, marked sensitive.
    pub fn header_value(&self) -> HeaderValue {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));
        value.set_sensitive(true);
        value
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Resolve the configured credential source into a bearer token.
///
/// # Errors
///
/// Returns an `auth` error when no credentials are configured, the refresh
/// exchange is rejected, or the token endpoint returns an unusable body.
pub async fn resolve_token(
    auth: Option<&AuthConfig>,
    http: &reqwest::Client,
) -> Result<BearerToken, PushError> {
    match auth {
        None => Err(PushError::config(
            "MISSING_CREDENTIALS",
            "auth section is required to talk to the destination",
        )),
        Some(AuthConfig::Static { token }) => BearerToken::new(token.trim()),
        Some(AuthConfig::OauthRefresh {
            client_id,
            client_secret,
            refresh_token,
            token_url,
            resource,
        }) => {
            tracing::debug!(token_url = %token_url, client_id = %client_id, "Refreshing access token");
            let form = [
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("resource", resource.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ];
            let response = http
                .post(token_url)
                .form(&form)
                .send()
                .await
                .map_err(|e| {
                    PushError::transient_network(
                        "TOKEN_ENDPOINT_UNREACHABLE",
                        format!("token endpoint request failed: {e}"),
                    )
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(PushError::auth(
                    "TOKEN_REFRESH_FAILED",
                    "Unable to refresh access token. Please reset the account authorization.",
                )
                .with_status(status.as_u16()));
            }

            let body: TokenResponse = response.json().await.map_err(|e| {
                PushError::auth(
                    "TOKEN_REFRESH_FAILED",
                    format!("token endpoint returned an unreadable body: {e}"),
                )
            })?;
            tracing::info!("Access token refreshed");
            BearerToken::new(body.access_token)
        }
    }
}
