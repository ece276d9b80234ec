//! Bearer credentials.
//!
//! [`StaticToken`] wraps a token handed in from outside and never expires.
//! [`OAuthCredential`] exchanges an OAuth2 refresh token for access tokens.
//! Obtaining the refresh token in the first place (the consent flow) is not handled here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::contract::Credential;
use crate::error::CredentialError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed ahead of time.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Return a usable bearer token, refreshing the credential once if it reports expired.
pub async fn ensure_fresh<C>(credential: &mut C) -> Result<String, CredentialError>
where
    C: Credential + ?Sized,
{
    if credential.is_expired() {
        info!("Bearer credential expired, refreshing before session initiation");
        if let Err(e) = credential.refresh().await {
            error!(error = %e, "Credential refresh failed");
            return Err(e);
        }
    }
    Ok(credential.token())
}

#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Credential for StaticToken {
    fn token(&self) -> String {
        self.token.clone()
    }

    fn is_expired(&self) -> bool {
        false
    }

    async fn refresh(&mut self) -> Result<(), CredentialError> {
        Err(CredentialError::NoRefreshToken)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

pub struct OAuthCredential {
    client: reqwest::Client,
    token_uri: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    access_token: Option<String>,
    expires_at: Option<Instant>,
}

impl OAuthCredential {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            access_token: None,
            expires_at: None,
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Seed a previously issued access token. Without `expires_in` it is trusted until a
    /// refresh replaces it.
    pub fn with_access_token(mut self, token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        self.access_token = Some(token.into());
        self.expires_at = expires_in.map(|d| Instant::now() + d);
        self
    }
}

#[async_trait]
impl Credential for OAuthCredential {
    fn token(&self) -> String {
        self.access_token.clone().unwrap_or_default()
    }

    fn is_expired(&self) -> bool {
        match (&self.access_token, self.expires_at) {
            (None, _) => true,
            (Some(_), Some(at)) => Instant::now() + EXPIRY_SKEW >= at,
            (Some(_), None) => false,
        }
    }

    async fn refresh(&mut self) -> Result<(), CredentialError> {
        if self.refresh_token.is_empty() {
            return Err(CredentialError::NoRefreshToken);
        }
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.client.post(&self.token_uri).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or(body);
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CredentialError::MalformedToken(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(CredentialError::MalformedToken("empty access_token".into()));
        }
        info!(expires_in = ?token.expires_in, "Refreshed OAuth access token");
        self.expires_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        self.access_token = Some(token.access_token);
        Ok(())
    }
}
