//! Loads the static YAML upload config and the bearer credential from the environment.
//!
//! The YAML file never holds secrets. OAuth material comes from environment variables
//! (optionally via a `.env` file):
//!
//! | Variable              | Meaning                                             |
//! |-----------------------|-----------------------------------------------------|
//! | `OAUTH_ACCESS_TOKEN`  | Bearer token to start with                          |
//! | `OAUTH_REFRESH_TOKEN` | Enables refresh; needs client id and secret as well |
//! | `OAUTH_CLIENT_ID`     | OAuth client id                                     |
//! | `OAUTH_CLIENT_SECRET` | OAuth client secret                                 |
//! | `OAUTH_TOKEN_URI`     | Token endpoint override                             |

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use media_backup_core::config::UploadConfig;
use media_backup_core::contract::Credential;
use media_backup_core::credential::{OAuthCredential, StaticToken};
use tracing::{error, info};

pub const ACCESS_TOKEN_VAR: &str = "OAUTH_ACCESS_TOKEN";
pub const REFRESH_TOKEN_VAR: &str = "OAUTH_REFRESH_TOKEN";
pub const CLIENT_ID_VAR: &str = "OAUTH_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "OAUTH_CLIENT_SECRET";
pub const TOKEN_URI_VAR: &str = "OAUTH_TOKEN_URI";

/// Parse and validate the YAML config at `path`. Missing sections fall back to defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UploadConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: UploadConfig = if content.trim().is_empty() {
        UploadConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow!("Failed to parse config YAML: {e}")
        })?
    };

    config.validate().map_err(|e| {
        error!(error = %e, config_path = ?path_ref, "Config failed validation");
        anyhow!("Invalid config {:?}: {}", path_ref, e)
    })?;
    config.trace_loaded();
    Ok(config)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Build the bearer credential from the environment.
///
/// With a refresh token the credential can renew itself; with only an access token it is
/// used as-is until the server rejects it.
pub fn load_credential() -> Result<Box<dyn Credential>> {
    let access_token = non_empty_var(ACCESS_TOKEN_VAR);

    if let Some(refresh_token) = non_empty_var(REFRESH_TOKEN_VAR) {
        let (Some(client_id), Some(client_secret)) =
            (non_empty_var(CLIENT_ID_VAR), non_empty_var(CLIENT_SECRET_VAR))
        else {
            error!("Refresh token present but OAuth client id or secret missing");
            bail!("{REFRESH_TOKEN_VAR} requires {CLIENT_ID_VAR} and {CLIENT_SECRET_VAR} to be set");
        };
        let mut credential = OAuthCredential::new(client_id, client_secret, refresh_token);
        if let Some(uri) = non_empty_var(TOKEN_URI_VAR) {
            credential = credential.with_token_uri(uri);
        }
        if let Some(token) = access_token {
            credential = credential.with_access_token(token, None);
        }
        info!("Using refreshable OAuth credential");
        return Ok(Box::new(credential));
    }

    match access_token {
        Some(token) => {
            info!("Using static bearer token");
            Ok(Box::new(StaticToken::new(token)))
        }
        None => {
            error!("No OAuth credential in environment");
            Err(anyhow!(
                "no credential found: set {ACCESS_TOKEN_VAR}, or {REFRESH_TOKEN_VAR} with {CLIENT_ID_VAR} and {CLIENT_SECRET_VAR}"
            ))
        }
    }
}
