//! Backend API token commands.
//!
//! The token is kept in a file so later `atelier orders` runs send it as a
//! bearer token.
//!
//! # Environment Variables
//!
//! - `ATELIER_TOKEN_FILE` - Token file path
//! - `XDG_CONFIG_HOME` / `HOME` - Locate the default `atelier/token` file

use std::path::PathBuf;

use atelier_storefront::api::{FileTokenStore, TokenStore, TokenStoreError};
use secrecy::SecretString;
use thiserror::Error;

/// Errors managing the stored token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No token file given and neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,

    #[error("Token must not be empty")]
    EmptyToken,

    #[error(transparent)]
    Store(#[from] TokenStoreError),
}

/// Default token location under the user's config directory.
fn default_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_dir.join("atelier").join("token"))
}

/// Open the token store at `path`, or at the default location.
///
/// # Errors
///
/// Returns `TokenError::NoConfigDir` if no path is given and no config
/// directory can be found.
pub fn store(path: Option<PathBuf>) -> Result<FileTokenStore, TokenError> {
    path.or_else(default_path)
        .map(FileTokenStore::new)
        .ok_or(TokenError::NoConfigDir)
}

/// Store `token`, replacing any previous one.
///
/// # Errors
///
/// Returns an error if the token is blank or cannot be written.
pub fn set(store: &FileTokenStore, token: &str) -> Result<(), TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::EmptyToken);
    }

    store.save(Some(&SecretString::from(token.to_owned())))?;
    tracing::info!(path = %store.path().display(), "API token saved");
    Ok(())
}

/// Remove the stored token.
///
/// # Errors
///
/// Returns an error if the token file exists but cannot be removed.
pub fn clear(store: &FileTokenStore) -> Result<(), TokenError> {
    store.save(None)?;
    tracing::info!(path = %store.path().display(), "API token cleared");
    Ok(())
}
