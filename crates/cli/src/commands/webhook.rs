//! Webhook test commands.
//!
//! Signs a raw event payload the way the payment processor does, so a local
//! storefront can be exercised without a processor account.
//!
//! # Usage
//!
//! ```bash
//! atelier webhook sign --payload-file event.json
//! atelier webhook sign --payload-file event.json \
//!     --send http://127.0.0.1:3000/api/webhooks/stripe
//! ```
//!
//! # Environment Variables
//!
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret

use std::path::{Path, PathBuf};

use atelier_storefront::payments::{StripeWebhookVerifier, WebhookError};
use atelier_storefront::routes::webhooks::STRIPE_SIGNATURE_HEADER;
use secrecy::SecretString;
use thiserror::Error;

/// Errors from webhook commands.
#[derive(Debug, Error)]
pub enum WebhookCommandError {
    #[error("Failed to read {path}: {source}")]
    ReadPayload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to sign payload: {0}")]
    Sign(#[from] WebhookError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("Server rejected webhook with {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Compute the signature header for `payload`.
fn signature_header(
    secret: String,
    payload: &[u8],
    timestamp: i64,
) -> Result<String, WebhookCommandError> {
    let verifier = StripeWebhookVerifier::new(SecretString::from(secret));
    Ok(verifier.sign(payload, timestamp)?)
}

/// Sign a payload file and optionally deliver it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the secret is unusable, or
/// delivery fails or is rejected.
pub async fn sign(
    secret: String,
    payload_file: &Path,
    timestamp: Option<i64>,
    send: Option<&str>,
) -> Result<(), WebhookCommandError> {
    let payload =
        std::fs::read(payload_file).map_err(|source| WebhookCommandError::ReadPayload {
            path: payload_file.to_path_buf(),
            source,
        })?;

    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let header = signature_header(secret, &payload, timestamp)?;
    tracing::info!("{STRIPE_SIGNATURE_HEADER}: {header}");

    if let Some(url) = send {
        deliver(url, &header, payload).await?;
    }
    Ok(())
}

async fn deliver(url: &str, header: &str, payload: Vec<u8>) -> Result<(), WebhookCommandError> {
    tracing::info!(url, "Delivering signed webhook...");

    let response = reqwest::Client::new()
        .post(url)
        .header(STRIPE_SIGNATURE_HEADER, header)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(WebhookCommandError::Rejected { status, body });
    }

    tracing::info!(%status, "Webhook accepted: {body}");
    Ok(())
}
