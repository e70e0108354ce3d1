//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (checkout redirects)
//! - `STOREFRONT_API_BASE_URL` - Backend REST API base URL
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key (safe to expose in browser)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string;
//!   orders are kept in memory when unset
//! - `STOREFRONT_API_TOKEN` - Bearer token for the backend API
//! - `STRIPE_API_BASE` - Stripe API base (default: <https://api.stripe.com>)
//! - `CHECKOUT_CURRENCY` - ISO 4217 currency for line items (default: usd)
//! - `CHECKOUT_FALLBACK_COUNTRY` - Country used when the shipping country is
//!   unknown (default: US); `none` rejects unknown countries instead
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use atelier_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::payments::DEFAULT_API_BASE;
use crate::services::CountryPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Backend REST API configuration
    pub api: BackendApiConfig,
    /// `PostgreSQL` connection URL (contains password); `None` keeps orders in memory
    pub database_url: Option<SecretString>,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// Checkout behavior
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend REST API configuration.
#[derive(Clone)]
pub struct BackendApiConfig {
    pub base_url: String,
    /// Initial bearer token
    pub token: Option<SecretString>,
}

impl std::fmt::Debug for BackendApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,
    /// Publishable key (safe to expose in browser)
    pub publishable_key: String,
    /// API base URL
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Checkout behavior.
#[derive(Debug, Clone, Default)]
pub struct CheckoutConfig {
    pub currency: CurrencyCode,
    pub country_policy: CountryPolicy,
}

/// Reads one variable; `None` when unset.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = get_env_or_default(env, "STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default(env, "STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_url(env, "STOREFRONT_BASE_URL")?;

        let api = BackendApiConfig {
            base_url: get_url(env, "STOREFRONT_API_BASE_URL")?,
            token: get_optional_env(env, "STOREFRONT_API_TOKEN").map(SecretString::from),
        };
        let database_url = get_database_url(env, "STOREFRONT_DATABASE_URL");
        let stripe = StripeConfig::from_lookup(env)?;
        let checkout = CheckoutConfig::from_lookup(env)?;

        Ok(Self {
            host,
            port,
            base_url,
            api,
            database_url,
            stripe,
            checkout,
            sentry_dsn: get_optional_env(env, "SENTRY_DSN"),
            sentry_environment: get_optional_env(env, "SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret(env, "STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret(env, "STRIPE_WEBHOOK_SECRET")?,
            publishable_key: get_required_env(env, "STRIPE_PUBLISHABLE_KEY")?,
            api_base: get_optional_env(env, "STRIPE_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

impl CheckoutConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let currency = get_env_or_default(env, "CHECKOUT_CURRENCY", "usd")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_CURRENCY".to_string(), e))?;
        let country_policy = get_env_or_default(env, "CHECKOUT_FALLBACK_COUNTRY", "US")
            .parse::<CountryPolicy>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHECKOUT_FALLBACK_COUNTRY".to_string(), e.to_string())
            })?;
        Ok(Self {
            currency,
            country_policy,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable that must be an absolute URL.
fn get_url(env: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(env, key)?;
    Url::parse(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value)
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(env: Lookup<'_>, primary_key: &str) -> Option<SecretString> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(env: Lookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: Lookup<'_>, key: &str, default: &str) -> String {
    get_optional_env(env, key).unwrap_or_else(|| default.to_string())
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
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

    // Real API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key from the Stripe dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(env: Lookup<'_>, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(env, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_core::CountryCode;
    use secrecy::ExposeSecret;

    use super::*;

    const STRIPE_SECRET: &str = "sk_test_51NvR8qLkJ3mZx7TbYw2PcD9hGfA";
    const WEBHOOK_SECRET: &str = "whsec_Q8m2ZrT5vLk9XbN3cJ7pW1yHdF4s";

    fn env_with(overrides: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("STOREFRONT_BASE_URL", "https://atelier.shop"),
            ("STOREFRONT_API_BASE_URL", "https://api.atelier.shop"),
            ("STRIPE_SECRET_KEY", STRIPE_SECRET),
            ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        vars
    }

    fn load(vars: &HashMap<String, String>) -> Result<StorefrontConfig, ConfigError> {
        StorefrontConfig::from_lookup(&|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&env_with(&[])).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(config.database_url.is_none());
        assert!(config.api.token.is_none());
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.checkout.currency, CurrencyCode::Usd);
        assert_eq!(
            config.checkout.country_policy,
            CountryPolicy::Fallback(CountryCode::US)
        );
        assert_eq!(config.stripe.secret_key.expose_secret(), STRIPE_SECRET);
    }

    #[test]
    fn test_overrides() {
        let config = load(&env_with(&[
            ("STOREFRONT_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/atelier"),
            ("STOREFRONT_API_TOKEN", "tok_abc"),
            ("CHECKOUT_CURRENCY", "EUR"),
            ("CHECKOUT_FALLBACK_COUNTRY", "none"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://localhost/atelier"
        );
        assert_eq!(config.api.token.unwrap().expose_secret(), "tok_abc");
        assert_eq!(config.checkout.currency, CurrencyCode::Eur);
        assert_eq!(config.checkout.country_policy, CountryPolicy::Strict);
    }

    #[test]
    fn test_storefront_database_url_wins() {
        let config = load(&env_with(&[
            ("STOREFRONT_DATABASE_URL", "postgres://primary/db"),
            ("DATABASE_URL", "postgres://generic/db"),
        ]))
        .unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://primary/db"
        );
    }

    #[test]
    fn test_missing_required() {
        let mut vars = env_with(&[]);
        vars.remove("STRIPE_WEBHOOK_SECRET");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("STOREFRONT_PORT", "not-a-port"),
            ("STOREFRONT_HOST", "localhost:3000"),
            ("STOREFRONT_BASE_URL", "atelier.shop"),
            ("CHECKOUT_CURRENCY", "doubloons"),
            ("CHECKOUT_FALLBACK_COUNTRY", "Narnia"),
        ] {
            let err = load(&env_with(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == key),
                "{key}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = load(&env_with(&[("STRIPE_SECRET_KEY", "your-stripe-key")])).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(STRIPE_SECRET, "TEST_VAR").is_ok());
        assert!(validate_secret_strength(WEBHOOK_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = load(&env_with(&[])).unwrap();
        let debug_output = format!("{:?}", config.stripe);

        assert!(debug_output.contains("pk_test_123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(STRIPE_SECRET));
        assert!(!debug_output.contains(WEBHOOK_SECRET));
    }
}
