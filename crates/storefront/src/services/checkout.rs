//! Checkout: address validation, order creation, and payment sessions.
//!
//! The synchronous half of a purchase. The shopper's cart becomes an order on
//! the backend API and a hosted checkout session at the payment processor;
//! the asynchronous half (payment confirmation) is handled by
//! [`OrderReconciler`](super::reconcile::OrderReconciler).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::{
    AddressInput, AddressValidation, CheckoutData, CheckoutSessionId, CountryCode, CurrencyCode,
    MoneyError, OrderId, UnknownCountry, to_minor_units,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::api::{ApiClient, ApiError};
use crate::payments::{
    CheckoutSession, CheckoutSessionRequest, LineItem, PaymentError, PaymentProcessor,
};

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The backend API could not create the order.
    #[error("failed to create order")]
    OrderCreation(#[source] ApiError),

    /// The payment processor could not open a session.
    #[error("failed to create checkout session")]
    Payment(#[source] PaymentError),

    /// A payment session was requested without an order to pay for.
    #[error("order id is required to create a checkout session")]
    MissingOrderId,

    #[error("cart is empty")]
    EmptyCart,

    /// The shipping country is not known and the policy is strict.
    #[error("cannot ship to {0}")]
    UnknownCountry(#[from] UnknownCountry),

    #[error("invalid price: {0}")]
    Money(#[from] MoneyError),
}

/// Checks addresses while the shopper types them.
#[async_trait]
pub trait AddressValidator: Send + Sync {
    async fn validate(&self, address: &AddressInput) -> AddressValidation;
}

/// Reports every address as valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

#[async_trait]
impl AddressValidator for AcceptAllValidator {
    async fn validate(&self, _address: &AddressInput) -> AddressValidation {
        AddressValidation::valid()
    }
}

/// What to do with a shipping country missing from the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryPolicy {
    /// Ship to this country instead, with a warning.
    Fallback(CountryCode),
    /// Fail the checkout.
    Strict,
}

impl Default for CountryPolicy {
    fn default() -> Self {
        Self::Fallback(CountryCode::US)
    }
}

impl CountryPolicy {
    /// Resolve a shipping country under this policy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCountry` under `Strict` when `input` is not in the table.
    pub fn resolve(self, input: &str) -> Result<CountryCode, UnknownCountry> {
        match (CountryCode::resolve(input), self) {
            (Ok(code), _) => Ok(code),
            (Err(_), Self::Fallback(fallback)) => {
                tracing::warn!(
                    country = %input,
                    fallback = %fallback,
                    "Unknown shipping country, using fallback"
                );
                Ok(fallback)
            }
            (Err(e), Self::Strict) => Err(e),
        }
    }
}

impl std::str::FromStr for CountryPolicy {
    type Err = UnknownCountry;

    /// `none` or `strict` selects [`CountryPolicy::Strict`]; anything else
    /// must name a known country.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "strict" => Ok(Self::Strict),
            _ => CountryCode::resolve(s).map(Self::Fallback),
        }
    }
}

/// Static checkout settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public storefront URL the processor redirects back to.
    pub app_base_url: String,
    pub currency: CurrencyCode,
    pub country_policy: CountryPolicy,
}

/// The backend's reply to order creation. Only the identity is read; the
/// rest of the backend's order shape is its own business.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedOrder {
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
}

/// Result of [`CheckoutService::begin_checkout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BegunCheckout {
    pub order_id: OrderId,
    pub session_id: CheckoutSessionId,
    pub url: String,
}

/// Checkout orchestration.
#[derive(Clone)]
pub struct CheckoutService {
    api: ApiClient,
    processor: Arc<dyn PaymentProcessor>,
    validator: Arc<dyn AddressValidator>,
    settings: CheckoutSettings,
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("api", &self.api)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Percent-encode a value for use inside a query string.
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        api: ApiClient,
        processor: Arc<dyn PaymentProcessor>,
        validator: Arc<dyn AddressValidator>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            api,
            processor,
            validator,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Validate a (possibly partial) address.
    pub async fn validate_address(&self, address: &AddressInput) -> AddressValidation {
        self.validator.validate(address).await
    }

    /// Create the order on the backend API from the full checkout payload.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderCreation` carrying the API error.
    #[instrument(skip(self, data), fields(items = data.items.len()))]
    pub async fn create_order(&self, data: &CheckoutData) -> Result<CreatedOrder, CheckoutError> {
        let order: CreatedOrder = self
            .api
            .post("/orders", data)
            .await
            .map_err(CheckoutError::OrderCreation)?;
        tracing::info!(
            order_id = %order.id,
            order_number = order.order_number.as_deref().unwrap_or_default(),
            "Order created"
        );
        Ok(order)
    }

    /// Build the processor request for an existing order.
    ///
    /// # Errors
    ///
    /// See [`create_checkout_session`](Self::create_checkout_session).
    pub fn session_request(
        &self,
        data: &CheckoutData,
    ) -> Result<CheckoutSessionRequest, CheckoutError> {
        let order_id = data.order_id.as_ref().ok_or(CheckoutError::MissingOrderId)?;
        if data.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let line_items = data
            .items
            .iter()
            .map(|item| {
                Ok(LineItem {
                    name: item.name.clone(),
                    image: item.image.clone(),
                    currency: self.settings.currency,
                    unit_amount: to_minor_units(item.price)?,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, MoneyError>>()?;

        let country = self
            .settings
            .country_policy
            .resolve(&data.shipping_address.country)?;

        let base = self.settings.app_base_url.trim_end_matches('/');
        let id = encode(order_id.as_str());

        Ok(CheckoutSessionRequest {
            line_items,
            success_url: format!(
                "{base}/checkout/success?order_id={id}&session_id={{CHECKOUT_SESSION_ID}}"
            ),
            cancel_url: format!("{base}/checkout?order_id={id}&canceled=true"),
            allowed_countries: vec![country],
            customer_email: data.customer_email.clone(),
            client_reference_id: order_id.to_string(),
            metadata: BTreeMap::from([("order_id".to_string(), order_id.to_string())]),
            idempotency_key: format!("checkout-{order_id}"),
        })
    }

    /// Open a hosted checkout session for an existing order.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::MissingOrderId` if `data.order_id` is `None`
    /// - `CheckoutError::EmptyCart` if there are no items
    /// - `CheckoutError::UnknownCountry` under a strict country policy
    /// - `CheckoutError::Payment` if the processor fails
    #[instrument(skip(self, data), fields(order_id = ?data.order_id, items = data.items.len()))]
    pub async fn create_checkout_session(
        &self,
        data: &CheckoutData,
    ) -> Result<CheckoutSession, CheckoutError> {
        let request = self.session_request(data)?;
        self.processor
            .create_checkout_session(&request)
            .await
            .map_err(CheckoutError::Payment)
    }

    /// Create the order if needed, then open its checkout session.
    ///
    /// # Errors
    ///
    /// Any error from [`create_order`](Self::create_order) or
    /// [`create_checkout_session`](Self::create_checkout_session).
    #[instrument(skip(self, data), fields(items = data.items.len()))]
    pub async fn begin_checkout(&self, data: CheckoutData) -> Result<BegunCheckout, CheckoutError> {
        if data.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let data = match data.order_id {
            Some(_) => data,
            None => {
                let order = self.create_order(&data).await?;
                CheckoutData {
                    order_id: Some(order.id),
                    ..data
                }
            }
        };

        let session = self.create_checkout_session(&data).await?;
        let order_id = data.order_id.ok_or(CheckoutError::MissingOrderId)?;
        Ok(BegunCheckout {
            order_id,
            session_id: session.id,
            url: session.url,
        })
    }
}
