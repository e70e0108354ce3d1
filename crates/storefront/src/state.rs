//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::StorefrontConfig;
use crate::db::OrderRepository;
use crate::payments::{PaymentProcessor, StripeWebhookVerifier};
use crate::services::{
    AcceptAllValidator, AddressValidator, CheckoutService, CheckoutSettings, OrderReconciler,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the order repository and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    orders: Arc<dyn OrderRepository>,
    checkout: CheckoutService,
    reconciler: OrderReconciler,
    webhook_verifier: StripeWebhookVerifier,
}

impl AppState {
    /// Create a new application state with the accept-all address validator.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `orders` - Order repository
    /// * `api` - Backend API client
    /// * `processor` - Payment processor for checkout sessions
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        orders: Arc<dyn OrderRepository>,
        api: ApiClient,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self::with_validator(config, orders, api, processor, Arc::new(AcceptAllValidator))
    }

    /// Create a new application state with a specific address validator.
    #[must_use]
    pub fn with_validator(
        config: StorefrontConfig,
        orders: Arc<dyn OrderRepository>,
        api: ApiClient,
        processor: Arc<dyn PaymentProcessor>,
        validator: Arc<dyn AddressValidator>,
    ) -> Self {
        let checkout = CheckoutService::new(
            api,
            processor,
            validator,
            CheckoutSettings {
                app_base_url: config.base_url.clone(),
                currency: config.checkout.currency,
                country_policy: config.checkout.country_policy,
            },
        );
        let reconciler = OrderReconciler::new(Arc::clone(&orders));
        let webhook_verifier = StripeWebhookVerifier::new(config.stripe.webhook_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                orders,
                checkout,
                reconciler,
                webhook_verifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the order repository.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderRepository {
        self.inner.orders.as_ref()
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get a reference to the webhook reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &OrderReconciler {
        &self.inner.reconciler
    }

    /// Get a reference to the webhook signature verifier.
    #[must_use]
    pub fn webhook_verifier(&self) -> &StripeWebhookVerifier {
        &self.inner.webhook_verifier
    }
}
