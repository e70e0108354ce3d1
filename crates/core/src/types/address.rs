//! Postal addresses for shipping and billing.

use serde::{Deserialize, Serialize};

/// A complete postal address as collected at checkout.
///
/// `country` keeps whatever the shopper entered; resolve it with
/// [`CountryCode::resolve`](crate::CountryCode::resolve) when a code is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A partially filled address, as submitted for validation while the
/// shopper is still typing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl From<Address> for AddressInput {
    fn from(address: Address) -> Self {
        Self {
            first_name: Some(address.first_name),
            last_name: Some(address.last_name),
            line1: Some(address.line1),
            line2: address.line2,
            city: Some(address.city),
            state: address.state,
            postal_code: Some(address.postal_code),
            country: Some(address.country),
            phone: address.phone,
        }
    }
}

/// Outcome of validating an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidation {
    pub valid: bool,
    /// Corrected candidates, when the validator has any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Address>>,
}

impl AddressValidation {
    /// A validation result with no complaints and no suggestions.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            valid: true,
            suggestions: None,
        }
    }
}
