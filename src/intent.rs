//! Intents and payment-method types as seen by the checkout page.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment or setup intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    /// Still waiting on the shopper, e.g. an abandoned 3DS challenge.
    pub fn requires_action(self) -> bool {
        self == Self::RequiresAction
    }
}

/// Whether an intent charges now or only sets up a future payment method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Payment,
    Setup,
}

impl IntentKind {
    /// Setup intent secrets are prefixed with `seti_`.
    pub fn from_client_secret(client_secret: &str) -> Self {
        if client_secret.starts_with("seti_") {
            Self::Setup
        } else {
            Self::Payment
        }
    }
}

/// `{id, client_secret}` pair returned by the merchant when it creates an intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

impl CreatedIntent {
    pub fn new(id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Processor payment-method type, e.g. `card`, `sepa_debit`, `bancontact`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodType(String);

impl PaymentMethodType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn card() -> Self {
        Self::new("card")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentMethodType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Payment-method object created by the processor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type", default)]
    pub method_type: Option<String>,
}
