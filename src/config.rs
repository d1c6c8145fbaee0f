//! Checkout configuration injected by the host page.
//!
//! The merchant backend renders a JSON object into the page; the browser glue
//! reads it through `serde-wasm-bindgen`, tests parse it with
//! [`CheckoutConfig::from_json`]. Every field except the publishable key and
//! the payment-method table has a default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::intent::PaymentMethodType;
use crate::session_cache::CartHash;

pub const DEFAULT_GENERIC_ERROR_MESSAGE: &str =
    "There was a problem processing the payment. Please check your email inbox and refresh the page to try again.";
pub const DEFAULT_INCOMPLETE_DETAILS_MESSAGE: &str =
    "Your payment information is incomplete or invalid. Please check your details and try again.";

/// How the submit handler turns a filled form into a payment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionFlow {
    /// Create the payment method in the browser, submit the form natively and
    /// let the merchant confirm the intent.
    #[default]
    DeferredIntent,
    /// Hand the form to the merchant first, then confirm the mounted intent
    /// from the browser.
    IntentFirst,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodSettings {
    #[serde(default)]
    pub title: Option<String>,
    /// Whether the type can be saved for later use.
    #[serde(default)]
    pub is_reusable: bool,
}

/// Nonces the merchant backend expects on each AJAX action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Nonces {
    #[serde(default)]
    pub create_intent: String,
    #[serde(default)]
    pub update_intent: String,
    #[serde(default)]
    pub create_setup_intent: String,
    #[serde(default)]
    pub log_payment_error: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub publishable_key: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Processor appearance settings passed through untouched.
    #[serde(default)]
    pub appearance: Option<serde_json::Value>,
    #[serde(default = "default_generic_error_message")]
    pub generic_error_message: String,
    #[serde(default = "default_incomplete_details_message")]
    pub incomplete_details_message: String,
    pub payment_methods: BTreeMap<PaymentMethodType, PaymentMethodSettings>,
    #[serde(default)]
    pub submission_flow: SubmissionFlow,
    #[serde(default)]
    pub is_order_pay_page: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Return URL used when confirming on the order-pay page.
    #[serde(default)]
    pub order_return_url: Option<String>,
    #[serde(default)]
    pub ajax_url: String,
    #[serde(default)]
    pub nonces: Nonces,
    #[serde(default = "default_checkout_form_selector")]
    pub checkout_form_selector: String,
    #[serde(default = "default_order_pay_form_selector")]
    pub order_pay_form_selector: String,
    #[serde(default = "default_payment_section_selector")]
    pub payment_section_selector: String,
    /// Cart hash computed by the store, when it exposes one.
    #[serde(default)]
    pub cart_hash: Option<String>,
    /// Serialized cart, hashed here when the store sends no `cart_hash`.
    #[serde(default)]
    pub cart_contents: Option<serde_json::Value>,
    #[serde(default)]
    pub fraud_prevention_token: Option<String>,
    #[serde(default)]
    pub is_saved_cards_enabled: bool,
}

fn default_locale() -> String {
    "auto".to_string()
}

fn default_generic_error_message() -> String {
    DEFAULT_GENERIC_ERROR_MESSAGE.to_string()
}

fn default_incomplete_details_message() -> String {
    DEFAULT_INCOMPLETE_DETAILS_MESSAGE.to_string()
}

fn default_checkout_form_selector() -> String {
    "form.checkout".to_string()
}

fn default_order_pay_form_selector() -> String {
    "#order_review".to_string()
}

fn default_payment_section_selector() -> String {
    "#payment".to_string()
}

impl CheckoutConfig {
    pub fn from_json(json: &str) -> Result<Self, CheckoutError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CheckoutError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.publishable_key.trim().is_empty() {
            return Err(CheckoutError::Config("publishable_key is empty".into()));
        }
        if self.payment_methods.is_empty() {
            return Err(CheckoutError::Config(
                "no payment method types are enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn payment_method_types(&self) -> impl Iterator<Item = &PaymentMethodType> {
        self.payment_methods.keys()
    }

    pub fn is_reusable(&self, payment_method_type: &PaymentMethodType) -> bool {
        self.payment_methods
            .get(payment_method_type)
            .map(|settings| settings.is_reusable)
            .unwrap_or(false)
    }

    /// Store-provided cart hash, else a digest of the cart contents.
    pub fn initial_cart_hash(&self) -> CartHash {
        match (&self.cart_hash, &self.cart_contents) {
            (Some(hash), _) => CartHash::new(hash.as_str()),
            (None, Some(contents)) => CartHash::of_contents(contents),
            (None, None) => CartHash::default(),
        }
    }

    /// Selector of the form the checkout is submitted from on this page.
    pub fn form_selector(&self) -> &str {
        if self.is_order_pay_page {
            &self.order_pay_form_selector
        } else {
            &self.checkout_form_selector
        }
    }
}
