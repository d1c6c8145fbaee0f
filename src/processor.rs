//! Boundary with the processor's client SDK.
//!
//! [`ProcessorClient`] is the seam the state machines drive; the browser
//! implementation lives in `web::client` and wraps the wasm-bindgen handles.
//! The option structs serialize to the exact objects the SDK expects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use yew::Callback;

use crate::blocking::FormTarget;
use crate::error::{CheckoutError, ProcessorError};
use crate::form::{BillingDetails, ShippingDetails};
use crate::intent::{IntentKind, IntentStatus, PaymentMethod};

/// Configuration for `processor.elements({ clientSecret, appearance, locale })`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ElementsOptions {
    /// Client secret of the intent the widget collects details for.
    #[serde(rename = "clientSecret")]
    pub client_secret: String,

    #[serde(rename = "appearance", skip_serializing_if = "Option::is_none")]
    pub appearance: Option<serde_json::Value>,

    pub locale: String,
}

/// Which fields the widget itself collects.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ElementFields {
    /// `"never"`: billing details come from the checkout form.
    #[serde(rename = "billingDetails")]
    pub billing_details: String,
}

impl Default for ElementFields {
    fn default() -> Self {
        Self {
            billing_details: "never".to_string(),
        }
    }
}

/// Options for `elements.create("payment", ...)`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PaymentElementOptions {
    /// Layout mode: `"tabs"` or `"accordion"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    pub fields: ElementFields,

    /// Restricts the widget to one payment-method type.
    #[serde(rename = "paymentMethodTypes", skip_serializing_if = "Vec::is_empty", default)]
    pub payment_method_types: Vec<String>,
}

/// `params` of `createPaymentMethod({ elements, params })`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentMethodParams {
    pub billing_details: BillingDetails,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentMethodData {
    pub billing_details: BillingDetails,
}

/// `confirmParams` of `confirmPayment` / `confirmSetup`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConfirmParams {
    /// Where the processor sends the shopper after redirect-based authentication.
    pub return_url: String,

    pub payment_method_data: PaymentMethodData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingDetails>,
}

/// Typed events emitted by a mounted widget.
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetEvent {
    /// The shopper edited the widget.
    Change {
        complete: bool,
        country: Option<String>,
    },
    /// The widget failed to load.
    LoadError { message: String },
}

/// Result of driving an intent through its pending next action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NextActionOutcome {
    /// Intent the processor reported on, also present on failure when known.
    pub intent_id: Option<String>,
    pub status: Option<IntentStatus>,
    pub error: Option<ProcessorError>,
}

#[async_trait(?Send)]
pub trait ProcessorClient {
    /// Elements context handle.
    type Elements: Clone + 'static;
    /// Mounted payment element handle.
    type Widget: Clone + 'static;

    fn elements(&self, options: &ElementsOptions) -> Result<Self::Elements, ProcessorError>;

    /// Creates a payment element whose `change` and `loaderror` events are
    /// forwarded to `events`.
    fn create_payment_element(
        &self,
        elements: &Self::Elements,
        options: &PaymentElementOptions,
        events: Callback<WidgetEvent>,
    ) -> Result<Self::Widget, ProcessorError>;

    fn mount(&self, widget: &Self::Widget, target: &FormTarget) -> Result<(), ProcessorError>;

    /// `elements.submit()`: validates the widget input.
    async fn submit_elements(&self, elements: &Self::Elements) -> Result<(), ProcessorError>;

    async fn create_payment_method(
        &self,
        elements: &Self::Elements,
        params: &PaymentMethodParams,
    ) -> Result<PaymentMethod, ProcessorError>;

    /// On success the SDK navigates away to `return_url`.
    async fn confirm_payment(
        &self,
        elements: &Self::Elements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError>;

    async fn confirm_setup(
        &self,
        elements: &Self::Elements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError>;

    /// Runs the pending authentication challenge of an already created intent.
    async fn handle_next_action(
        &self,
        kind: IntentKind,
        client_secret: &str,
    ) -> Result<NextActionOutcome, CheckoutError>;

    /// Confirms a setup intent against an existing payment method, returning
    /// the setup intent id.
    async fn confirm_setup_intent(
        &self,
        client_secret: &str,
        payment_method_id: &str,
    ) -> Result<String, ProcessorError>;
}
