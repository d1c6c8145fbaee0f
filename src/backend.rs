//! Boundary with the merchant backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::form::FormSubmission;
use crate::intent::{CreatedIntent, PaymentMethodType};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CreateIntentRequest {
    pub fingerprint: String,
    pub payment_method_type: PaymentMethodType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpdateIntentRequest {
    pub intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub save_payment_method: bool,
    pub payment_method_type: PaymentMethodType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct MerchantErrorBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct UpdateIntentData {
    #[serde(default)]
    pub error: Option<MerchantErrorBody>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct UpdateIntentResponse {
    #[serde(default)]
    pub data: UpdateIntentData,
}

impl UpdateIntentResponse {
    /// Turns an error carried in the response body into a [`CheckoutError`].
    pub fn into_result(self) -> Result<(), CheckoutError> {
        match self.data.error {
            Some(error) => Err(CheckoutError::Merchant(error.message)),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ProcessCheckoutResponse {
    pub redirect_url: String,
    #[serde(default)]
    pub payment_needed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpdateOrderStatusRequest {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    pub nonce: String,
}

#[async_trait(?Send)]
pub trait MerchantBackend {
    async fn create_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<CreatedIntent, CheckoutError>;

    async fn update_intent(
        &self,
        request: &UpdateIntentRequest,
    ) -> Result<UpdateIntentResponse, CheckoutError>;

    async fn process_checkout(
        &self,
        intent_id: &str,
        submission: &FormSubmission,
        fingerprint: &str,
    ) -> Result<ProcessCheckoutResponse, CheckoutError>;

    /// Records a failed charge on the order.
    async fn log_payment_error(&self, charge_ref: &str) -> Result<bool, CheckoutError>;

    /// Tells the merchant an authentication challenge finished and returns the
    /// URL to send the shopper to.
    async fn update_order_status(
        &self,
        request: &UpdateOrderStatusRequest,
    ) -> Result<String, CheckoutError>;

    async fn create_setup_intent(
        &self,
        payment_method_id: &str,
    ) -> Result<CreatedIntent, CheckoutError>;
}
