//! [`MerchantBackend`] over the store's AJAX endpoint.
//!
//! Every action is a JSON `POST` to `ajax_url` carrying `action` and
//! `_ajax_nonce`; the response is the usual `{ success, data }` envelope.

use async_trait::async_trait;
use gloo_net::http::Request;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::backend::{
    CreateIntentRequest, MerchantBackend, ProcessCheckoutResponse, UpdateIntentRequest,
    UpdateIntentResponse, UpdateOrderStatusRequest,
};
use crate::config::{CheckoutConfig, Nonces};
use crate::error::CheckoutError;
use crate::form::FormSubmission;
use crate::intent::CreatedIntent;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct CreatedIntentData {
    id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct RedirectData {
    return_url: String,
}

#[derive(Serialize)]
struct LogPaymentErrorRequest<'a> {
    charge_id: &'a str,
}

#[derive(Serialize)]
struct CreateSetupIntentRequest<'a> {
    payment_method_id: &'a str,
}

pub struct AjaxBackend {
    ajax_url: String,
    nonces: Nonces,
}

impl AjaxBackend {
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            ajax_url: config.ajax_url.clone(),
            nonces: config.nonces.clone(),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        action: &str,
        nonce: &str,
        body: impl Serialize,
    ) -> Result<T, CheckoutError> {
        let mut payload = match serde_json::to_value(body)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("action".into(), json!(action));
        payload.insert("_ajax_nonce".into(), json!(nonce));

        tracing::debug!(action, "merchant request");
        let response = Request::post(&self.ajax_url)
            .json(&payload)
            .map_err(net_error)?
            .send()
            .await
            .map_err(net_error)?;
        if !response.ok() {
            return Err(CheckoutError::runtime(format!(
                "{action} failed with HTTP {}",
                response.status()
            )));
        }
        let envelope: Envelope = response.json().await.map_err(net_error)?;
        if !envelope.success {
            return Err(merchant_error(envelope.data));
        }
        Ok(serde_json::from_value(envelope.data)?)
    }
}

#[async_trait(?Send)]
impl MerchantBackend for AjaxBackend {
    async fn create_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<CreatedIntent, CheckoutError> {
        let data: CreatedIntentData = self
            .post("create_payment_intent", &self.nonces.create_intent, request)
            .await?;
        Ok(CreatedIntent::new(data.id, data.client_secret))
    }

    async fn update_intent(
        &self,
        request: &UpdateIntentRequest,
    ) -> Result<UpdateIntentResponse, CheckoutError> {
        let data = self
            .post("update_payment_intent", &self.nonces.update_intent, request)
            .await?;
        Ok(UpdateIntentResponse { data })
    }

    async fn process_checkout(
        &self,
        intent_id: &str,
        submission: &FormSubmission,
        fingerprint: &str,
    ) -> Result<ProcessCheckoutResponse, CheckoutError> {
        let mut fields: Map<String, Value> = submission
            .all_fields()
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        fields.insert("intent_id".into(), json!(intent_id));
        fields.insert("fingerprint".into(), json!(fingerprint));
        self.post("process_checkout", "", Value::Object(fields)).await
    }

    async fn log_payment_error(&self, charge_ref: &str) -> Result<bool, CheckoutError> {
        self.post(
            "log_payment_error",
            &self.nonces.log_payment_error,
            LogPaymentErrorRequest {
                charge_id: charge_ref,
            },
        )
        .await
    }

    async fn update_order_status(
        &self,
        request: &UpdateOrderStatusRequest,
    ) -> Result<String, CheckoutError> {
        let data: RedirectData = self
            .post("update_order_status", &request.nonce, request)
            .await?;
        Ok(data.return_url)
    }

    async fn create_setup_intent(
        &self,
        payment_method_id: &str,
    ) -> Result<CreatedIntent, CheckoutError> {
        let data: CreatedIntentData = self
            .post(
                "create_setup_intent",
                &self.nonces.create_setup_intent,
                CreateSetupIntentRequest { payment_method_id },
            )
            .await?;
        Ok(CreatedIntent::new(data.id, data.client_secret))
    }
}

/// Error envelopes carry `data.error.message`; anything else is generic.
fn merchant_error(data: Value) -> CheckoutError {
    match data
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
    {
        Some(message) => CheckoutError::Merchant(message.to_string()),
        None => CheckoutError::runtime("merchant request failed"),
    }
}

fn net_error(err: gloo_net::Error) -> CheckoutError {
    CheckoutError::runtime(err.to_string())
}
