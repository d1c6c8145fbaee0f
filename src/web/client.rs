//! Browser implementation of [`ProcessorClient`] on top of the SDK bindings.
//!
//! Every SDK promise either rejects with a JS exception or resolves with an
//! object carrying an `error` key; both are turned into typed errors here so
//! the state machines only ever see [`ProcessorError`] or [`CheckoutError`].

use async_trait::async_trait;
use gloo_utils::format::JsValueSerdeExt;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Error as JsError, Object, Promise, Reflect};
use yew::Callback;

use super::bindings::{new_processor, JsElements, JsPaymentElement, JsProcessor};
use crate::blocking::FormTarget;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, ProcessorError};
use crate::intent::{IntentKind, IntentStatus, PaymentMethod};
use crate::processor::{
    ConfirmParams, ElementsOptions, NextActionOutcome, PaymentElementOptions, PaymentMethodParams,
    ProcessorClient, WidgetEvent,
};

#[derive(Serialize)]
struct ProcessorOptions<'a> {
    #[serde(rename = "stripeAccount", skip_serializing_if = "Option::is_none")]
    account: Option<&'a str>,
    locale: &'a str,
}

/// SDK client for one publishable key and connected account.
#[derive(Clone, Debug)]
pub struct WebProcessor {
    processor: JsProcessor,
}

impl WebProcessor {
    /// Requires the SDK script to be loaded, see `interop::use_processor_sdk`.
    pub fn new(config: &CheckoutConfig) -> Result<Self, CheckoutError> {
        let options = ProcessorOptions {
            account: config.account_id.as_deref(),
            locale: &config.locale,
        };
        let options = to_value(&options).map_err(|err| CheckoutError::runtime(err.to_string()))?;
        let processor = new_processor(&config.publishable_key, options)
            .map_err(|err| CheckoutError::runtime(js_message(&err)))?;
        Ok(Self { processor })
    }
}

#[async_trait(?Send)]
impl ProcessorClient for WebProcessor {
    type Elements = JsElements;
    type Widget = JsPaymentElement;

    fn elements(&self, options: &ElementsOptions) -> Result<JsElements, ProcessorError> {
        let options = to_value(options).map_err(serde_error_to_processor_error)?;
        self.processor.elements(options).map_err(js_to_processor_error)
    }

    fn create_payment_element(
        &self,
        elements: &JsElements,
        options: &PaymentElementOptions,
        events: Callback<WidgetEvent>,
    ) -> Result<JsPaymentElement, ProcessorError> {
        let options = to_value(options).map_err(serde_error_to_processor_error)?;
        let element = elements
            .create_element("payment", options)
            .map_err(js_to_processor_error)?;

        let on_change = {
            let events = events.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let complete = get(&event, "complete")
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                let country = get(&event, "value")
                    .and_then(|value| get(&value, "country"))
                    .and_then(|value| value.as_string());
                events.emit(WidgetEvent::Change { complete, country });
            }) as Box<dyn FnMut(JsValue)>)
        };
        element.on("change", on_change.as_ref().unchecked_ref());
        on_change.forget();

        let on_load_error = Closure::wrap(Box::new(move |event: JsValue| {
            let message = get(&event, "error")
                .and_then(|error| get(&error, "message"))
                .and_then(|message| message.as_string())
                .unwrap_or_default();
            events.emit(WidgetEvent::LoadError { message });
        }) as Box<dyn FnMut(JsValue)>);
        element.on("loaderror", on_load_error.as_ref().unchecked_ref());
        on_load_error.forget();

        Ok(element)
    }

    fn mount(&self, widget: &JsPaymentElement, target: &FormTarget) -> Result<(), ProcessorError> {
        widget.mount(target.selector()).map_err(js_to_processor_error)
    }

    async fn submit_elements(&self, elements: &JsElements) -> Result<(), ProcessorError> {
        let promise = elements.submit().map_err(js_to_processor_error)?;
        let result = await_promise(promise).await?;
        result_error(&result)
    }

    async fn create_payment_method(
        &self,
        elements: &JsElements,
        params: &PaymentMethodParams,
    ) -> Result<PaymentMethod, ProcessorError> {
        let options = Object::new();
        set(&options, "elements", elements.as_ref())?;
        set(&options, "params", &to_value(params).map_err(serde_error_to_processor_error)?)?;

        let promise = self
            .processor
            .create_payment_method(options.into())
            .map_err(js_to_processor_error)?;
        let result = await_promise(promise).await?;
        result_error(&result)?;
        let payment_method = get(&result, "paymentMethod")
            .ok_or_else(|| ProcessorError::new("The processor returned no payment method."))?;
        from_value(payment_method).map_err(serde_error_to_processor_error)
    }

    async fn confirm_payment(
        &self,
        elements: &JsElements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError> {
        let options = confirm_options(elements, params)?;
        let promise = self
            .processor
            .confirm_payment(options.into())
            .map_err(js_to_processor_error)?;
        let result = await_promise(promise).await?;
        result_error(&result)
    }

    async fn confirm_setup(
        &self,
        elements: &JsElements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError> {
        let options = confirm_options(elements, params)?;
        let promise = self
            .processor
            .confirm_setup(options.into())
            .map_err(js_to_processor_error)?;
        let result = await_promise(promise).await?;
        result_error(&result)
    }

    async fn handle_next_action(
        &self,
        kind: IntentKind,
        client_secret: &str,
    ) -> Result<NextActionOutcome, CheckoutError> {
        let options = Object::new();
        set(&options, "clientSecret", &JsValue::from_str(client_secret))?;
        let promise = self
            .processor
            .handle_next_action(options.into())
            .map_err(js_to_checkout_error)?;
        let result = JsFuture::from(promise).await.map_err(js_to_checkout_error)?;

        let intent_key = match kind {
            IntentKind::Payment => "paymentIntent",
            IntentKind::Setup => "setupIntent",
        };
        let error = get(&result, "error");
        // On failure the intent hangs off the error object in snake case.
        let intent = get(&result, intent_key).or_else(|| {
            let key = match kind {
                IntentKind::Payment => "payment_intent",
                IntentKind::Setup => "setup_intent",
            };
            error.as_ref().and_then(|error| get(error, key))
        });
        Ok(NextActionOutcome {
            intent_id: intent
                .as_ref()
                .and_then(|intent| get(intent, "id"))
                .and_then(|id| id.as_string()),
            status: intent
                .and_then(|intent| get(&intent, "status"))
                .and_then(|status| from_value::<IntentStatus>(status).ok()),
            error: error.map(js_to_processor_error),
        })
    }

    async fn confirm_setup_intent(
        &self,
        client_secret: &str,
        payment_method_id: &str,
    ) -> Result<String, ProcessorError> {
        let confirm_params = Object::new();
        set(&confirm_params, "payment_method", &JsValue::from_str(payment_method_id))?;
        let options = Object::new();
        set(&options, "clientSecret", &JsValue::from_str(client_secret))?;
        set(&options, "confirmParams", &confirm_params)?;
        set(&options, "redirect", &JsValue::from_str("if_required"))?;

        let promise = self
            .processor
            .confirm_setup(options.into())
            .map_err(js_to_processor_error)?;
        let result = await_promise(promise).await?;
        result_error(&result)?;
        get(&result, "setupIntent")
            .and_then(|intent| get(&intent, "id"))
            .and_then(|id| id.as_string())
            .ok_or_else(|| ProcessorError::new("The processor returned no setup intent."))
    }
}

fn confirm_options(elements: &JsElements, params: &ConfirmParams) -> Result<Object, ProcessorError> {
    let options = Object::new();
    set(&options, "elements", elements.as_ref())?;
    set(
        &options,
        "confirmParams",
        &to_value(params).map_err(serde_error_to_processor_error)?,
    )?;
    Ok(options)
}

async fn await_promise(promise: Promise) -> Result<JsValue, ProcessorError> {
    JsFuture::from(promise).await.map_err(js_to_processor_error)
}

/// `Err` when a resolved SDK result carries an `error` object.
fn result_error(result: &JsValue) -> Result<(), ProcessorError> {
    match get(result, "error") {
        Some(error) => Err(js_to_processor_error(error)),
        None => Ok(()),
    }
}

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), ProcessorError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(js_to_processor_error)
}

pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<JsError>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

/// Convert any caught `JsValue` into a `ProcessorError` with best effort.
pub(crate) fn js_to_processor_error(value: JsValue) -> ProcessorError {
    value
        .into_serde::<ProcessorError>()
        .ok()
        .filter(|err| !err.message.is_empty())
        .unwrap_or_else(|| ProcessorError::new(js_message(&value)))
}

/// JS exceptions stay generic; SDK error objects stay structured.
fn js_to_checkout_error(value: JsValue) -> CheckoutError {
    if value.is_instance_of::<JsError>() {
        return CheckoutError::runtime(js_message(&value));
    }
    match value.into_serde::<ProcessorError>() {
        Ok(err) if !err.message.is_empty() => CheckoutError::Processor(err),
        _ => CheckoutError::runtime(js_message(&value)),
    }
}

/// Convert a `serde_wasm_bindgen::Error` into `ProcessorError`.
fn serde_error_to_processor_error(err: serde_wasm_bindgen::Error) -> ProcessorError {
    ProcessorError::new(err.to_string())
}
