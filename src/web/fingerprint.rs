//! Device fingerprint from the FingerprintJS agent loaded on the page.

use async_trait::async_trait;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Function, Promise, Reflect};

use super::client::js_message;
use crate::error::CheckoutError;
use crate::fraud::FingerprintSource;

/// Calls `FingerprintJS.load()` then `agent.get()` and returns `visitorId`.
#[derive(Default)]
pub struct FingerprintAgent;

impl FingerprintAgent {
    async fn visitor_id(&self) -> Result<String, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let library = Reflect::get(&window, &JsValue::from_str("FingerprintJS"))?;
        let agent = call_async(&library, "load").await?;
        let result = call_async(&agent, "get").await?;
        Reflect::get(&result, &JsValue::from_str("visitorId"))?
            .as_string()
            .ok_or_else(|| JsValue::from_str("visitorId missing"))
    }
}

/// `target[method]()` awaited as a promise.
async fn call_async(target: &JsValue, method: &str) -> Result<JsValue, JsValue> {
    let function: Function = Reflect::get(target, &JsValue::from_str(method))?.dyn_into()?;
    let promise: Promise = function.call0(target)?.dyn_into()?;
    JsFuture::from(promise).await
}

#[async_trait(?Send)]
impl FingerprintSource for FingerprintAgent {
    async fn compute(&self) -> Result<String, CheckoutError> {
        self.visitor_id()
            .await
            .map_err(|err| CheckoutError::Fingerprint(js_message(&err)))
    }
}
