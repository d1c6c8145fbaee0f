//! Low-level wasm-bindgen bindings to the processor's client SDK.
//!
//! Exposes the raw handles (`JsProcessor`, `JsElements`, `JsPaymentElement`)
//! and their promise-returning methods. The typed wrapper lives in `client.rs`.

use wasm_bindgen::prelude::*;
use web_sys::js_sys::{Function, Promise};

#[wasm_bindgen]
extern "C" {
    //------------------------------------------------------------------------------
    // Core Types
    //------------------------------------------------------------------------------

    /// Raw SDK client handle.
    #[wasm_bindgen(js_name = Stripe, js_namespace = window)]
    #[derive(Debug, Clone)]
    pub type JsProcessor;

    /// Raw Elements factory handle.
    #[wasm_bindgen(js_name = Elements)]
    #[derive(Debug, Clone)]
    pub type JsElements;

    /// Raw payment element handle.
    #[wasm_bindgen(js_name = PaymentElement)]
    #[derive(Debug, Clone)]
    pub type JsPaymentElement;

    //------------------------------------------------------------------------------
    // Constructors
    //------------------------------------------------------------------------------

    /// ```js
    ///   const processor = Stripe("pk_test_...", { stripeAccount, locale });
    /// ```
    #[wasm_bindgen(catch, js_name = Stripe, js_namespace = window)]
    pub fn new_processor(publishable_key: &str, options: JsValue) -> Result<JsProcessor, JsValue>;

    //------------------------------------------------------------------------------
    // Instance Methods
    //------------------------------------------------------------------------------

    /// `processor.elements({ clientSecret, appearance, locale })` → `JsElements`
    #[wasm_bindgen(method, catch, js_name = elements)]
    pub fn elements(this: &JsProcessor, options: JsValue) -> Result<JsElements, JsValue>;

    /// `elements.create("payment", options)` → `JsPaymentElement`
    #[wasm_bindgen(method, catch, js_name = create)]
    pub fn create_element(
        this: &JsElements,
        element_type: &str,
        options: JsValue,
    ) -> Result<JsPaymentElement, JsValue>;

    /// `paymentElement.mount(selector)`
    #[wasm_bindgen(method, catch, js_name = mount)]
    pub fn mount(this: &JsPaymentElement, selector: &str) -> Result<(), JsValue>;

    /// `paymentElement.on(event, handler)`
    #[wasm_bindgen(method, js_name = on)]
    pub fn on(this: &JsPaymentElement, event: &str, handler: &Function);

    /// `elements.submit()` → `Promise<{ error? }>`
    #[wasm_bindgen(method, catch, js_name = submit)]
    pub fn submit(this: &JsElements) -> Result<Promise, JsValue>;

    /// `processor.createPaymentMethod({ elements, params })` → `Promise<{ paymentMethod } | { error }>`
    #[wasm_bindgen(method, catch, js_name = createPaymentMethod)]
    pub fn create_payment_method(this: &JsProcessor, options: JsValue) -> Result<Promise, JsValue>;

    /// `processor.confirmPayment({ elements, confirmParams })`
    #[wasm_bindgen(method, catch, js_name = confirmPayment)]
    pub fn confirm_payment(this: &JsProcessor, options: JsValue) -> Result<Promise, JsValue>;

    /// `processor.confirmSetup({ elements | clientSecret, confirmParams, redirect })`
    #[wasm_bindgen(method, catch, js_name = confirmSetup)]
    pub fn confirm_setup(this: &JsProcessor, options: JsValue) -> Result<Promise, JsValue>;

    /// `processor.handleNextAction({ clientSecret })` → `Promise<{ paymentIntent } | { setupIntent } | { error }>`
    #[wasm_bindgen(method, catch, js_name = handleNextAction)]
    pub fn handle_next_action(this: &JsProcessor, options: JsValue) -> Result<Promise, JsValue>;
}
