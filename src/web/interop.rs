//! Yew hooks that load the third-party scripts the checkout needs at runtime.
//!
//! `use_processor_sdk()` injects a single
//! `<script id="processor-sdk" src="https://js.stripe.com/v3/" defer>` into
//! `<head>` on first use and returns `false` until `window.Stripe` exists.
//!
//! ```rust,ignore
//! #[function_component(Checkout)]
//! fn checkout() -> Html {
//!     let ready = use_processor_sdk();
//!     html! { if ready { <CheckoutFields /> } }
//! }
//! ```

use wasm_bindgen::{prelude::Closure, JsCast, JsValue};
use web_sys::js_sys::Reflect;
use web_sys::{Document, HtmlScriptElement};
use yew::functional::hook;
use yew::prelude::*;

pub const PROCESSOR_SDK_URL: &str = "https://js.stripe.com/v3/";
pub const FINGERPRINT_AGENT_URL: &str = "https://openfpcdn.io/fingerprintjs/v4/iife.min.js";

/// Loads the processor SDK once and tracks readiness.
#[hook]
pub fn use_processor_sdk() -> bool {
    use_script("processor-sdk", PROCESSOR_SDK_URL, "Stripe")
}

/// Loads the fingerprinting agent once and tracks readiness.
#[hook]
pub fn use_fingerprint_agent() -> bool {
    use_script("fingerprint-agent", FINGERPRINT_AGENT_URL, "FingerprintJS")
}

/// Injects `<script id={id} src={src}>` unless present and returns whether
/// `window[global]` is defined.
#[hook]
pub fn use_script(id: &'static str, src: &'static str, global: &'static str) -> bool {
    let loaded = use_state(|| has_global(global));

    {
        let loaded = loaded.clone();
        use_effect(move || {
            if !*loaded {
                if let Err(err) = inject_script(id, src, move || loaded.set(true)) {
                    tracing::error!(script = id, error = ?err, "script injection failed");
                }
            }
            || ()
        });
    }

    *loaded
}

fn has_global(name: &str) -> bool {
    web_sys::window()
        .and_then(|win| Reflect::has(&win, &JsValue::from_str(name)).ok())
        .unwrap_or(false)
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|win| win.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

fn inject_script(
    id: &str,
    src: &str,
    on_load: impl FnOnce() + 'static,
) -> Result<(), JsValue> {
    let document = document()?;
    if document.get_element_by_id(id).is_some() {
        return Ok(());
    }

    let script: HtmlScriptElement = document.create_element("script")?.dyn_into()?;
    script.set_id(id);
    script.set_src(src);
    script.set_defer(true);

    let onload_closure = Closure::once(on_load);
    script.set_onload(Some(onload_closure.as_ref().unchecked_ref()));
    // Lives until the load event fires.
    onload_closure.forget();

    document
        .head()
        .ok_or_else(|| JsValue::from_str("head missing"))?
        .append_child(&script)?;
    Ok(())
}
