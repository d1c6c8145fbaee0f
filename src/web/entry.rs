//! Wires the DOM to a [`CheckoutController`].
//!
//! The host page calls `startCheckout(config)` once the processor SDK and the
//! fingerprinting agent are loaded. Listeners for `submit` and `hashchange`
//! are installed on the document and live as long as the page.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Event, HashChangeEvent, HtmlFormElement, Window};

use super::{
    element_target, AjaxBackend, DomCheckoutPage, DomUiBlocker, FingerprintAgent,
    SessionIntentStore, WebProcessor,
};
use crate::blocking::FormTarget;
use crate::config::CheckoutConfig;
use crate::context::Collaborators;
use crate::controller::{CheckoutCommand, CheckoutController, Dispatch};
use crate::error::CheckoutError;
use crate::intent::PaymentMethodType;
use crate::session_cache::CartHash;

/// Attribute on the gateway radio naming the payment-method type it selects.
const PAYMENT_METHOD_TYPE_ATTRIBUTE: &str = "data-payment-method-type";

pub type WebController = CheckoutController<WebProcessor>;

/// Handle returned to JS so the host page can notify cart changes and mount
/// elements rendered after start-up.
#[wasm_bindgen]
pub struct CheckoutHandle {
    controller: Rc<WebController>,
}

#[wasm_bindgen]
impl CheckoutHandle {
    /// Mounts (or remounts) the element of `payment_method_type` into its container.
    #[wasm_bindgen(js_name = mountElement)]
    pub fn mount_element(&self, payment_method_type: &str) {
        let payment_method_type = PaymentMethodType::from(payment_method_type);
        run(
            &self.controller,
            CheckoutCommand::MountElement {
                target: element_target(&payment_method_type),
                payment_method_type,
            },
        );
    }

    /// Called when the cart contents change.
    #[wasm_bindgen(js_name = cartChanged)]
    pub fn cart_changed(&self, cart_hash: &str) {
        run(
            &self.controller,
            CheckoutCommand::CartChanged(CartHash::new(cart_hash)),
        );
    }

    /// Called with the new cart when the store exposes no cart hash.
    #[wasm_bindgen(js_name = cartContentsChanged)]
    pub fn cart_contents_changed(&self, contents: JsValue) -> Result<(), JsValue> {
        let contents: serde_json::Value = serde_wasm_bindgen::from_value(contents)?;
        run(
            &self.controller,
            CheckoutCommand::CartChanged(CartHash::of_contents(&contents)),
        );
        Ok(())
    }
}

impl CheckoutHandle {
    pub fn controller(&self) -> &Rc<WebController> {
        &self.controller
    }
}

#[wasm_bindgen(js_name = startCheckout)]
pub fn start_checkout(config: JsValue) -> Result<CheckoutHandle, JsValue> {
    let config: CheckoutConfig = serde_wasm_bindgen::from_value(config)?;
    config.validate().map_err(to_js)?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let controller = Rc::new(build_controller(config, &window, &document).map_err(to_js)?);
    install_listeners(&window, &document, &controller)?;

    run(&controller, CheckoutCommand::PageLoaded);
    let types: Vec<PaymentMethodType> = controller
        .context()
        .config
        .payment_method_types()
        .cloned()
        .collect();
    for payment_method_type in types {
        let target = element_target(&payment_method_type);
        if document.query_selector(target.selector())?.is_some() {
            run(
                &controller,
                CheckoutCommand::MountElement {
                    payment_method_type,
                    target,
                },
            );
        }
    }

    tracing::info!("checkout started");
    Ok(CheckoutHandle { controller })
}

/// Builds a controller over the DOM collaborators; also used by the Yew
/// components.
pub fn build_controller(
    config: CheckoutConfig,
    window: &Window,
    document: &Document,
) -> Result<WebController, CheckoutError> {
    let collaborators = Collaborators {
        processor: Rc::new(WebProcessor::new(&config)?),
        backend: Rc::new(AjaxBackend::new(&config)),
        page: Rc::new(DomCheckoutPage::new(window.clone(), document.clone(), &config)),
        blocker: Rc::new(DomUiBlocker::new(document.clone())),
        fingerprint: Rc::new(FingerprintAgent),
        intent_store: SessionIntentStore::new(window),
    };
    Ok(CheckoutController::new(config, collaborators))
}

/// Spawns whatever the controller hands back; the default action is the
/// caller's business.
pub fn run(controller: &WebController, command: CheckoutCommand) -> Dispatch {
    match controller.dispatch(command) {
        Dispatch::Spawn(task) => {
            spawn_local(task);
            Dispatch::Handled
        }
        other => other,
    }
}

/// `hashchange` on the window and `submit` on the document.
pub fn install_listeners(
    window: &Window,
    document: &Document,
    controller: &Rc<WebController>,
) -> Result<(), JsValue> {
    install_hash_listener(window, controller)?;
    install_submit_listener(document, controller)
}

fn install_hash_listener(window: &Window, controller: &Rc<WebController>) -> Result<(), JsValue> {
    let controller = Rc::clone(controller);
    let on_hash_change = Closure::wrap(Box::new(move |event: HashChangeEvent| {
        run(&controller, CheckoutCommand::HashChanged { url: event.new_url() });
    }) as Box<dyn FnMut(HashChangeEvent)>);
    window.add_event_listener_with_callback("hashchange", on_hash_change.as_ref().unchecked_ref())?;
    on_hash_change.forget();
    Ok(())
}

/// Listens in the capture phase so the submit is seen before the store's own
/// handlers.
fn install_submit_listener(document: &Document, controller: &Rc<WebController>) -> Result<(), JsValue> {
    let form_selector = controller.context().config.form_selector().to_string();
    let controller = Rc::clone(controller);
    let on_submit = Closure::wrap(Box::new(move |event: Event| {
        let form = match event
            .target()
            .and_then(|target| target.dyn_into::<HtmlFormElement>().ok())
        {
            Some(form) => form,
            None => return,
        };
        if !form.matches(&form_selector).unwrap_or(false) {
            return;
        }
        let payment_method_type = match selected_payment_method_type(&form) {
            Some(payment_method_type) => payment_method_type,
            None => return,
        };
        let command = CheckoutCommand::Submit {
            form: FormTarget::new(form_selector.clone()),
            payment_method_type,
        };
        match run(&controller, command) {
            Dispatch::Native => {}
            Dispatch::Handled | Dispatch::Spawn(_) => {
                event.prevent_default();
                event.stop_immediate_propagation();
            }
        }
    }) as Box<dyn FnMut(Event)>);
    document.add_event_listener_with_callback_and_bool(
        "submit",
        on_submit.as_ref().unchecked_ref(),
        true,
    )?;
    on_submit.forget();
    Ok(())
}

fn selected_payment_method_type(form: &HtmlFormElement) -> Option<PaymentMethodType> {
    form.query_selector("input[name=\"payment_method\"]:checked")
        .ok()
        .flatten()?
        .get_attribute(PAYMENT_METHOD_TYPE_ATTRIBUTE)
        .filter(|value| !value.is_empty())
        .map(PaymentMethodType::new)
}

fn to_js(err: CheckoutError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
