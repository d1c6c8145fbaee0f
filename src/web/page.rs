//! DOM implementations of the page-facing seams.

use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{self, Array};
use web_sys::{Document, Element, FormData, HtmlElement, HtmlFormElement, HtmlInputElement, Window};

use crate::blocking::{FormTarget, UiBlocker};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::form::{CheckoutFormSnapshot, FormSubmission};
use crate::intent::PaymentMethodType;
use crate::page::CheckoutPage;
use crate::session_cache::IntentStore;

use super::client::js_message;

const NOTICE_GROUP_CLASS: &str = "woocommerce-NoticeGroup-checkout";
const BLOCKED_CLASS: &str = "processing";
const OVERLAY_CLASS: &str = "blockUI";

pub struct DomCheckoutPage {
    window: Window,
    document: Document,
    payment_section_selector: String,
}

impl DomCheckoutPage {
    pub fn new(window: Window, document: Document, config: &CheckoutConfig) -> Self {
        Self {
            window,
            document,
            payment_section_selector: config.payment_section_selector.clone(),
        }
    }

    fn query(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn form(&self, form: &FormTarget) -> Option<HtmlFormElement> {
        self.query(form.selector())
            .and_then(|element| element.dyn_into::<HtmlFormElement>().ok())
    }

    fn write_hidden_field(&self, form: &HtmlFormElement, name: &str, value: &str) -> Result<(), JsValue> {
        let selector = format!("input[name=\"{name}\"]");
        let input = match form.query_selector(&selector)? {
            Some(existing) => existing.dyn_into::<HtmlInputElement>()?,
            None => {
                let input: HtmlInputElement = self.document.create_element("input")?.dyn_into()?;
                input.set_type("hidden");
                input.set_name(name);
                form.append_child(&input)?;
                input
            }
        };
        input.set_value(value);
        Ok(())
    }

    fn notice(&self, message: &str) -> Result<Element, JsValue> {
        let group = self.document.create_element("div")?;
        group.set_class_name(&format!("woocommerce-NoticeGroup {NOTICE_GROUP_CLASS}"));
        let list = self.document.create_element("ul")?;
        list.set_class_name("woocommerce-error");
        list.set_attribute("role", "alert")?;
        let item = self.document.create_element("li")?;
        item.set_text_content(Some(message));
        list.append_child(&item)?;
        group.append_child(&list)?;
        Ok(group)
    }

    fn try_show_error(&self, form: &FormTarget, message: &str) -> Result<(), JsValue> {
        let form = match self.query(form.selector()) {
            Some(form) => form,
            None => return Ok(()),
        };
        let stale = form.query_selector_all(&format!(".{NOTICE_GROUP_CLASS}"))?;
        for index in 0..stale.length() {
            if let Some(node) = stale.item(index) {
                if let Some(parent) = node.parent_node() {
                    parent.remove_child(&node)?;
                }
            }
        }
        let notice = self.notice(message)?;
        form.prepend_with_node_1(&notice)?;
        notice.scroll_into_view();
        Ok(())
    }

    fn try_render_element_error(&self, element: &FormTarget, message: &str) -> Result<(), JsValue> {
        if let Some(container) = self.query(element.selector()) {
            container.set_inner_html("");
            let error = self.document.create_element("div")?;
            error.set_class_name("upe-element-error woocommerce-error");
            error.set_text_content(Some(message));
            container.append_child(&error)?;
        }
        Ok(())
    }

    fn set_display(&self, selector: &str, visible: bool) {
        let element = self
            .query(selector)
            .and_then(|element| element.dyn_into::<HtmlElement>().ok());
        if let Some(element) = element {
            let value = if visible { "" } else { "none" };
            if let Err(err) = element.style().set_property("display", value) {
                tracing::warn!(selector, error = ?err, "could not toggle visibility");
            }
        }
    }
}

impl CheckoutPage for DomCheckoutPage {
    fn current_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn replace_url(&self, url: &str) {
        let replaced = self
            .window
            .history()
            .and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(url)));
        if let Err(err) = replaced {
            tracing::warn!(error = ?err, "could not replace the current URL");
        }
    }

    fn redirect(&self, url: &str) {
        if let Err(err) = self.window.location().set_href(url) {
            tracing::error!(%url, error = ?err, "redirect failed");
        }
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.query(&format!("[name=\"{name}\"]"))
            .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
    }

    fn capture_form(&self, form: &FormTarget) -> CheckoutFormSnapshot {
        let form_data = self
            .form(form)
            .and_then(|form| FormData::new_with_form(&form).ok());
        let entries = form_data
            .and_then(|data| js_sys::try_iter(data.as_ref()).ok().flatten())
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let pair: Array = entry.ok()?.dyn_into().ok()?;
                Some((pair.get(0).as_string()?, pair.get(1).as_string()?))
            });
        CheckoutFormSnapshot::capture(entries)
    }

    fn submit_native(&self, form: &FormTarget, submission: &FormSubmission) -> Result<(), CheckoutError> {
        let element = self
            .form(form)
            .ok_or_else(|| CheckoutError::runtime(format!("checkout form {form} vanished before submit")))?;
        submission
            .hidden_fields
            .iter()
            .try_for_each(|(name, value)| self.write_hidden_field(&element, name, value))
            .and_then(|_| element.request_submit())
            .map_err(|err| {
                tracing::error!(%form, error = ?err, "native submit failed");
                CheckoutError::runtime(js_message(&err))
            })
    }

    fn show_error(&self, form: &FormTarget, message: &str) {
        if let Err(err) = self.try_show_error(form, message) {
            tracing::error!(%form, error = ?err, "could not render checkout error");
        }
    }

    fn render_element_error(&self, element: &FormTarget, message: &str) {
        if let Err(err) = self.try_render_element_error(element, message) {
            tracing::error!(%element, error = ?err, "could not render element error");
        }
    }

    fn set_save_payment_method_visible(
        &self,
        payment_method_type: &PaymentMethodType,
        visible: bool,
    ) {
        self.set_display(
            &format!(".upe-save-payment-method-{payment_method_type}"),
            visible,
        );
    }

    fn set_payment_section_visible(&self, visible: bool) {
        self.set_display(&self.payment_section_selector, visible);
    }
}

/// Adds the `processing` class and an overlay while a target is blocked.
pub struct DomUiBlocker {
    document: Document,
}

impl DomUiBlocker {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn try_block(&self, target: &FormTarget) -> Result<(), JsValue> {
        let element = match self.document.query_selector(target.selector())? {
            Some(element) => element,
            None => return Ok(()),
        };
        element.class_list().add_1(BLOCKED_CLASS)?;
        if element.query_selector(&format!(".{OVERLAY_CLASS}"))?.is_none() {
            let overlay = self.document.create_element("div")?;
            overlay.set_class_name(&format!("{OVERLAY_CLASS} blockOverlay"));
            element.append_child(&overlay)?;
        }
        Ok(())
    }

    fn try_unblock(&self, target: &FormTarget) -> Result<(), JsValue> {
        let element = match self.document.query_selector(target.selector())? {
            Some(element) => element,
            None => return Ok(()),
        };
        element.class_list().remove_1(BLOCKED_CLASS)?;
        if let Some(overlay) = element.query_selector(&format!(".{OVERLAY_CLASS}"))? {
            overlay.remove();
        }
        Ok(())
    }
}

impl UiBlocker for DomUiBlocker {
    fn block(&self, target: &FormTarget) {
        if let Err(err) = self.try_block(target) {
            tracing::warn!(%target, error = ?err, "block failed");
        }
    }

    fn unblock(&self, target: &FormTarget) {
        if let Err(err) = self.try_unblock(target) {
            tracing::warn!(%target, error = ?err, "unblock failed");
        }
    }
}

/// [`IntentStore`] backed by `window.sessionStorage`. Storage errors, such as
/// a full quota or disabled storage, degrade to a cache miss.
pub struct SessionIntentStore {
    storage: Option<web_sys::Storage>,
}

impl SessionIntentStore {
    pub fn new(window: &Window) -> Rc<Self> {
        Rc::new(Self {
            storage: window.session_storage().ok().flatten(),
        })
    }
}

impl IntentStore for SessionIntentStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.set_item(key, value) {
                tracing::warn!(key, error = ?err, "intent not cached");
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.remove_item(key) {
                tracing::warn!(key, error = ?err, "stale intent not removed");
            }
        }
    }
}
