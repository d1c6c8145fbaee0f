//! Hand-written fakes for the checkout seams. Every fake records its calls so
//! tests can assert on counts and arguments.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use yew::Callback;

use yew_stripe_upe::backend::{
    CreateIntentRequest, MerchantBackend, ProcessCheckoutResponse, UpdateIntentRequest,
    UpdateIntentResponse, UpdateOrderStatusRequest,
};
use yew_stripe_upe::blocking::{FormTarget, UiBlocker};
use yew_stripe_upe::config::CheckoutConfig;
use yew_stripe_upe::context::Collaborators;
use yew_stripe_upe::controller::{CheckoutCommand, CheckoutController};
use yew_stripe_upe::error::{CheckoutError, ProcessorError};
use yew_stripe_upe::form::{CheckoutFormSnapshot, FormSubmission};
use yew_stripe_upe::fraud::FingerprintSource;
use yew_stripe_upe::intent::{CreatedIntent, IntentKind, IntentStatus, PaymentMethod, PaymentMethodType};
use yew_stripe_upe::page::CheckoutPage;
use yew_stripe_upe::processor::{
    ConfirmParams, ElementsOptions, NextActionOutcome, PaymentElementOptions, PaymentMethodParams,
    ProcessorClient, WidgetEvent,
};
use yew_stripe_upe::session_cache::MemoryIntentStore;

pub const CHECKOUT_FORM: &str = "form.checkout";

pub fn card() -> PaymentMethodType {
    PaymentMethodType::card()
}

pub fn element_target(payment_method_type: &PaymentMethodType) -> FormTarget {
    FormTarget::new(format!("#upe-element-{payment_method_type}"))
}

pub fn config_json() -> serde_json::Value {
    serde_json::json!({
        "publishable_key": "pk_test_123",
        "account_id": "acct_1",
        "ajax_url": "https://shop.test/wp-admin/admin-ajax.php",
        "cart_hash": "cart-a",
        "fraud_prevention_token": "fpt_1",
        "payment_methods": {
            "card": { "title": "Card", "is_reusable": true },
            "sepa_debit": { "title": "SEPA Direct Debit", "is_reusable": false }
        }
    })
}

pub fn config() -> CheckoutConfig {
    CheckoutConfig::from_json(&config_json().to_string()).unwrap()
}

pub fn config_with(overrides: serde_json::Value) -> CheckoutConfig {
    let mut json = config_json();
    if let (Some(base), Some(overrides)) = (json.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }
    }
    CheckoutConfig::from_json(&json.to_string()).unwrap()
}

pub fn filled_form() -> CheckoutFormSnapshot {
    CheckoutFormSnapshot::capture([
        ("billing_first_name", "Ada"),
        ("billing_last_name", "Lovelace"),
        ("billing_email", "ada@example.test"),
        ("billing_country", "GB"),
        ("billing_postcode", "N1 9GU"),
        ("payment_method", "upe"),
    ])
}

//------------------------------------------------------------------------------
// Processor
//------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct FakeElements {
    pub client_secret: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FakeWidget {
    pub id: usize,
    pub client_secret: String,
}

#[derive(Default)]
pub struct FakeProcessor {
    pub elements_created: RefCell<Vec<ElementsOptions>>,
    pub widgets_created: Cell<usize>,
    pub mounts: RefCell<Vec<(usize, FormTarget)>>,
    pub submit_elements_calls: Cell<usize>,
    pub payment_methods_created: RefCell<Vec<PaymentMethodParams>>,
    pub payments_confirmed: RefCell<Vec<ConfirmParams>>,
    pub setups_confirmed: RefCell<Vec<ConfirmParams>>,
    pub next_actions: RefCell<Vec<(IntentKind, String)>>,
    pub setup_intents_confirmed: RefCell<Vec<(String, String)>>,

    pub events: RefCell<Vec<Callback<WidgetEvent>>>,

    pub submit_elements_error: RefCell<Option<ProcessorError>>,
    pub payment_method_error: RefCell<Option<ProcessorError>>,
    pub confirm_error: RefCell<Option<ProcessorError>>,
    pub next_action_result: RefCell<Option<Result<NextActionOutcome, CheckoutError>>>,
}

impl FakeProcessor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Emits `event` on the most recently created widget.
    pub fn emit(&self, event: WidgetEvent) {
        let callback = self.events.borrow().last().cloned();
        if let Some(callback) = callback {
            callback.emit(event);
        }
    }

    pub fn payment_method_calls(&self) -> usize {
        self.payment_methods_created.borrow().len()
    }
}

#[async_trait(?Send)]
impl ProcessorClient for FakeProcessor {
    type Elements = FakeElements;
    type Widget = FakeWidget;

    fn elements(&self, options: &ElementsOptions) -> Result<FakeElements, ProcessorError> {
        self.elements_created.borrow_mut().push(options.clone());
        Ok(FakeElements {
            client_secret: options.client_secret.clone(),
        })
    }

    fn create_payment_element(
        &self,
        elements: &FakeElements,
        _options: &PaymentElementOptions,
        events: Callback<WidgetEvent>,
    ) -> Result<FakeWidget, ProcessorError> {
        let id = self.widgets_created.get() + 1;
        self.widgets_created.set(id);
        self.events.borrow_mut().push(events);
        Ok(FakeWidget {
            id,
            client_secret: elements.client_secret.clone(),
        })
    }

    fn mount(&self, widget: &FakeWidget, target: &FormTarget) -> Result<(), ProcessorError> {
        self.mounts.borrow_mut().push((widget.id, target.clone()));
        Ok(())
    }

    async fn submit_elements(&self, _elements: &FakeElements) -> Result<(), ProcessorError> {
        self.submit_elements_calls.set(self.submit_elements_calls.get() + 1);
        match self.submit_elements_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_payment_method(
        &self,
        _elements: &FakeElements,
        params: &PaymentMethodParams,
    ) -> Result<PaymentMethod, ProcessorError> {
        self.payment_methods_created.borrow_mut().push(params.clone());
        match self.payment_method_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(PaymentMethod {
                id: format!("pm_{}", self.payment_method_calls()),
                method_type: Some("card".into()),
            }),
        }
    }

    async fn confirm_payment(
        &self,
        _elements: &FakeElements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError> {
        self.payments_confirmed.borrow_mut().push(params.clone());
        match self.confirm_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn confirm_setup(
        &self,
        _elements: &FakeElements,
        params: &ConfirmParams,
    ) -> Result<(), ProcessorError> {
        self.setups_confirmed.borrow_mut().push(params.clone());
        match self.confirm_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn handle_next_action(
        &self,
        kind: IntentKind,
        client_secret: &str,
    ) -> Result<NextActionOutcome, CheckoutError> {
        self.next_actions
            .borrow_mut()
            .push((kind, client_secret.to_string()));
        self.next_action_result.borrow().clone().unwrap_or_else(|| {
            Ok(NextActionOutcome {
                intent_id: Some("pi_1".into()),
                status: Some(IntentStatus::Succeeded),
                error: None,
            })
        })
    }

    async fn confirm_setup_intent(
        &self,
        client_secret: &str,
        payment_method_id: &str,
    ) -> Result<String, ProcessorError> {
        self.setup_intents_confirmed
            .borrow_mut()
            .push((client_secret.to_string(), payment_method_id.to_string()));
        Ok("seti_1".into())
    }
}

//------------------------------------------------------------------------------
// Merchant backend
//------------------------------------------------------------------------------

pub struct FakeBackend {
    pub intents_created: RefCell<Vec<CreateIntentRequest>>,
    pub create_intent_error: RefCell<Option<CheckoutError>>,
    pub intents_updated: RefCell<Vec<UpdateIntentRequest>>,
    pub update_intent_response: RefCell<UpdateIntentResponse>,
    pub checkouts: RefCell<Vec<(String, FormSubmission, String)>>,
    pub checkout_response: RefCell<Result<ProcessCheckoutResponse, CheckoutError>>,
    pub logged_charges: RefCell<Vec<String>>,
    pub order_status_updates: RefCell<Vec<UpdateOrderStatusRequest>>,
    pub order_status_error: RefCell<Option<CheckoutError>>,
    pub setup_intents_created: RefCell<Vec<String>>,
}

pub const ORDER_RECEIVED_URL: &str = "https://shop.test/checkout/order-received/42/";

impl FakeBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            intents_created: RefCell::new(Vec::new()),
            create_intent_error: RefCell::new(None),
            intents_updated: RefCell::new(Vec::new()),
            update_intent_response: RefCell::new(UpdateIntentResponse::default()),
            checkouts: RefCell::new(Vec::new()),
            checkout_response: RefCell::new(Ok(ProcessCheckoutResponse {
                redirect_url: ORDER_RECEIVED_URL.into(),
                payment_needed: true,
            })),
            logged_charges: RefCell::new(Vec::new()),
            order_status_updates: RefCell::new(Vec::new()),
            order_status_error: RefCell::new(None),
            setup_intents_created: RefCell::new(Vec::new()),
        })
    }

    pub fn intent_calls(&self) -> usize {
        self.intents_created.borrow().len()
    }
}

#[async_trait(?Send)]
impl MerchantBackend for FakeBackend {
    async fn create_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<CreatedIntent, CheckoutError> {
        self.intents_created.borrow_mut().push(request.clone());
        if let Some(err) = self.create_intent_error.borrow().clone() {
            return Err(err);
        }
        let n = self.intent_calls();
        Ok(CreatedIntent::new(format!("pi_{n}"), format!("pi_{n}_secret_{n}")))
    }

    async fn update_intent(
        &self,
        request: &UpdateIntentRequest,
    ) -> Result<UpdateIntentResponse, CheckoutError> {
        self.intents_updated.borrow_mut().push(request.clone());
        Ok(self.update_intent_response.borrow().clone())
    }

    async fn process_checkout(
        &self,
        intent_id: &str,
        submission: &FormSubmission,
        fingerprint: &str,
    ) -> Result<ProcessCheckoutResponse, CheckoutError> {
        self.checkouts.borrow_mut().push((
            intent_id.to_string(),
            submission.clone(),
            fingerprint.to_string(),
        ));
        self.checkout_response.borrow().clone()
    }

    async fn log_payment_error(&self, charge_ref: &str) -> Result<bool, CheckoutError> {
        self.logged_charges.borrow_mut().push(charge_ref.to_string());
        Ok(true)
    }

    async fn update_order_status(
        &self,
        request: &UpdateOrderStatusRequest,
    ) -> Result<String, CheckoutError> {
        self.order_status_updates.borrow_mut().push(request.clone());
        match self.order_status_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(ORDER_RECEIVED_URL.to_string()),
        }
    }

    async fn create_setup_intent(
        &self,
        payment_method_id: &str,
    ) -> Result<CreatedIntent, CheckoutError> {
        self.setup_intents_created
            .borrow_mut()
            .push(payment_method_id.to_string());
        Ok(CreatedIntent::new("seti_1", "seti_1_secret_1"))
    }
}

//------------------------------------------------------------------------------
// Page
//------------------------------------------------------------------------------

pub struct FakePage {
    pub url: RefCell<String>,
    pub replaced_urls: RefCell<Vec<String>>,
    pub redirects: RefCell<Vec<String>>,
    pub fields: RefCell<HashMap<String, String>>,
    pub form: RefCell<CheckoutFormSnapshot>,
    pub native_submits: RefCell<Vec<FormSubmission>>,
    /// Runs inside `submit_native`, like the browser re-dispatching `submit`.
    pub on_native_submit: RefCell<Option<Rc<dyn Fn()>>>,
    pub submit_error: RefCell<Option<CheckoutError>>,
    pub errors: RefCell<Vec<String>>,
    pub element_errors: RefCell<Vec<(FormTarget, String)>>,
    pub save_visibility: RefCell<Vec<(PaymentMethodType, bool)>>,
    pub payment_section_visibility: RefCell<Vec<bool>>,
}

impl FakePage {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            url: RefCell::new("https://shop.test/checkout/".into()),
            replaced_urls: RefCell::new(Vec::new()),
            redirects: RefCell::new(Vec::new()),
            fields: RefCell::new(HashMap::new()),
            form: RefCell::new(filled_form()),
            native_submits: RefCell::new(Vec::new()),
            on_native_submit: RefCell::new(None),
            submit_error: RefCell::new(None),
            errors: RefCell::new(Vec::new()),
            element_errors: RefCell::new(Vec::new()),
            save_visibility: RefCell::new(Vec::new()),
            payment_section_visibility: RefCell::new(Vec::new()),
        })
    }

    pub fn set_url(&self, url: &str) {
        *self.url.borrow_mut() = url.to_string();
    }

    pub fn last_error(&self) -> Option<String> {
        self.errors.borrow().last().cloned()
    }

    pub fn last_submission(&self) -> Option<FormSubmission> {
        self.native_submits.borrow().last().cloned()
    }
}

impl CheckoutPage for FakePage {
    fn current_url(&self) -> String {
        self.url.borrow().clone()
    }

    fn replace_url(&self, url: &str) {
        self.replaced_urls.borrow_mut().push(url.to_string());
        self.set_url(url);
    }

    fn redirect(&self, url: &str) {
        self.redirects.borrow_mut().push(url.to_string());
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.fields.borrow().get(name).cloned()
    }

    fn capture_form(&self, _form: &FormTarget) -> CheckoutFormSnapshot {
        self.form.borrow().clone()
    }

    fn submit_native(&self, _form: &FormTarget, submission: &FormSubmission) -> Result<(), CheckoutError> {
        if let Some(err) = self.submit_error.borrow().clone() {
            return Err(err);
        }
        self.native_submits.borrow_mut().push(submission.clone());
        let hook = self.on_native_submit.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    fn show_error(&self, _form: &FormTarget, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn render_element_error(&self, element: &FormTarget, message: &str) {
        self.element_errors
            .borrow_mut()
            .push((element.clone(), message.to_string()));
    }

    fn set_save_payment_method_visible(
        &self,
        payment_method_type: &PaymentMethodType,
        visible: bool,
    ) {
        self.save_visibility
            .borrow_mut()
            .push((payment_method_type.clone(), visible));
    }

    fn set_payment_section_visible(&self, visible: bool) {
        self.payment_section_visibility.borrow_mut().push(visible);
    }
}

//------------------------------------------------------------------------------
// Blocker
//------------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBlocker {
    pub blocks: RefCell<Vec<FormTarget>>,
    pub unblocks: RefCell<Vec<FormTarget>>,
}

impl FakeBlocker {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Targets currently blocked more often than unblocked.
    pub fn outstanding(&self) -> usize {
        self.blocks.borrow().len() - self.unblocks.borrow().len()
    }
}

impl UiBlocker for FakeBlocker {
    fn block(&self, target: &FormTarget) {
        self.blocks.borrow_mut().push(target.clone());
    }

    fn unblock(&self, target: &FormTarget) {
        self.unblocks.borrow_mut().push(target.clone());
    }
}

//------------------------------------------------------------------------------
// Fingerprint
//------------------------------------------------------------------------------

type Release = Shared<oneshot::Receiver<Result<String, CheckoutError>>>;

/// Resolves immediately, or once the test releases it.
pub struct FakeFingerprint {
    pub computations: Cell<usize>,
    immediate: Option<Result<String, CheckoutError>>,
    release: Option<Release>,
}

impl FakeFingerprint {
    pub fn ready(fingerprint: &str) -> Rc<Self> {
        Rc::new(Self {
            computations: Cell::new(0),
            immediate: Some(Ok(fingerprint.to_string())),
            release: None,
        })
    }

    pub fn failing(message: &str) -> Rc<Self> {
        Rc::new(Self {
            computations: Cell::new(0),
            immediate: Some(Err(CheckoutError::runtime(message))),
            release: None,
        })
    }

    /// Pending until the returned sender fires.
    pub fn gated() -> (Rc<Self>, oneshot::Sender<Result<String, CheckoutError>>) {
        let (sender, receiver) = oneshot::channel();
        let source = Rc::new(Self {
            computations: Cell::new(0),
            immediate: None,
            release: Some(receiver.shared()),
        });
        (source, sender)
    }
}

#[async_trait(?Send)]
impl FingerprintSource for FakeFingerprint {
    async fn compute(&self) -> Result<String, CheckoutError> {
        self.computations.set(self.computations.get() + 1);
        if let Some(result) = &self.immediate {
            return result.clone();
        }
        match &self.release {
            Some(release) => release
                .clone()
                .await
                .unwrap_or_else(|_| Err(CheckoutError::runtime("fingerprint cancelled"))),
            None => Err(CheckoutError::runtime("no fingerprint configured")),
        }
    }
}

//------------------------------------------------------------------------------
// Harness
//------------------------------------------------------------------------------

pub struct Harness {
    pub processor: Rc<FakeProcessor>,
    pub backend: Rc<FakeBackend>,
    pub page: Rc<FakePage>,
    pub blocker: Rc<FakeBlocker>,
    pub fingerprint: Rc<FakeFingerprint>,
    pub store: Rc<MemoryIntentStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fingerprint(FakeFingerprint::ready("fp_1"))
    }

    pub fn with_fingerprint(fingerprint: Rc<FakeFingerprint>) -> Self {
        Self {
            processor: FakeProcessor::new(),
            backend: FakeBackend::new(),
            page: FakePage::new(),
            blocker: FakeBlocker::new(),
            fingerprint,
            store: Rc::new(MemoryIntentStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators<FakeProcessor> {
        Collaborators {
            processor: Rc::clone(&self.processor),
            backend: self.backend.clone(),
            page: self.page.clone(),
            blocker: self.blocker.clone(),
            fingerprint: self.fingerprint.clone(),
            intent_store: self.store.clone(),
        }
    }

    /// The page re-dispatches `submit` on native submits, as `requestSubmit` does.
    pub fn controller(&self, config: CheckoutConfig) -> Rc<CheckoutController<FakeProcessor>> {
        let controller = Rc::new(CheckoutController::new(config, self.collaborators()));
        let weak = Rc::downgrade(&controller);
        *self.page.on_native_submit.borrow_mut() = Some(Rc::new(move || {
            if let Some(controller) = weak.upgrade() {
                controller.dispatch(CheckoutCommand::Submit {
                    form: FormTarget::new(CHECKOUT_FORM),
                    payment_method_type: card(),
                });
            }
        }));
        controller
    }
}
