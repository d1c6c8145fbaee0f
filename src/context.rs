//! Checkout context shared by the registry, the orchestrator and the resolver.
//!
//! Owned by the page controller and handed to each component by `Rc`. It
//! holds the collaborators, the per-type element records and the submission
//! gate; nothing here is global.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backend::MerchantBackend;
use crate::blocking::{FormTarget, UiBlocker};
use crate::config::CheckoutConfig;
use crate::fraud::{FingerprintSource, FraudSignalCollector};
use crate::intent::PaymentMethodType;
use crate::page::CheckoutPage;
use crate::processor::ProcessorClient;
use crate::session_cache::{IntentSessionCache, IntentStore};

/// Everything known about one payment-method type on this page.
pub struct PaymentMethodTypeState<P: ProcessorClient> {
    pub elements: Option<P::Elements>,
    pub widget: Option<P::Widget>,
    pub is_complete: Option<bool>,
    pub detected_country: Option<String>,
    pub has_load_error: bool,
    pub intent_id: Option<String>,
    pub client_secret: Option<String>,
    /// Last target the widget was mounted onto.
    pub mounted_on: Option<FormTarget>,
}

impl<P: ProcessorClient> Default for PaymentMethodTypeState<P> {
    fn default() -> Self {
        Self {
            elements: None,
            widget: None,
            is_complete: None,
            detected_country: None,
            has_load_error: false,
            intent_id: None,
            client_secret: None,
            mounted_on: None,
        }
    }
}

impl<P: ProcessorClient> Clone for PaymentMethodTypeState<P> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            widget: self.widget.clone(),
            is_complete: self.is_complete,
            detected_country: self.detected_country.clone(),
            has_load_error: self.has_load_error,
            intent_id: self.intent_id.clone(),
            client_secret: self.client_secret.clone(),
            mounted_on: self.mounted_on.clone(),
        }
    }
}

/// External collaborators a context is built from.
pub struct Collaborators<P: ProcessorClient> {
    pub processor: Rc<P>,
    pub backend: Rc<dyn MerchantBackend>,
    pub page: Rc<dyn CheckoutPage>,
    pub blocker: Rc<dyn UiBlocker>,
    pub fingerprint: Rc<dyn FingerprintSource>,
    pub intent_store: Rc<dyn IntentStore>,
}

pub struct CheckoutContext<P: ProcessorClient> {
    pub config: CheckoutConfig,
    pub processor: Rc<P>,
    pub backend: Rc<dyn MerchantBackend>,
    pub page: Rc<dyn CheckoutPage>,
    pub blocker: Rc<dyn UiBlocker>,
    pub fraud: FraudSignalCollector,
    pub intents: IntentSessionCache,
    components: RefCell<BTreeMap<PaymentMethodType, PaymentMethodTypeState<P>>>,
    has_checkout_completed: Cell<bool>,
}

impl<P: ProcessorClient> CheckoutContext<P> {
    pub fn new(config: CheckoutConfig, collaborators: Collaborators<P>) -> Rc<Self> {
        let cart_hash = config.initial_cart_hash();
        let components = config
            .payment_method_types()
            .map(|payment_method_type| (payment_method_type.clone(), PaymentMethodTypeState::default()))
            .collect();
        Rc::new(Self {
            fraud: FraudSignalCollector::new(
                collaborators.fingerprint,
                config.fraud_prevention_token.clone(),
            ),
            intents: IntentSessionCache::new(collaborators.intent_store, cart_hash),
            processor: collaborators.processor,
            backend: collaborators.backend,
            page: collaborators.page,
            blocker: collaborators.blocker,
            components: RefCell::new(components),
            has_checkout_completed: Cell::new(false),
            config,
        })
    }

    /// Copy of the record for `payment_method_type`, if the type is enabled.
    pub fn component(
        &self,
        payment_method_type: &PaymentMethodType,
    ) -> Option<PaymentMethodTypeState<P>> {
        self.components.borrow().get(payment_method_type).cloned()
    }

    pub fn is_enabled(&self, payment_method_type: &PaymentMethodType) -> bool {
        self.components.borrow().contains_key(payment_method_type)
    }

    /// Mutates a record; a no-op for types that are not enabled.
    pub(crate) fn update_component<R>(
        &self,
        payment_method_type: &PaymentMethodType,
        update: impl FnOnce(&mut PaymentMethodTypeState<P>) -> R,
    ) -> Option<R> {
        self.components
            .borrow_mut()
            .get_mut(payment_method_type)
            .map(update)
    }

    pub fn form_target(&self) -> FormTarget {
        FormTarget::new(self.config.form_selector())
    }

    pub fn generic_error_message(&self) -> &str {
        &self.config.generic_error_message
    }

    /// Armed right before the orchestrator submits the form natively.
    pub(crate) fn arm_submission_gate(&self) {
        self.has_checkout_completed.set(true);
    }

    /// Returns whether the gate was armed, disarming it.
    pub(crate) fn take_submission_gate(&self) -> bool {
        self.has_checkout_completed.replace(false)
    }

    pub fn is_submission_gate_armed(&self) -> bool {
        self.has_checkout_completed.get()
    }
}
