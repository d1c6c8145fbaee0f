//! Submission Orchestrator.
//!
//! Each form has an explicit [`SubmissionState`] advanced only through
//! [`SubmissionState::next`]. Entry into the handler is synchronous: the
//! gate check, the in-flight check, the UI lock and the `Idle → Blocked`
//! step all happen before the caller gets the async body back, so a second
//! submit fired in the same tick never starts a second sequence.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::actions::AdditionalActions;
use crate::backend::UpdateIntentRequest;
use crate::blocking::{BlockGuard, FormTarget};
use crate::config::SubmissionFlow;
use crate::context::{CheckoutContext, PaymentMethodTypeState};
use crate::error::CheckoutError;
use crate::form::{
    FormSubmission, FINGERPRINT_FIELD, FRAUD_PREVENTION_TOKEN_FIELD, PAYMENT_INTENT_FIELD,
    PAYMENT_METHOD_ERROR_FIELD, PAYMENT_METHOD_ERROR_MARKER, PAYMENT_METHOD_FIELD,
    PAYMENT_METHOD_TYPE_FIELD, SAVE_PAYMENT_METHOD_FIELD,
};
use crate::fraud::FraudSignals;
use crate::intent::{IntentKind, PaymentMethodType};
use crate::processor::{ConfirmParams, PaymentMethodData, PaymentMethodParams, ProcessorClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Blocked,
    CreatingPaymentMethod,
    SubmittingToMerchant,
    ConfirmingWithProcessor,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionEvent {
    Acquire,
    CreatePaymentMethod,
    SubmitToMerchant,
    Confirm,
    Complete,
    Fail,
    Reset,
}

impl SubmissionState {
    pub fn next(self, event: SubmissionEvent) -> Result<Self, CheckoutError> {
        use SubmissionEvent as E;
        use SubmissionState as S;

        match (self, event) {
            (S::Idle, E::Acquire) => Ok(S::Blocked),
            (S::Blocked, E::CreatePaymentMethod) => Ok(S::CreatingPaymentMethod),
            (S::CreatingPaymentMethod, E::SubmitToMerchant) => Ok(S::SubmittingToMerchant),
            (S::SubmittingToMerchant, E::Confirm) => Ok(S::ConfirmingWithProcessor),
            // The merchant may report that no payment is needed.
            (S::SubmittingToMerchant | S::ConfirmingWithProcessor, E::Complete) => Ok(S::Completed),
            (
                S::Blocked | S::CreatingPaymentMethod | S::SubmittingToMerchant | S::ConfirmingWithProcessor,
                E::Fail,
            ) => Ok(S::Failed),
            (S::Completed | S::Failed, E::Reset) => Ok(S::Idle),
            (from, event) => Err(CheckoutError::InvalidTransition {
                from: from.name(),
                event: event.name(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Blocked => "blocked",
            Self::CreatingPaymentMethod => "creating_payment_method",
            Self::SubmittingToMerchant => "submitting_to_merchant",
            Self::ConfirmingWithProcessor => "confirming_with_processor",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Between `Blocked` and a terminal state.
    pub fn is_in_flight(self) -> bool {
        !matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }
}

impl SubmissionEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::CreatePaymentMethod => "create_payment_method",
            Self::SubmitToMerchant => "submit_to_merchant",
            Self::Confirm => "confirm",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Reset => "reset",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionOutcome {
    Completed,
    Failed(CheckoutError),
}

/// What the caller must do with the submit event.
pub enum SubmitHandling {
    /// Let the browser submit: this is the re-entry caused by our own native submit.
    AllowNative,
    /// Another submission for this form is in flight; swallow the event.
    Ignored,
    /// Prevent the default action and drive the returned body to completion.
    Intercepted(LocalBoxFuture<'static, SubmissionOutcome>),
}

impl SubmitHandling {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Self::Intercepted(_))
    }
}

impl fmt::Debug for SubmitHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowNative => f.write_str("AllowNative"),
            Self::Ignored => f.write_str("Ignored"),
            Self::Intercepted(_) => f.write_str("Intercepted(..)"),
        }
    }
}

pub struct SubmissionOrchestrator<P: ProcessorClient + 'static> {
    ctx: Rc<CheckoutContext<P>>,
    additional_actions: Option<Rc<dyn AdditionalActions>>,
    states: RefCell<HashMap<FormTarget, SubmissionState>>,
}

impl<P: ProcessorClient + 'static> SubmissionOrchestrator<P> {
    pub fn new(ctx: Rc<CheckoutContext<P>>) -> Self {
        Self {
            ctx,
            additional_actions: None,
            states: RefCell::new(HashMap::new()),
        }
    }

    /// Hook run after the payment method exists and before the native submit.
    pub fn with_additional_actions(mut self, actions: Rc<dyn AdditionalActions>) -> Self {
        self.additional_actions = Some(actions);
        self
    }

    pub fn state(&self, form: &FormTarget) -> SubmissionState {
        self.states
            .borrow()
            .get(form)
            .copied()
            .unwrap_or(SubmissionState::Idle)
    }

    fn advance(&self, form: &FormTarget, event: SubmissionEvent) -> Result<SubmissionState, CheckoutError> {
        let mut states = self.states.borrow_mut();
        let current = states.get(form).copied().unwrap_or(SubmissionState::Idle);
        let next = current.next(event)?;
        tracing::debug!(form = %form, from = current.name(), to = next.name(), "submission transition");
        states.insert(form.clone(), next);
        Ok(next)
    }

    /// Submit handler entry point.
    pub fn handle_submit(
        self: &Rc<Self>,
        form: FormTarget,
        payment_method_type: PaymentMethodType,
    ) -> SubmitHandling {
        if self.ctx.take_submission_gate() {
            tracing::debug!(form = %form, "letting the native submission through");
            return SubmitHandling::AllowNative;
        }
        if self.state(&form).is_in_flight() {
            tracing::warn!(form = %form, state = self.state(&form).name(), "duplicate submit ignored");
            return SubmitHandling::Ignored;
        }

        let guard = BlockGuard::acquire(Rc::clone(&self.ctx.blocker), form.clone());
        if let Err(err) = self.advance(&form, SubmissionEvent::Acquire) {
            tracing::error!(form = %form, error = %err, "submission could not start");
            return SubmitHandling::Ignored;
        }

        let this = Rc::clone(self);
        SubmitHandling::Intercepted(
            async move { this.run(form, payment_method_type, guard).await }.boxed_local(),
        )
    }

    async fn run(
        self: Rc<Self>,
        form: FormTarget,
        payment_method_type: PaymentMethodType,
        guard: BlockGuard,
    ) -> SubmissionOutcome {
        let result = match self.ctx.config.submission_flow {
            SubmissionFlow::DeferredIntent => self.submit_deferred(&form, &payment_method_type).await,
            SubmissionFlow::IntentFirst => self.submit_intent_first(&form, &payment_method_type).await,
        };

        let outcome = match result.and_then(|()| self.advance(&form, SubmissionEvent::Complete)) {
            Ok(_) => {
                tracing::info!(form = %form, %payment_method_type, "checkout submitted");
                drop(guard);
                SubmissionOutcome::Completed
            }
            Err(err) => {
                tracing::warn!(form = %form, %payment_method_type, error = %err, "checkout submission failed");
                if let Err(transition) = self.advance(&form, SubmissionEvent::Fail) {
                    tracing::error!(form = %form, error = %transition, "could not record failure");
                    self.states.borrow_mut().insert(form.clone(), SubmissionState::Failed);
                }
                drop(guard);
                self.ctx
                    .page
                    .show_error(&form, &err.display_message(self.ctx.generic_error_message()));
                SubmissionOutcome::Failed(err)
            }
        };

        if self.advance(&form, SubmissionEvent::Reset).is_err() {
            self.states.borrow_mut().insert(form, SubmissionState::Idle);
        }
        outcome
    }

    /// Looks up the active element and rejects it when it cannot be submitted.
    fn submittable_component(
        &self,
        payment_method_type: &PaymentMethodType,
    ) -> Result<(PaymentMethodTypeState<P>, P::Elements), CheckoutError> {
        let incomplete = || CheckoutError::Validation(self.ctx.config.incomplete_details_message.clone());
        let component = self.ctx.component(payment_method_type).ok_or_else(incomplete)?;
        if component.has_load_error {
            return Err(incomplete());
        }
        let elements = component.elements.clone().ok_or_else(incomplete)?;
        Ok((component, elements))
    }

    /// Runs the SDK validation and then checks the widget's own completeness flag.
    async fn validate_element(
        &self,
        payment_method_type: &PaymentMethodType,
        elements: &P::Elements,
    ) -> Result<(), CheckoutError> {
        self.ctx.processor.submit_elements(elements).await?;
        let complete = self
            .ctx
            .component(payment_method_type)
            .and_then(|component| component.is_complete);
        if complete == Some(false) {
            return Err(CheckoutError::Validation(
                self.ctx.config.incomplete_details_message.clone(),
            ));
        }
        Ok(())
    }

    fn append_signals(
        submission: &mut FormSubmission,
        payment_method_type: &PaymentMethodType,
        intent_id: Option<&str>,
        signals: &FraudSignals,
    ) {
        submission.set_hidden(PAYMENT_METHOD_TYPE_FIELD, payment_method_type.as_str());
        if let Some(intent_id) = intent_id {
            submission.set_hidden(PAYMENT_INTENT_FIELD, intent_id);
        }
        submission.set_hidden(FINGERPRINT_FIELD, signals.fingerprint.as_str());
        if let Some(token) = &signals.prevention_token {
            submission.set_hidden(FRAUD_PREVENTION_TOKEN_FIELD, token.as_str());
        }
    }

    /// Payment method created here, intent confirmed by the merchant after the
    /// native submit.
    async fn submit_deferred(
        &self,
        form: &FormTarget,
        payment_method_type: &PaymentMethodType,
    ) -> Result<(), CheckoutError> {
        let (component, elements) = self.submittable_component(payment_method_type)?;

        self.advance(form, SubmissionEvent::CreatePaymentMethod)?;
        self.validate_element(payment_method_type, &elements).await?;

        let mut submission = FormSubmission::new(self.ctx.page.capture_form(form));
        let params = PaymentMethodParams {
            billing_details: submission.snapshot.billing_details(),
        };
        let payment_method = self
            .ctx
            .processor
            .create_payment_method(&elements, &params)
            .await;

        self.advance(form, SubmissionEvent::SubmitToMerchant)?;
        match payment_method {
            Ok(payment_method) => {
                submission.set_hidden(PAYMENT_METHOD_FIELD, payment_method.id);
            }
            Err(rejection) => {
                tracing::warn!(%payment_method_type, error = %rejection, "payment method rejected; forwarding to merchant");
                submission.set_hidden(PAYMENT_METHOD_FIELD, PAYMENT_METHOD_ERROR_MARKER);
                submission.set_hidden(PAYMENT_METHOD_ERROR_FIELD, serde_json::to_string(&rejection)?);
            }
        }
        let signals = self.ctx.fraud.signals().await?;
        Self::append_signals(
            &mut submission,
            payment_method_type,
            component.intent_id.as_deref(),
            &signals,
        );
        if let Some(actions) = &self.additional_actions {
            actions.run(payment_method_type, &mut submission).await?;
        }

        self.advance(form, SubmissionEvent::Confirm)?;
        self.ctx.arm_submission_gate();
        let submitted = self.ctx.page.submit_native(form, &submission);
        // The re-dispatched submit consumes the gate; an armed gate here means
        // the browser never submitted the form.
        let gate_left_armed = self.ctx.take_submission_gate();
        submitted?;
        if gate_left_armed {
            return Err(CheckoutError::runtime("native submit did not reach the submit handler"));
        }
        Ok(())
    }

    /// Form handed to the merchant first, mounted intent confirmed here.
    async fn submit_intent_first(
        &self,
        form: &FormTarget,
        payment_method_type: &PaymentMethodType,
    ) -> Result<(), CheckoutError> {
        let (component, elements) = self.submittable_component(payment_method_type)?;
        let (intent_id, client_secret) = match (component.intent_id.clone(), component.client_secret.clone()) {
            (Some(intent_id), Some(client_secret)) => (intent_id, client_secret),
            _ => return Err(CheckoutError::runtime("payment element has no intent")),
        };

        self.advance(form, SubmissionEvent::CreatePaymentMethod)?;
        self.validate_element(payment_method_type, &elements).await?;

        self.advance(form, SubmissionEvent::SubmitToMerchant)?;
        let signals = self.ctx.fraud.signals().await?;
        let mut submission = FormSubmission::new(self.ctx.page.capture_form(form));
        Self::append_signals(&mut submission, payment_method_type, Some(&intent_id), &signals);

        let config = &self.ctx.config;
        let return_url = if config.is_order_pay_page {
            let save_payment_method = submission.snapshot.is_checked(SAVE_PAYMENT_METHOD_FIELD)
                && config.is_reusable(payment_method_type);
            let country = self
                .ctx
                .component(payment_method_type)
                .and_then(|component| component.detected_country);
            self.ctx
                .backend
                .update_intent(&UpdateIntentRequest {
                    intent_id: intent_id.clone(),
                    order_id: config.order_id.clone(),
                    save_payment_method,
                    payment_method_type: payment_method_type.clone(),
                    country,
                })
                .await?
                .into_result()?;
            config
                .order_return_url
                .clone()
                .ok_or_else(|| CheckoutError::Config("order_return_url is not set".into()))?
        } else {
            let response = self
                .ctx
                .backend
                .process_checkout(&intent_id, &submission, &signals.fingerprint)
                .await?;
            if !response.payment_needed {
                tracing::info!(%intent_id, "no payment needed; following merchant redirect");
                self.ctx.page.redirect(&response.redirect_url);
                return Ok(());
            }
            response.redirect_url
        };

        self.advance(form, SubmissionEvent::Confirm)?;
        let params = ConfirmParams {
            return_url,
            payment_method_data: PaymentMethodData {
                billing_details: submission.snapshot.billing_details(),
            },
            shipping: submission.snapshot.shipping_details(),
        };
        let confirmed = match IntentKind::from_client_secret(&client_secret) {
            IntentKind::Payment => self.ctx.processor.confirm_payment(&elements, &params).await,
            IntentKind::Setup => self.ctx.processor.confirm_setup(&elements, &params).await,
        };
        if let Err(err) = confirmed {
            let err = CheckoutError::from(err);
            if let Some(charge) = err.charge() {
                match self.ctx.backend.log_payment_error(charge).await {
                    Ok(logged) => tracing::debug!(%charge, logged, "reported failed charge"),
                    Err(log_err) => tracing::warn!(%charge, error = %log_err, "could not report failed charge"),
                }
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn context(&self) -> &Rc<CheckoutContext<P>> {
        &self.ctx
    }
}
