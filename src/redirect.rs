//! Authentication Redirect Resolver.
//!
//! When the merchant needs the shopper to pass an authentication challenge it
//! redirects back to the page with a fragment of the form
//! `#upe-confirm-{pi|si}:{order_id}:{client_secret}:{nonce}`. The resolver
//! looks for it on page load and on every hash change, strips it from the URL
//! so a reload does not replay it, runs the challenge and follows the
//! merchant's redirect.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use url::Url;

use crate::backend::UpdateOrderStatusRequest;
use crate::blocking::BlockGuard;
use crate::context::CheckoutContext;
use crate::error::CheckoutError;
use crate::form::PAYMENT_METHOD_FIELD;
use crate::intent::IntentKind;
use crate::processor::ProcessorClient;

/// Fragment prefix, including `#`, reserved for pending confirmations.
pub const AUTHENTICATION_MARKER_PREFIX: &str = "#upe-confirm-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationMarker {
    pub kind: IntentKind,
    pub order_id: String,
    pub client_secret: String,
    pub nonce: String,
}

impl AuthenticationMarker {
    pub fn parse(url: &Url) -> Option<Self> {
        let fragment = url.fragment()?;
        let rest = fragment.strip_prefix(&AUTHENTICATION_MARKER_PREFIX[1..])?;
        let (kind, rest) = rest.split_once(':')?;
        let kind = match kind {
            "pi" => IntentKind::Payment,
            "si" => IntentKind::Setup,
            _ => return None,
        };
        let (order_id, rest) = rest.split_once(':')?;
        let (client_secret, nonce) = rest.rsplit_once(':')?;
        if order_id.is_empty() || client_secret.is_empty() || nonce.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            order_id: order_id.to_string(),
            client_secret: client_secret.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

/// Order id from an `/order-pay/{id}/` URL.
pub fn order_pay_order_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|segment| *segment == "order-pay")?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Whether `url` carries a fragment starting with the marker prefix.
pub fn has_authentication_marker(url: &str) -> bool {
    url.find('#')
        .map(|index| url[index..].starts_with(AUTHENTICATION_MARKER_PREFIX))
        .unwrap_or(false)
}

/// `url` without its fragment.
pub fn strip_marker(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped.to_string()
}

/// Outcome of asking whether the current URL encodes a pending confirmation.
pub enum ConfirmIntent {
    NothingToConfirm,
    Pending {
        /// Resolves to the URL to send the shopper to.
        request: LocalBoxFuture<'static, Result<String, CheckoutError>>,
        is_order_page: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticationState {
    NoChallenge,
    PendingConfirmation,
    Redirecting,
    Resumed(ResumeOutcome),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticationEvent {
    NothingFound,
    ChallengeFound,
    Confirmed,
    Rejected,
    Navigated,
}

impl AuthenticationState {
    pub fn next(self, event: AuthenticationEvent) -> Result<Self, CheckoutError> {
        use AuthenticationEvent as E;
        use AuthenticationState as S;

        match (self, event) {
            (S::PendingConfirmation, E::Confirmed) => Ok(S::Resumed(ResumeOutcome::Succeeded)),
            (S::PendingConfirmation, E::Rejected) => Ok(S::Resumed(ResumeOutcome::Failed)),
            (S::Resumed(ResumeOutcome::Succeeded), E::Navigated) => Ok(S::Redirecting),
            (S::PendingConfirmation | S::Redirecting, _) => Err(self.invalid(event)),
            (_, E::NothingFound) => Ok(S::NoChallenge),
            (_, E::ChallengeFound) => Ok(S::PendingConfirmation),
            // A failed marker parse counts as a failed resumption.
            (_, E::Rejected) => Ok(S::Resumed(ResumeOutcome::Failed)),
            _ => Err(self.invalid(event)),
        }
    }

    fn invalid(self, event: AuthenticationEvent) -> CheckoutError {
        CheckoutError::InvalidTransition {
            from: self.name(),
            event: event.name(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NoChallenge => "no_challenge",
            Self::PendingConfirmation => "pending_confirmation",
            Self::Redirecting => "redirecting",
            Self::Resumed(ResumeOutcome::Succeeded) => "resumed_success",
            Self::Resumed(ResumeOutcome::Failed) => "resumed_failure",
        }
    }
}

impl AuthenticationEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::NothingFound => "nothing_found",
            Self::ChallengeFound => "challenge_found",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Navigated => "navigated",
        }
    }
}

pub struct AuthenticationRedirectResolver<P: ProcessorClient + 'static> {
    ctx: Rc<CheckoutContext<P>>,
    state: Cell<AuthenticationState>,
}

impl<P: ProcessorClient + 'static> AuthenticationRedirectResolver<P> {
    pub fn new(ctx: Rc<CheckoutContext<P>>) -> Self {
        Self {
            ctx,
            state: Cell::new(AuthenticationState::NoChallenge),
        }
    }

    pub fn state(&self) -> AuthenticationState {
        self.state.get()
    }

    fn advance(&self, event: AuthenticationEvent) -> Result<AuthenticationState, CheckoutError> {
        let current = self.state.get();
        let next = current.next(event)?;
        tracing::debug!(from = current.name(), to = next.name(), "authentication transition");
        self.state.set(next);
        Ok(next)
    }

    /// Parses `current_url` and, when it carries a marker, builds the request
    /// that runs the challenge and reports the result to the merchant.
    ///
    /// The merchant is told about the outcome even when the processor
    /// reported an error, which is raised only afterwards.
    pub fn confirm_intent(
        &self,
        current_url: &str,
        payment_method_id: Option<String>,
    ) -> Result<ConfirmIntent, CheckoutError> {
        let url = Url::parse(current_url)?;
        let marker = match AuthenticationMarker::parse(&url) {
            Some(marker) => marker,
            None => return Ok(ConfirmIntent::NothingToConfirm),
        };
        let order_page_id = order_pay_order_id(&url);
        let is_order_page = order_page_id.is_some();
        let order_id = order_page_id.unwrap_or_else(|| marker.order_id.clone());

        let ctx = Rc::clone(&self.ctx);
        let request = async move {
            let outcome = ctx
                .processor
                .handle_next_action(marker.kind, &marker.client_secret)
                .await?;
            let redirect_url = ctx
                .backend
                .update_order_status(&UpdateOrderStatusRequest {
                    order_id,
                    intent_id: outcome.intent_id,
                    payment_method_id,
                    nonce: marker.nonce,
                })
                .await?;
            match (outcome.error, outcome.status) {
                (Some(error), _) => Err(CheckoutError::Processor(error)),
                (None, Some(status)) if status.requires_action() => {
                    Err(CheckoutError::runtime("authentication was not completed"))
                }
                (None, _) => Ok(redirect_url),
            }
        }
        .boxed_local();

        Ok(ConfirmIntent::Pending {
            request,
            is_order_page,
        })
    }

    pub async fn on_page_load(&self) -> AuthenticationState {
        self.resume().await
    }

    /// Only fragments carrying the marker prefix trigger a resumption.
    pub async fn on_hash_change(&self, new_url: &str) -> AuthenticationState {
        if !has_authentication_marker(new_url) {
            return self.state();
        }
        self.resume().await
    }

    async fn resume(&self) -> AuthenticationState {
        if matches!(
            self.state(),
            AuthenticationState::PendingConfirmation | AuthenticationState::Redirecting
        ) {
            tracing::debug!(state = self.state().name(), "authentication already in progress; ignoring trigger");
            return self.state();
        }

        let page = Rc::clone(&self.ctx.page);
        let form = self.ctx.form_target();
        let generic = self.ctx.generic_error_message().to_string();
        let current_url = page.current_url();
        let payment_method_id = page
            .field_value(PAYMENT_METHOD_FIELD)
            .filter(|id| !id.is_empty());

        let (request, is_order_page) = match self.confirm_intent(&current_url, payment_method_id) {
            Ok(ConfirmIntent::NothingToConfirm) => {
                self.record(AuthenticationEvent::NothingFound);
                return self.state();
            }
            Ok(ConfirmIntent::Pending { request, is_order_page }) => (request, is_order_page),
            Err(err) => {
                tracing::warn!(error = %err, "could not read authentication marker");
                page.show_error(&form, &err.display_message(&generic));
                self.record(AuthenticationEvent::Rejected);
                return self.state();
            }
        };

        self.record(AuthenticationEvent::ChallengeFound);
        let guard = BlockGuard::acquire(Rc::clone(&self.ctx.blocker), form.clone());
        if is_order_page {
            page.set_payment_section_visible(false);
        }
        if let Ok(url) = Url::parse(&current_url) {
            page.replace_url(&strip_marker(&url));
        }

        match request.await {
            Ok(redirect_url) => {
                tracing::info!(%redirect_url, "authentication completed; redirecting");
                self.record(AuthenticationEvent::Confirmed);
                page.redirect(&redirect_url);
                self.record(AuthenticationEvent::Navigated);
            }
            Err(err) => {
                tracing::warn!(error = %err, "authentication failed");
                self.record(AuthenticationEvent::Rejected);
                guard.release();
                if is_order_page {
                    page.set_payment_section_visible(true);
                }
                page.show_error(&form, &err.display_message(&generic));
                return self.state();
            }
        }
        self.state()
    }

    fn record(&self, event: AuthenticationEvent) {
        if let Err(err) = self.advance(event) {
            tracing::error!(error = %err, "unexpected authentication transition");
        }
    }
}
