//! Page controller: owns the checkout context and turns page events into
//! calls on the state machines.
//!
//! DOM listeners translate their events into [`CheckoutCommand`]s and feed
//! them to [`CheckoutController::dispatch`]; the returned [`Dispatch`] tells
//! the listener whether to prevent the default action and what to spawn.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::actions::SetupIntentAction;
use crate::blocking::FormTarget;
use crate::config::CheckoutConfig;
use crate::context::{CheckoutContext, Collaborators};
use crate::intent::PaymentMethodType;
use crate::orchestrator::{SubmissionOrchestrator, SubmitHandling};
use crate::processor::{ProcessorClient, WidgetEvent};
use crate::redirect::AuthenticationRedirectResolver;
use crate::registry::PaymentElementRegistry;
use crate::session_cache::CartHash;

#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutCommand {
    PageLoaded,
    HashChanged { url: String },
    MountElement {
        payment_method_type: PaymentMethodType,
        target: FormTarget,
    },
    Submit {
        form: FormTarget,
        payment_method_type: PaymentMethodType,
    },
    WidgetEvent {
        payment_method_type: PaymentMethodType,
        target: FormTarget,
        event: WidgetEvent,
    },
    CartChanged(CartHash),
}

pub enum Dispatch {
    /// Leave the event alone.
    Native,
    /// Prevent the default action; nothing else to do.
    Handled,
    /// Prevent the default action and spawn the task.
    Spawn(LocalBoxFuture<'static, ()>),
}

pub struct CheckoutController<P: ProcessorClient + 'static> {
    ctx: Rc<CheckoutContext<P>>,
    registry: Rc<PaymentElementRegistry<P>>,
    orchestrator: Rc<SubmissionOrchestrator<P>>,
    resolver: Rc<AuthenticationRedirectResolver<P>>,
}

impl<P: ProcessorClient + 'static> CheckoutController<P> {
    /// Builds the context and the three state machines around it. Saved cards
    /// get the setup-intent action when the merchant enabled them.
    pub fn new(config: CheckoutConfig, collaborators: Collaborators<P>) -> Self {
        let saved_cards = config.is_saved_cards_enabled;
        let ctx = CheckoutContext::new(config, collaborators);
        let mut orchestrator = SubmissionOrchestrator::new(Rc::clone(&ctx));
        if saved_cards {
            orchestrator = orchestrator.with_additional_actions(Rc::new(SetupIntentAction::new(
                Rc::clone(&ctx.processor),
                Rc::clone(&ctx.backend),
            )));
        }
        Self {
            registry: Rc::new(PaymentElementRegistry::new(Rc::clone(&ctx))),
            orchestrator: Rc::new(orchestrator),
            resolver: Rc::new(AuthenticationRedirectResolver::new(Rc::clone(&ctx))),
            ctx,
        }
    }

    pub fn dispatch(&self, command: CheckoutCommand) -> Dispatch {
        match command {
            CheckoutCommand::PageLoaded => {
                let resolver = Rc::clone(&self.resolver);
                Dispatch::Spawn(
                    async move {
                        resolver.on_page_load().await;
                    }
                    .boxed_local(),
                )
            }
            CheckoutCommand::HashChanged { url } => {
                let resolver = Rc::clone(&self.resolver);
                Dispatch::Spawn(
                    async move {
                        resolver.on_hash_change(&url).await;
                    }
                    .boxed_local(),
                )
            }
            CheckoutCommand::MountElement {
                payment_method_type,
                target,
            } => {
                let registry = Rc::clone(&self.registry);
                Dispatch::Spawn(
                    async move {
                        if let Err(err) = registry.ensure_mounted(&payment_method_type, &target).await {
                            tracing::warn!(%payment_method_type, error = %err, "payment element not mounted");
                        }
                    }
                    .boxed_local(),
                )
            }
            CheckoutCommand::Submit {
                form,
                payment_method_type,
            } => {
                if !self.ctx.is_enabled(&payment_method_type) {
                    return Dispatch::Native;
                }
                match self.orchestrator.handle_submit(form, payment_method_type) {
                    SubmitHandling::AllowNative => Dispatch::Native,
                    SubmitHandling::Ignored => Dispatch::Handled,
                    SubmitHandling::Intercepted(body) => Dispatch::Spawn(body.map(|_| ()).boxed_local()),
                }
            }
            CheckoutCommand::WidgetEvent {
                payment_method_type,
                target,
                event,
            } => {
                PaymentElementRegistry::apply_event(&self.ctx, &payment_method_type, &target, event);
                Dispatch::Native
            }
            CheckoutCommand::CartChanged(cart_hash) => {
                self.ctx.intents.set_cart_hash(cart_hash);
                Dispatch::Native
            }
        }
    }

    pub fn context(&self) -> &Rc<CheckoutContext<P>> {
        &self.ctx
    }

    pub fn registry(&self) -> &Rc<PaymentElementRegistry<P>> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Rc<SubmissionOrchestrator<P>> {
        &self.orchestrator
    }

    pub fn resolver(&self) -> &Rc<AuthenticationRedirectResolver<P>> {
        &self.resolver
    }
}
