//! Payment Element Registry.
//!
//! One widget per payment-method type, created lazily on first mount and
//! remounted on every later render. Creating the widget needs an intent, which
//! comes from the session cache or, failing that, from the merchant.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use yew::Callback;

use crate::backend::CreateIntentRequest;
use crate::blocking::{BlockGuard, FormTarget};
use crate::context::CheckoutContext;
use crate::error::CheckoutError;
use crate::intent::{CreatedIntent, PaymentMethodType};
use crate::processor::{ElementsOptions, PaymentElementOptions, ProcessorClient, WidgetEvent};

type PendingMount = Shared<LocalBoxFuture<'static, Result<(), CheckoutError>>>;

pub struct PaymentElementRegistry<P: ProcessorClient + 'static> {
    ctx: Rc<CheckoutContext<P>>,
    in_flight: RefCell<HashMap<PaymentMethodType, PendingMount>>,
}

impl<P: ProcessorClient + 'static> PaymentElementRegistry<P> {
    pub fn new(ctx: Rc<CheckoutContext<P>>) -> Self {
        Self {
            ctx,
            in_flight: RefCell::new(HashMap::new()),
        }
    }

    /// Makes sure a widget for `payment_method_type` is mounted on `target`.
    ///
    /// An existing widget is only remounted. Concurrent calls for a type whose
    /// widget is still being created wait for that creation instead of
    /// starting another one.
    pub async fn ensure_mounted(
        &self,
        payment_method_type: &PaymentMethodType,
        target: &FormTarget,
    ) -> Result<(), CheckoutError> {
        let component = self.ctx.component(payment_method_type).ok_or_else(|| {
            CheckoutError::Config(format!("payment method type {payment_method_type} is not enabled"))
        })?;

        if let Some(widget) = component.widget {
            tracing::debug!(%payment_method_type, %target, "remounting existing payment element");
            return self.remount(payment_method_type, &widget, target);
        }

        let (pending, started_here) = {
            let mut in_flight = self.in_flight.borrow_mut();
            match in_flight.get(payment_method_type) {
                Some(pending) => (pending.clone(), false),
                None => {
                    let pending = Self::create_and_mount(
                        Rc::clone(&self.ctx),
                        payment_method_type.clone(),
                        target.clone(),
                    )
                    .boxed_local()
                    .shared();
                    in_flight.insert(payment_method_type.clone(), pending.clone());
                    (pending, true)
                }
            }
        };

        let result = pending.await;
        if started_here {
            self.in_flight.borrow_mut().remove(payment_method_type);
        }
        result?;

        if !started_here {
            if let Some(component) = self.ctx.component(payment_method_type) {
                if let (Some(widget), true) = (component.widget, component.mounted_on.as_ref() != Some(target)) {
                    return self.remount(payment_method_type, &widget, target);
                }
            }
        }
        Ok(())
    }

    fn remount(
        &self,
        payment_method_type: &PaymentMethodType,
        widget: &P::Widget,
        target: &FormTarget,
    ) -> Result<(), CheckoutError> {
        self.ctx.processor.mount(widget, target)?;
        self.ctx.update_component(payment_method_type, |state| {
            state.mounted_on = Some(target.clone());
        });
        Ok(())
    }

    async fn create_and_mount(
        ctx: Rc<CheckoutContext<P>>,
        payment_method_type: PaymentMethodType,
        target: FormTarget,
    ) -> Result<(), CheckoutError> {
        let guard = BlockGuard::acquire(Rc::clone(&ctx.blocker), target.clone());

        let intent = match Self::resolve_intent(&ctx, &payment_method_type).await {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(%payment_method_type, error = %err, "could not obtain an intent");
                guard.release();
                ctx.page
                    .render_element_error(&target, &err.display_message(ctx.generic_error_message()));
                ctx.page
                    .set_save_payment_method_visible(&payment_method_type, false);
                return Err(err);
            }
        };

        ctx.update_component(&payment_method_type, |state| {
            state.intent_id = Some(intent.id.clone());
            state.client_secret = Some(intent.client_secret.clone());
        });

        let elements_options = ElementsOptions {
            client_secret: intent.client_secret.clone(),
            appearance: ctx.config.appearance.clone(),
            locale: ctx.config.locale.clone(),
        };
        let element_options = PaymentElementOptions {
            payment_method_types: vec![payment_method_type.to_string()],
            ..PaymentElementOptions::default()
        };
        let events = Self::event_sink(Rc::downgrade(&ctx), payment_method_type.clone(), target.clone());

        let mounted = ctx.processor.elements(&elements_options).and_then(|elements| {
            let widget = ctx
                .processor
                .create_payment_element(&elements, &element_options, events)?;
            ctx.processor.mount(&widget, &target)?;
            Ok((elements, widget))
        });
        let (elements, widget) = match mounted {
            Ok(handles) => handles,
            Err(err) => {
                let err = CheckoutError::from(err);
                guard.release();
                ctx.page
                    .render_element_error(&target, &err.display_message(ctx.generic_error_message()));
                return Err(err);
            }
        };

        ctx.update_component(&payment_method_type, |state| {
            state.elements = Some(elements);
            state.widget = Some(widget);
            state.mounted_on = Some(target.clone());
        });
        let save_visible = ctx.config.is_saved_cards_enabled && ctx.config.is_reusable(&payment_method_type);
        ctx.page
            .set_save_payment_method_visible(&payment_method_type, save_visible);

        tracing::info!(%payment_method_type, intent_id = %intent.id, %target, "payment element mounted");
        Ok(())
    }

    async fn resolve_intent(
        ctx: &CheckoutContext<P>,
        payment_method_type: &PaymentMethodType,
    ) -> Result<CreatedIntent, CheckoutError> {
        let fingerprint = ctx.fraud.fingerprint().await?;
        if let Some(intent) = ctx.intents.resolve(payment_method_type) {
            tracing::debug!(%payment_method_type, intent_id = %intent.id, "reusing cached intent");
            return Ok(intent);
        }
        let intent = ctx
            .backend
            .create_intent(&CreateIntentRequest {
                fingerprint,
                payment_method_type: payment_method_type.clone(),
                order_id: ctx.config.order_id.clone(),
            })
            .await?;
        ctx.intents.store(payment_method_type, &intent);
        Ok(intent)
    }

    fn event_sink(
        ctx: Weak<CheckoutContext<P>>,
        payment_method_type: PaymentMethodType,
        target: FormTarget,
    ) -> Callback<WidgetEvent> {
        Callback::from(move |event: WidgetEvent| {
            if let Some(ctx) = ctx.upgrade() {
                Self::apply_event(&ctx, &payment_method_type, &target, event);
            }
        })
    }

    /// Folds a widget event into the record of its type.
    pub fn apply_event(
        ctx: &CheckoutContext<P>,
        payment_method_type: &PaymentMethodType,
        target: &FormTarget,
        event: WidgetEvent,
    ) {
        match event {
            WidgetEvent::Change { complete, country } => {
                ctx.update_component(payment_method_type, |state| {
                    state.is_complete = Some(complete);
                    if country.is_some() {
                        state.detected_country = country;
                    }
                });
            }
            WidgetEvent::LoadError { message } => {
                tracing::warn!(%payment_method_type, %message, "payment element failed to load");
                ctx.update_component(payment_method_type, |state| {
                    state.has_load_error = true;
                });
                let message = if message.trim().is_empty() {
                    ctx.generic_error_message().to_string()
                } else {
                    message
                };
                ctx.page.render_element_error(target, &message);
            }
        }
    }

    pub fn context(&self) -> &Rc<CheckoutContext<P>> {
        &self.ctx
    }
}
