//! Yew components for pages that render the checkout with Yew.
//!
//! `PaymentElementSlot` renders the container a payment element mounts into
//! and asks the controller to (re)mount after every render, so the widget
//! survives re-renders of the surrounding form. `UpeCheckout` loads the
//! processor SDK and the fingerprinting agent, builds the controller and
//! renders one slot per enabled payment-method type.

use std::rc::Rc;

use yew::prelude::*;

use crate::config::CheckoutConfig;
use crate::controller::CheckoutCommand;
use crate::error::CheckoutError;
use crate::form::SAVE_PAYMENT_METHOD_FIELD;
use crate::intent::PaymentMethodType;
use crate::web::entry::{build_controller, install_listeners, run, WebController};
use crate::web::{element_target, use_fingerprint_agent, use_processor_sdk};

#[derive(Properties, Clone)]
pub struct PaymentElementSlotProps {
    pub controller: Rc<WebController>,
    pub payment_method_type: PaymentMethodType,
}

impl PartialEq for PaymentElementSlotProps {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.controller, &other.controller)
            && self.payment_method_type == other.payment_method_type
    }
}

#[function_component(PaymentElementSlot)]
pub fn payment_element_slot(props: &PaymentElementSlotProps) -> Html {
    let target = element_target(&props.payment_method_type);
    {
        let controller = Rc::clone(&props.controller);
        let payment_method_type = props.payment_method_type.clone();
        let target = target.clone();
        // No dependencies: the element is remounted after every render.
        use_effect(move || {
            run(
                &controller,
                CheckoutCommand::MountElement {
                    payment_method_type,
                    target,
                },
            );
            || ()
        });
    }

    let id = target.selector().trim_start_matches('#').to_string();
    html! {
        <div class="upe-payment-element">
            <div {id}></div>
            <p class={format!("upe-save-payment-method-{}", props.payment_method_type)}>
                <label>
                    <input type="checkbox" name={SAVE_PAYMENT_METHOD_FIELD} value="1" />
                    { " Save payment information to my account for future purchases." }
                </label>
            </p>
        </div>
    }
}

#[derive(Properties, PartialEq, Clone)]
pub struct UpeCheckoutProps {
    pub config: CheckoutConfig,
    /// Rendered while the scripts load or when start-up fails.
    #[prop_or_default]
    pub fallback: Html,
}

#[function_component(UpeCheckout)]
pub fn upe_checkout(props: &UpeCheckoutProps) -> Html {
    let sdk_ready = use_processor_sdk();
    let agent_ready = use_fingerprint_agent();
    let controller = use_state(|| None::<Rc<WebController>>);

    {
        let controller = controller.clone();
        let config = props.config.clone();
        use_effect_with((sdk_ready, agent_ready), move |&(sdk_ready, agent_ready)| {
            if sdk_ready && agent_ready && controller.is_none() {
                match start(config) {
                    Ok(started) => controller.set(Some(started)),
                    Err(err) => tracing::error!(error = %err, "checkout failed to start"),
                }
            }
            || ()
        });
    }

    match &*controller {
        Some(controller) => {
            let slots = controller
                .context()
                .config
                .payment_method_types()
                .map(|payment_method_type| {
                    html! {
                        <PaymentElementSlot
                            key={payment_method_type.to_string()}
                            controller={Rc::clone(controller)}
                            payment_method_type={payment_method_type.clone()}
                        />
                    }
                })
                .collect::<Html>();
            html! { <>{ slots }</> }
        }
        None => props.fallback.clone(),
    }
}

fn start(config: CheckoutConfig) -> Result<Rc<WebController>, CheckoutError> {
    config.validate()?;
    let window = web_sys::window().ok_or_else(|| CheckoutError::runtime("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| CheckoutError::runtime("no document"))?;
    let controller = Rc::new(build_controller(config, &window, &document)?);
    install_listeners(&window, &document, &controller)
        .map_err(|err| CheckoutError::runtime(format!("{:?}", err)))?;
    run(&controller, CheckoutCommand::PageLoaded);
    Ok(controller)
}
