mod common;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::executor::block_on;

use common::{card, element_target, FakeFingerprint, Harness, CHECKOUT_FORM, ORDER_RECEIVED_URL};
use yew_stripe_upe::backend::{MerchantErrorBody, ProcessCheckoutResponse, UpdateIntentData, UpdateIntentResponse};
use yew_stripe_upe::config::{CheckoutConfig, DEFAULT_GENERIC_ERROR_MESSAGE, DEFAULT_INCOMPLETE_DETAILS_MESSAGE};
use yew_stripe_upe::controller::{CheckoutCommand, CheckoutController, Dispatch};
use yew_stripe_upe::error::{CheckoutError, ProcessorError};
use yew_stripe_upe::form::{
    CheckoutFormSnapshot, FINGERPRINT_FIELD, FRAUD_PREVENTION_TOKEN_FIELD, PAYMENT_INTENT_FIELD,
    PAYMENT_METHOD_ERROR_FIELD, PAYMENT_METHOD_ERROR_MARKER, PAYMENT_METHOD_FIELD,
    PAYMENT_METHOD_TYPE_FIELD, SETUP_INTENT_FIELD,
};
use yew_stripe_upe::intent::PaymentMethodType;
use yew_stripe_upe::orchestrator::{SubmissionOutcome, SubmissionState, SubmitHandling};
use yew_stripe_upe::processor::WidgetEvent;
use yew_stripe_upe::FormTarget;

type Controller = CheckoutController<common::FakeProcessor>;

fn form() -> FormTarget {
    FormTarget::new(CHECKOUT_FORM)
}

fn mounted(harness: &Harness, config: CheckoutConfig) -> Rc<Controller> {
    let controller = harness.controller(config);
    block_on(controller.registry().ensure_mounted(&card(), &element_target(&card()))).unwrap();
    controller
}

fn submit(controller: &Controller) -> SubmissionOutcome {
    match controller.orchestrator().handle_submit(form(), card()) {
        SubmitHandling::Intercepted(body) => block_on(body),
        other => panic!("submit was not intercepted: {:?}", other),
    }
}

/// Makes the fake page re-dispatch `submit` from inside the native submit and
/// records whether the controller let it through.
fn reenter_on_native_submit(harness: &Harness, controller: &Rc<Controller>) -> Rc<RefCell<Vec<bool>>> {
    let reentries = Rc::new(RefCell::new(Vec::new()));
    let weak: Weak<Controller> = Rc::downgrade(controller);
    let seen = Rc::clone(&reentries);
    *harness.page.on_native_submit.borrow_mut() = Some(Rc::new(move || {
        if let Some(controller) = weak.upgrade() {
            let dispatch = controller.dispatch(CheckoutCommand::Submit {
                form: form(),
                payment_method_type: card(),
            });
            seen.borrow_mut().push(matches!(dispatch, Dispatch::Native));
        }
    }));
    reentries
}

#[test]
fn deferred_submission_tokenizes_and_submits_natively() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    let reentries = reenter_on_native_submit(&harness, &controller);

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    let params = harness.processor.payment_methods_created.borrow()[0].clone();
    assert_eq!(params.billing_details.name, "Ada Lovelace");
    assert_eq!(params.billing_details.phone, "-");
    assert_eq!(params.billing_details.address.country, "GB");

    let submission = harness.page.last_submission().unwrap();
    assert_eq!(submission.hidden(PAYMENT_METHOD_FIELD), Some("pm_1"));
    assert_eq!(submission.hidden(PAYMENT_METHOD_TYPE_FIELD), Some("card"));
    assert_eq!(submission.hidden(PAYMENT_INTENT_FIELD), Some("pi_1"));
    assert_eq!(submission.hidden(FINGERPRINT_FIELD), Some("fp_1"));
    assert_eq!(submission.hidden(FRAUD_PREVENTION_TOKEN_FIELD), Some("fpt_1"));

    assert_eq!(*reentries.borrow(), vec![true]);
    assert!(!controller.context().is_submission_gate_armed());
    assert_eq!(controller.orchestrator().state(&form()), SubmissionState::Idle);
    assert_eq!(harness.blocker.outstanding(), 0);
    assert!(harness.page.errors.borrow().is_empty());
}

#[test]
fn duplicate_submits_while_in_flight_are_ignored() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());

    let first = controller.orchestrator().handle_submit(form(), card());
    assert!(first.is_intercepted());
    assert_eq!(controller.orchestrator().state(&form()), SubmissionState::Blocked);
    for _ in 0..3 {
        let duplicate = controller.dispatch(CheckoutCommand::Submit {
            form: form(),
            payment_method_type: card(),
        });
        assert!(matches!(duplicate, Dispatch::Handled));
    }

    match first {
        SubmitHandling::Intercepted(body) => assert_eq!(block_on(body), SubmissionOutcome::Completed),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(harness.processor.payment_method_calls(), 1);
    assert_eq!(harness.page.native_submits.borrow().len(), 1);
    assert_eq!(harness.blocker.blocks.borrow().iter().filter(|t| **t == form()).count(), 1);
}

#[test]
fn next_attempt_after_a_native_submit_is_intercepted_again() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    let reentries = reenter_on_native_submit(&harness, &controller);

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);
    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    assert_eq!(*reentries.borrow(), vec![true, true]);
    assert_eq!(harness.processor.payment_method_calls(), 2);
}

#[test]
fn native_submit_that_never_fires_fails_the_attempt() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    // The browser refused to submit (e.g. a constraint validation bubble).
    *harness.page.on_native_submit.borrow_mut() = None;

    let outcome = submit(&controller);

    assert!(matches!(outcome, SubmissionOutcome::Failed(CheckoutError::Runtime(_))));
    assert!(!controller.context().is_submission_gate_armed());
    assert_eq!(harness.page.last_error().as_deref(), Some(DEFAULT_GENERIC_ERROR_MESSAGE));
    assert_eq!(harness.blocker.outstanding(), 0);
    assert_eq!(controller.orchestrator().state(&form()), SubmissionState::Idle);

    // The shopper's next click runs a full attempt instead of slipping through.
    assert!(controller.orchestrator().handle_submit(form(), card()).is_intercepted());
}

#[test]
fn native_submit_errors_disarm_the_gate() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    *harness.page.submit_error.borrow_mut() =
        Some(CheckoutError::runtime("checkout form form.checkout vanished before submit"));

    let outcome = submit(&controller);

    assert!(matches!(outcome, SubmissionOutcome::Failed(CheckoutError::Runtime(_))));
    assert!(!controller.context().is_submission_gate_armed());
    assert_eq!(harness.page.last_error().as_deref(), Some(DEFAULT_GENERIC_ERROR_MESSAGE));

    *harness.page.submit_error.borrow_mut() = None;
    assert_eq!(submit(&controller), SubmissionOutcome::Completed);
    assert_eq!(harness.processor.payment_method_calls(), 2);
}

#[test]
fn fingerprint_failure_leaves_submissions_failing_with_the_generic_message() {
    let harness = Harness::with_fingerprint(FakeFingerprint::failing("agent blocked"));
    let controller = harness.controller(common::config());
    let mount = block_on(controller.registry().ensure_mounted(&card(), &element_target(&card())));
    assert!(matches!(mount, Err(CheckoutError::Fingerprint(_))));

    let outcome = submit(&controller);

    assert!(matches!(outcome, SubmissionOutcome::Failed(_)));
    assert_eq!(
        harness.page.element_errors.borrow()[0].1,
        DEFAULT_GENERIC_ERROR_MESSAGE
    );
    assert!(harness.page.errors.borrow().iter().all(|message| !message.contains("agent blocked")));
    assert_eq!(harness.processor.payment_method_calls(), 0);
    assert!(harness.page.native_submits.borrow().is_empty());
}

#[test]
fn incomplete_widget_fails_before_creating_a_payment_method() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    harness.processor.emit(WidgetEvent::Change {
        complete: false,
        country: None,
    });

    let outcome = submit(&controller);

    assert_eq!(
        outcome,
        SubmissionOutcome::Failed(CheckoutError::Validation(DEFAULT_INCOMPLETE_DETAILS_MESSAGE.into()))
    );
    assert_eq!(harness.processor.payment_method_calls(), 0);
    assert!(harness.page.native_submits.borrow().is_empty());
    assert_eq!(harness.page.last_error().as_deref(), Some(DEFAULT_INCOMPLETE_DETAILS_MESSAGE));
    assert_eq!(harness.blocker.outstanding(), 0);
    assert_eq!(controller.orchestrator().state(&form()), SubmissionState::Idle);
}

#[test]
fn sdk_validation_errors_are_shown_verbatim() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    *harness.processor.submit_elements_error.borrow_mut() = Some(
        ProcessorError::new("Your card number is incomplete.").with_code("incomplete_number"),
    );

    submit(&controller);

    assert_eq!(harness.processor.payment_method_calls(), 0);
    assert_eq!(harness.page.last_error().as_deref(), Some("Your card number is incomplete."));
}

#[test]
fn element_that_failed_to_load_never_reaches_the_processor() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    harness.processor.emit(WidgetEvent::LoadError {
        message: "Network error".into(),
    });

    let outcome = submit(&controller);

    assert!(matches!(outcome, SubmissionOutcome::Failed(CheckoutError::Validation(_))));
    assert_eq!(harness.processor.submit_elements_calls.get(), 0);
    assert_eq!(harness.processor.payment_method_calls(), 0);
}

#[test]
fn unmounted_element_is_reported_as_incomplete() {
    let harness = Harness::new();
    let controller = harness.controller(common::config());

    let outcome = submit(&controller);

    assert_eq!(
        outcome,
        SubmissionOutcome::Failed(CheckoutError::Validation(DEFAULT_INCOMPLETE_DETAILS_MESSAGE.into()))
    );
}

#[test]
fn rejected_payment_method_is_forwarded_to_the_merchant() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());
    *harness.processor.payment_method_error.borrow_mut() =
        Some(ProcessorError::new("Your card was declined.").with_code("card_declined"));

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    let submission = harness.page.last_submission().unwrap();
    assert_eq!(submission.hidden(PAYMENT_METHOD_FIELD), Some(PAYMENT_METHOD_ERROR_MARKER));
    let payload: ProcessorError =
        serde_json::from_str(submission.hidden(PAYMENT_METHOD_ERROR_FIELD).unwrap()).unwrap();
    assert_eq!(payload.code.as_deref(), Some("card_declined"));
    assert_eq!(payload.message, "Your card was declined.");
}

#[test]
fn other_gateways_submit_natively() {
    let harness = Harness::new();
    let controller = mounted(&harness, common::config());

    let dispatch = controller.dispatch(CheckoutCommand::Submit {
        form: form(),
        payment_method_type: PaymentMethodType::new("cod"),
    });

    assert!(matches!(dispatch, Dispatch::Native));
    assert!(harness.blocker.blocks.borrow().iter().all(|t| *t != form()));
}

#[test]
fn checked_save_box_confirms_a_setup_intent() {
    let harness = Harness::new();
    let config = common::config_with(serde_json::json!({ "is_saved_cards_enabled": true }));
    let controller = mounted(&harness, config);
    let mut fields = common::filled_form().fields().to_vec();
    fields.push(("upe-save-payment-method".into(), "1".into()));
    *harness.page.form.borrow_mut() = CheckoutFormSnapshot::capture(fields);

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    assert_eq!(*harness.backend.setup_intents_created.borrow(), vec!["pm_1".to_string()]);
    assert_eq!(
        *harness.processor.setup_intents_confirmed.borrow(),
        vec![("seti_1_secret_1".to_string(), "pm_1".to_string())]
    );
    let submission = harness.page.last_submission().unwrap();
    assert_eq!(submission.hidden(SETUP_INTENT_FIELD), Some("seti_1"));
}

#[test]
fn unchecked_save_box_skips_the_setup_intent() {
    let harness = Harness::new();
    let config = common::config_with(serde_json::json!({ "is_saved_cards_enabled": true }));
    let controller = mounted(&harness, config);

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    assert!(harness.backend.setup_intents_created.borrow().is_empty());
    assert_eq!(harness.page.last_submission().unwrap().hidden(SETUP_INTENT_FIELD), None);
}

fn intent_first() -> CheckoutConfig {
    common::config_with(serde_json::json!({ "submission_flow": "intent_first" }))
}

#[test]
fn intent_first_confirms_after_the_merchant_accepts() {
    let harness = Harness::new();
    let controller = mounted(&harness, intent_first());

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    let checkouts = harness.backend.checkouts.borrow();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].0, "pi_1");
    assert_eq!(checkouts[0].2, "fp_1");
    assert_eq!(checkouts[0].1.hidden(PAYMENT_INTENT_FIELD), Some("pi_1"));

    let confirmed = harness.processor.payments_confirmed.borrow();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].return_url, ORDER_RECEIVED_URL);
    assert_eq!(confirmed[0].payment_method_data.billing_details.email, "ada@example.test");
    assert!(confirmed[0].shipping.is_none());
    assert!(harness.page.native_submits.borrow().is_empty());
    assert_eq!(harness.blocker.outstanding(), 0);
}

#[test]
fn intent_first_reports_failed_charges() {
    let harness = Harness::new();
    let controller = mounted(&harness, intent_first());
    *harness.processor.confirm_error.borrow_mut() = Some(
        ProcessorError::new("Your card has insufficient funds.")
            .with_code("card_declined")
            .with_charge("ch_1"),
    );

    let outcome = submit(&controller);

    assert!(matches!(outcome, SubmissionOutcome::Failed(CheckoutError::Processor(_))));
    assert_eq!(*harness.backend.logged_charges.borrow(), vec!["ch_1".to_string()]);
    assert_eq!(harness.page.last_error().as_deref(), Some("Your card has insufficient funds."));
    assert_eq!(harness.blocker.outstanding(), 0);
}

#[test]
fn intent_first_follows_the_merchant_when_nothing_is_due() {
    let harness = Harness::new();
    let controller = mounted(&harness, intent_first());
    *harness.backend.checkout_response.borrow_mut() = Ok(ProcessCheckoutResponse {
        redirect_url: ORDER_RECEIVED_URL.into(),
        payment_needed: false,
    });

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    assert!(harness.processor.payments_confirmed.borrow().is_empty());
    assert_eq!(*harness.page.redirects.borrow(), vec![ORDER_RECEIVED_URL.to_string()]);
}

#[test]
fn runtime_failures_show_the_generic_message() {
    let harness = Harness::new();
    let controller = mounted(&harness, intent_first());
    *harness.backend.checkout_response.borrow_mut() =
        Err(CheckoutError::runtime("HTTP 500 from admin-ajax.php"));

    submit(&controller);

    assert_eq!(harness.page.last_error().as_deref(), Some(DEFAULT_GENERIC_ERROR_MESSAGE));
    assert!(harness.processor.payments_confirmed.borrow().is_empty());
}

#[test]
fn order_pay_page_updates_the_intent_before_confirming() {
    let harness = Harness::new();
    let config = common::config_with(serde_json::json!({
        "submission_flow": "intent_first",
        "is_order_pay_page": true,
        "order_id": "42",
        "order_return_url": "https://shop.test/checkout/order-received/42/?key=wc_order_1"
    }));
    let controller = mounted(&harness, config);
    harness.processor.emit(WidgetEvent::Change {
        complete: true,
        country: Some("BE".into()),
    });

    assert_eq!(submit(&controller), SubmissionOutcome::Completed);

    let updates = harness.backend.intents_updated.borrow();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].intent_id, "pi_1");
    assert_eq!(updates[0].order_id.as_deref(), Some("42"));
    assert!(!updates[0].save_payment_method);
    assert_eq!(updates[0].country.as_deref(), Some("BE"));
    assert!(harness.backend.checkouts.borrow().is_empty());
    assert_eq!(
        harness.processor.payments_confirmed.borrow()[0].return_url,
        "https://shop.test/checkout/order-received/42/?key=wc_order_1"
    );
}

#[test]
fn order_pay_merchant_errors_are_shown_verbatim() {
    let harness = Harness::new();
    let config = common::config_with(serde_json::json!({
        "submission_flow": "intent_first",
        "is_order_pay_page": true,
        "order_id": "42",
        "order_return_url": "https://shop.test/checkout/order-received/42/"
    }));
    let controller = mounted(&harness, config);
    *harness.backend.update_intent_response.borrow_mut() = UpdateIntentResponse {
        data: UpdateIntentData {
            error: Some(MerchantErrorBody {
                message: "This order has already been paid.".into(),
            }),
        },
    };

    let outcome = submit(&controller);

    assert_eq!(
        outcome,
        SubmissionOutcome::Failed(CheckoutError::Merchant("This order has already been paid.".into()))
    );
    assert_eq!(harness.page.last_error().as_deref(), Some("This order has already been paid."));
    assert!(harness.processor.payments_confirmed.borrow().is_empty());
}
