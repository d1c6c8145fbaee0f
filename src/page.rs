//! The page the checkout runs on: URL, form fields and error surfaces.

use crate::blocking::FormTarget;
use crate::error::CheckoutError;
use crate::form::{CheckoutFormSnapshot, FormSubmission};
use crate::intent::PaymentMethodType;

pub trait CheckoutPage {
    fn current_url(&self) -> String;

    /// Replaces the current history entry without reloading.
    fn replace_url(&self, url: &str);

    /// Full navigation.
    fn redirect(&self, url: &str);

    fn field_value(&self, name: &str) -> Option<String>;

    fn capture_form(&self, form: &FormTarget) -> CheckoutFormSnapshot;

    /// Writes the hidden fields into the form and submits it the way the
    /// browser would, which re-triggers the submit handler once before
    /// returning. An error means the form could not be submitted at all.
    fn submit_native(&self, form: &FormTarget, submission: &FormSubmission) -> Result<(), CheckoutError>;

    /// Generic inline error above the form.
    fn show_error(&self, form: &FormTarget, message: &str);

    /// Error rendered in place of a payment element.
    fn render_element_error(&self, element: &FormTarget, message: &str);

    fn set_save_payment_method_visible(
        &self,
        payment_method_type: &PaymentMethodType,
        visible: bool,
    );

    fn set_payment_section_visible(&self, visible: bool);
}
