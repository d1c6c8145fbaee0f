//! Browser glue: SDK bindings, DOM page, AJAX backend and the entry point the
//! host page calls.

pub mod backend;
pub mod bindings;
pub mod client;
pub mod entry;
pub mod fingerprint;
pub mod interop;
pub mod page;

pub use backend::AjaxBackend;
pub use client::WebProcessor;
pub use entry::{start_checkout, CheckoutHandle};
pub use fingerprint::FingerprintAgent;
pub use interop::{use_fingerprint_agent, use_processor_sdk};
pub use page::{DomCheckoutPage, DomUiBlocker, SessionIntentStore};

use crate::blocking::FormTarget;
use crate::intent::PaymentMethodType;

/// Container each payment element mounts into.
pub fn element_target(payment_method_type: &PaymentMethodType) -> FormTarget {
    FormTarget::new(format!("#upe-element-{payment_method_type}"))
}
