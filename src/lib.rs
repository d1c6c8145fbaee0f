//! Checkout payment confirmation for a payment-gateway plugin.
//!
//! The crate mounts the processor's hosted payment element into a checkout
//! form, intercepts the form submit to tokenize the payment details and
//! resumes payments that need a shopper authentication challenge.
//!
//! Everything except [`web`] and [`components`] is platform independent and
//! drives its collaborators through traits, so the state machines run the
//! same in the browser and in native tests.

pub mod actions;
pub mod backend;
pub mod blocking;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod form;
pub mod fraud;
pub mod intent;
pub mod orchestrator;
pub mod page;
pub mod processor;
pub mod redirect;
pub mod registry;
pub mod session_cache;

#[cfg(target_arch = "wasm32")]
pub mod components;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use blocking::{BlockGuard, FormTarget, UiBlocker};
pub use config::{CheckoutConfig, SubmissionFlow};
pub use context::{CheckoutContext, Collaborators};
pub use controller::{CheckoutCommand, CheckoutController, Dispatch};
pub use error::{CheckoutError, ProcessorError};
pub use intent::{CreatedIntent, IntentKind, PaymentMethodType};
pub use orchestrator::{SubmissionOrchestrator, SubmissionOutcome, SubmissionState, SubmitHandling};
pub use redirect::{AuthenticationRedirectResolver, AuthenticationState};
pub use registry::PaymentElementRegistry;
pub use session_cache::{CartHash, IntentSessionCache};
