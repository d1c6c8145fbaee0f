//! Error types shared by every checkout component.
//!
//! Two shapes matter to the user-facing surfaces: a structured
//! [`ProcessorError`] (or merchant-reported error) whose message is written
//! for shoppers and is shown verbatim, and a generic runtime failure whose
//! message is replaced by the configured generic text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Representation of a processor SDK error object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorError {
    /// Human-readable message.
    pub message: String,
    /// Processor error type, e.g. `"card_error"` or `"validation_error"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Optional error code, e.g. `"card_declined"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_code: Option<String>,
    /// Charge reference attached to a failed payment attempt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<String>,
    /// Intent the error belongs to, if the processor reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_charge(mut self, charge: impl Into<String>) -> Self {
        self.charge = Some(charge.into());
        self
    }
}

impl std::fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProcessorError {}

/// Every failure a checkout attempt can end in.
///
/// `Clone` so that a single failed computation can be handed to every caller
/// awaiting the same shared future.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CheckoutError {
    /// Incomplete or invalid payment details, detected before any network call.
    #[error("{0}")]
    Validation(String),

    /// Structured error returned by the processor SDK.
    #[error("{0}")]
    Processor(ProcessorError),

    /// Error reported by the merchant backend in its response envelope.
    #[error("{0}")]
    Merchant(String),

    /// Device fingerprinting failed; fatal for the page load. The agent's
    /// message is for logs only.
    #[error("Unable to verify this device: {0}")]
    Fingerprint(String),

    /// Unstructured failure (network, serialization, JS exception).
    #[error("{0}")]
    Runtime(String),

    /// A state machine was asked to take a step it does not allow.
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("invalid checkout configuration: {0}")]
    Config(String),
}

impl CheckoutError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Whether this error carries no message written for shoppers.
    pub fn is_generic(&self) -> bool {
        matches!(
            self,
            Self::Runtime(_) | Self::Fingerprint(_) | Self::InvalidTransition { .. }
        )
    }

    /// Message to show the shopper.
    ///
    /// Generic runtime failures are replaced with `generic_message`; every
    /// structured error keeps its own message.
    pub fn display_message(&self, generic_message: &str) -> String {
        if self.is_generic() {
            generic_message.to_string()
        } else {
            self.to_string()
        }
    }

    /// Charge reference of a failed payment attempt, when the processor sent one.
    pub fn charge(&self) -> Option<&str> {
        match self {
            Self::Processor(err) => err.charge.as_deref(),
            _ => None,
        }
    }
}

impl From<ProcessorError> for CheckoutError {
    fn from(err: ProcessorError) -> Self {
        Self::Processor(err)
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl From<url::ParseError> for CheckoutError {
    fn from(err: url::ParseError) -> Self {
        Self::Runtime(err.to_string())
    }
}
