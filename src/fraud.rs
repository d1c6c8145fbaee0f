//! Fraud Signal Collector.
//!
//! The device fingerprint is computed at most once per page load. Callers
//! arriving while the computation is in flight await the same shared future,
//! and a failure is remembered: checkout cannot proceed on this load.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::CheckoutError;

/// Computes an opaque device identifier.
#[async_trait(?Send)]
pub trait FingerprintSource {
    async fn compute(&self) -> Result<String, CheckoutError>;
}

type PendingFingerprint = Shared<LocalBoxFuture<'static, Result<String, CheckoutError>>>;

enum FingerprintSlot {
    Empty,
    Pending(PendingFingerprint),
    Ready(String),
    Failed(CheckoutError),
}

/// Signals attached to every submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FraudSignals {
    pub fingerprint: String,
    pub prevention_token: Option<String>,
}

pub struct FraudSignalCollector {
    source: Rc<dyn FingerprintSource>,
    prevention_token: Option<String>,
    slot: RefCell<FingerprintSlot>,
}

impl FraudSignalCollector {
    pub fn new(source: Rc<dyn FingerprintSource>, prevention_token: Option<String>) -> Self {
        Self {
            source,
            prevention_token,
            slot: RefCell::new(FingerprintSlot::Empty),
        }
    }

    pub async fn fingerprint(&self) -> Result<String, CheckoutError> {
        let pending = {
            let mut slot = self.slot.borrow_mut();
            match &*slot {
                FingerprintSlot::Ready(fingerprint) => return Ok(fingerprint.clone()),
                FingerprintSlot::Failed(err) => return Err(err.clone()),
                FingerprintSlot::Pending(pending) => pending.clone(),
                FingerprintSlot::Empty => {
                    let source = Rc::clone(&self.source);
                    let pending = async move { source.compute().await }
                        .boxed_local()
                        .shared();
                    *slot = FingerprintSlot::Pending(pending.clone());
                    pending
                }
            }
        };

        let result = pending.await.map_err(|err| match err {
            CheckoutError::Fingerprint(_) => err,
            other => CheckoutError::Fingerprint(other.to_string()),
        });
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, FingerprintSlot::Pending(_)) {
            *slot = match &result {
                Ok(fingerprint) => FingerprintSlot::Ready(fingerprint.clone()),
                Err(err) => {
                    tracing::error!(error = %err, "device fingerprinting failed");
                    FingerprintSlot::Failed(err.clone())
                }
            };
        }
        result
    }

    pub async fn signals(&self) -> Result<FraudSignals, CheckoutError> {
        Ok(FraudSignals {
            fingerprint: self.fingerprint().await?,
            prevention_token: self.prevention_token.clone(),
        })
    }

    /// Fingerprint if it has already been computed.
    pub fn cached_fingerprint(&self) -> Option<String> {
        match &*self.slot.borrow() {
            FingerprintSlot::Ready(fingerprint) => Some(fingerprint.clone()),
            _ => None,
        }
    }
}
