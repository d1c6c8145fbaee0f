//! Intent Session Cache: reuse an intent across re-renders of the same cart.
//!
//! Entries are keyed by payment-method type and remember the cart hash they
//! were created for. A lookup made after the cart changed finds nothing, so a
//! fresh intent is created for the new cart state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::intent::{CreatedIntent, PaymentMethodType};

const KEY_PREFIX: &str = "upe_intent_";

/// Key/value storage the cache persists into, e.g. `sessionStorage`.
pub trait IntentStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryIntentStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl IntentStore for MemoryIntentStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Fingerprint of the cart contents an intent was created for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CartHash(String);

impl CartHash {
    /// Hash computed by the store itself.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// SHA-256 over the serialized cart contents.
    pub fn of_contents(contents: &serde_json::Value) -> Self {
        let digest = Sha256::digest(contents.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct CachedIntent {
    cart_hash: String,
    intent_id: String,
    client_secret: String,
}

pub struct IntentSessionCache {
    store: Rc<dyn IntentStore>,
    cart_hash: RefCell<CartHash>,
}

impl IntentSessionCache {
    pub fn new(store: Rc<dyn IntentStore>, cart_hash: CartHash) -> Self {
        Self {
            store,
            cart_hash: RefCell::new(cart_hash),
        }
    }

    pub fn in_memory(cart_hash: CartHash) -> Self {
        Self::new(Rc::new(MemoryIntentStore::new()), cart_hash)
    }

    /// Called when the cart changes; earlier entries stop resolving.
    pub fn set_cart_hash(&self, cart_hash: CartHash) {
        *self.cart_hash.borrow_mut() = cart_hash;
    }

    pub fn cart_hash(&self) -> CartHash {
        self.cart_hash.borrow().clone()
    }

    pub fn resolve(&self, payment_method_type: &PaymentMethodType) -> Option<CreatedIntent> {
        let key = Self::key(payment_method_type);
        let raw = self.store.get(&key)?;
        let cached: CachedIntent = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(%payment_method_type, error = %err, "dropping unreadable cached intent");
                self.store.remove(&key);
                return None;
            }
        };
        if cached.cart_hash != self.cart_hash.borrow().as_str() {
            tracing::debug!(%payment_method_type, "cart changed since intent was cached");
            self.store.remove(&key);
            return None;
        }
        Some(CreatedIntent::new(cached.intent_id, cached.client_secret))
    }

    pub fn store(&self, payment_method_type: &PaymentMethodType, intent: &CreatedIntent) {
        let cached = CachedIntent {
            cart_hash: self.cart_hash.borrow().as_str().to_string(),
            intent_id: intent.id.clone(),
            client_secret: intent.client_secret.clone(),
        };
        match serde_json::to_string(&cached) {
            Ok(raw) => self.store.set(&Self::key(payment_method_type), &raw),
            Err(err) => tracing::warn!(%payment_method_type, error = %err, "could not cache intent"),
        }
    }

    pub fn forget(&self, payment_method_type: &PaymentMethodType) {
        self.store.remove(&Self::key(payment_method_type));
    }

    fn key(payment_method_type: &PaymentMethodType) -> String {
        format!("{KEY_PREFIX}{payment_method_type}")
    }
}
