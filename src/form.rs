//! Checkout form data captured at submission time.

use serde::{Deserialize, Serialize};

/// Hidden field carrying the created payment-method id.
pub const PAYMENT_METHOD_FIELD: &str = "upe-payment-method";
/// Value written to [`PAYMENT_METHOD_FIELD`] when creation was rejected.
pub const PAYMENT_METHOD_ERROR_MARKER: &str = "upe-payment-method-error";
/// Hidden field carrying the serialized rejection.
pub const PAYMENT_METHOD_ERROR_FIELD: &str = "upe-payment-method-error-payload";
pub const PAYMENT_INTENT_FIELD: &str = "upe-payment-intent";
pub const SETUP_INTENT_FIELD: &str = "upe-setup-intent";
pub const PAYMENT_METHOD_TYPE_FIELD: &str = "upe-payment-method-type";
pub const FINGERPRINT_FIELD: &str = "upe-fingerprint";
pub const FRAUD_PREVENTION_TOKEN_FIELD: &str = "upe-fraud-prevention-token";
/// Checkbox asking to keep the payment method for later.
pub const SAVE_PAYMENT_METHOD_FIELD: &str = "upe-save-payment-method";

/// Substituted for every billing field missing from the form, so the
/// processor always receives a complete address object.
pub const FIELD_PLACEHOLDER: &str = "-";

/// Ordered field name → value pairs read from the form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFormSnapshot {
    fields: Vec<(String, String)>,
}

impl CheckoutFormSnapshot {
    pub fn capture<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    /// First value of `name`, ignoring blank values.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, value)| field == name && !value.trim().is_empty())
            .map(|(_, value)| value.as_str())
    }

    pub fn is_checked(&self, name: &str) -> bool {
        matches!(self.get(name), Some("1" | "true" | "on" | "yes"))
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    fn get_or_placeholder(&self, name: &str) -> String {
        self.get(name).unwrap_or(FIELD_PLACEHOLDER).to_string()
    }

    pub fn billing_details(&self) -> BillingDetails {
        let name = [self.get("billing_first_name"), self.get("billing_last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        BillingDetails {
            name: if name.trim().is_empty() {
                FIELD_PLACEHOLDER.to_string()
            } else {
                name
            },
            email: self.get_or_placeholder("billing_email"),
            phone: self.get_or_placeholder("billing_phone"),
            address: Address {
                line1: self.get_or_placeholder("billing_address_1"),
                line2: self.get_or_placeholder("billing_address_2"),
                city: self.get_or_placeholder("billing_city"),
                state: self.get_or_placeholder("billing_state"),
                postal_code: self.get_or_placeholder("billing_postcode"),
                country: self.get_or_placeholder("billing_country"),
            },
        }
    }

    /// Shipping details, only when the shopper ships somewhere else.
    pub fn shipping_details(&self) -> Option<ShippingDetails> {
        if !self.is_checked("ship_to_different_address") {
            return None;
        }
        let name = [self.get("shipping_first_name"), self.get("shipping_last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        Some(ShippingDetails {
            name,
            phone: self.get("shipping_phone").map(str::to_string),
            address: Address {
                line1: self.get("shipping_address_1").unwrap_or_default().to_string(),
                line2: self.get("shipping_address_2").unwrap_or_default().to_string(),
                city: self.get("shipping_city").unwrap_or_default().to_string(),
                state: self.get("shipping_state").unwrap_or_default().to_string(),
                postal_code: self.get("shipping_postcode").unwrap_or_default().to_string(),
                country: self.get("shipping_country").unwrap_or_default().to_string(),
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: Address,
}

/// A captured snapshot plus the hidden fields appended for submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormSubmission {
    pub snapshot: CheckoutFormSnapshot,
    pub hidden_fields: Vec<(String, String)>,
}

impl FormSubmission {
    pub fn new(snapshot: CheckoutFormSnapshot) -> Self {
        Self {
            snapshot,
            hidden_fields: Vec::new(),
        }
    }

    /// Sets a hidden field, replacing an earlier value with the same name.
    pub fn set_hidden(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.hidden_fields.iter_mut().find(|(field, _)| field == name) {
            Some(entry) => entry.1 = value,
            None => self.hidden_fields.push((name.to_string(), value)),
        }
    }

    pub fn hidden(&self, name: &str) -> Option<&str> {
        self.hidden_fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Snapshot fields followed by hidden fields; a hidden field overrides a
    /// form field of the same name.
    pub fn all_fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = self
            .snapshot
            .fields()
            .iter()
            .filter(|(name, _)| self.hidden(name).is_none())
            .cloned()
            .collect();
        fields.extend(self.hidden_fields.iter().cloned());
        fields
    }
}
