//! Additional actions run between payment-method creation and the native submit.

use std::rc::Rc;

use async_trait::async_trait;

use crate::backend::MerchantBackend;
use crate::error::CheckoutError;
use crate::form::{
    FormSubmission, PAYMENT_METHOD_ERROR_MARKER, PAYMENT_METHOD_FIELD, SAVE_PAYMENT_METHOD_FIELD,
    SETUP_INTENT_FIELD,
};
use crate::intent::PaymentMethodType;
use crate::processor::ProcessorClient;

#[async_trait(?Send)]
pub trait AdditionalActions {
    /// May add hidden fields; an error aborts the submission.
    async fn run(
        &self,
        payment_method_type: &PaymentMethodType,
        submission: &mut FormSubmission,
    ) -> Result<(), CheckoutError>;
}

/// Saves the new payment method by creating and confirming a setup intent
/// when the shopper ticked "save payment method".
pub struct SetupIntentAction<P: ProcessorClient> {
    processor: Rc<P>,
    backend: Rc<dyn MerchantBackend>,
}

impl<P: ProcessorClient> SetupIntentAction<P> {
    pub fn new(processor: Rc<P>, backend: Rc<dyn MerchantBackend>) -> Self {
        Self { processor, backend }
    }
}

#[async_trait(?Send)]
impl<P: ProcessorClient> AdditionalActions for SetupIntentAction<P> {
    async fn run(
        &self,
        payment_method_type: &PaymentMethodType,
        submission: &mut FormSubmission,
    ) -> Result<(), CheckoutError> {
        if !submission.snapshot.is_checked(SAVE_PAYMENT_METHOD_FIELD) {
            return Ok(());
        }
        let payment_method_id = match submission.hidden(PAYMENT_METHOD_FIELD) {
            Some(id) if id != PAYMENT_METHOD_ERROR_MARKER => id.to_string(),
            _ => return Ok(()),
        };

        let setup_intent = self.backend.create_setup_intent(&payment_method_id).await?;
        let setup_intent_id = self
            .processor
            .confirm_setup_intent(&setup_intent.client_secret, &payment_method_id)
            .await?;
        tracing::info!(%payment_method_type, %setup_intent_id, "payment method saved for later");
        submission.set_hidden(SETUP_INTENT_FIELD, setup_intent_id);
        Ok(())
    }
}
