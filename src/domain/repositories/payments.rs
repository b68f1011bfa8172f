use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payments::{NewPaymentEntity, PaymentEntity};
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

#[async_trait]
#[automock]
pub trait PaymentRepository {
    async fn find_by_id(&self, payment_id: &str) -> Result<Option<PaymentEntity>>;

    /// Inserts a payment record, ignoring the insert when the id already
    /// exists (webhook recovery may race the checkout path).
    async fn create(&self, payment: NewPaymentEntity) -> Result<()>;

    /// Atomically marks the payment `approved` unless it already carries a
    /// terminal status. Returns whether this call performed the transition:
    /// the `true` caller owns the activation side effects.
    async fn claim_approval(&self, payment_id: &str) -> Result<bool>;

    /// Atomically records a non-approved terminal status (`rejected` or
    /// `cancelled`) unless the payment is already terminal. Returns whether
    /// this call performed the transition.
    async fn mark_terminal(&self, payment_id: &str, status: PaymentStatus) -> Result<bool>;
}
