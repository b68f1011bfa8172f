use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::payments::{ChargeDetails, CreateChargeRequest, CreatedCharge};

/// Boundary to the PIX payment provider. The reconciliation engine only ever
/// trusts statuses fetched through `get_payment`, never webhook bodies.
#[async_trait]
#[automock]
pub trait PixGateway {
    async fn create_payment(&self, request: CreateChargeRequest) -> Result<CreatedCharge>;

    async fn get_payment(&self, payment_id: &str) -> Result<ChargeDetails>;
}
