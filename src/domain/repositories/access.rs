use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::value_objects::plans::Plan;

/// Grants/revokes the protected resource (the private group). Invoked after a
/// state transition is durably committed; failures are logged by the caller
/// and never undo the transition.
#[async_trait]
#[automock]
pub trait AccessEnforcer {
    async fn grant_access(&self, user_id: i64) -> Result<()>;

    async fn revoke_access(&self, user_id: i64) -> Result<()>;
}

/// Pushes lifecycle messages to the subscriber over the messaging channel.
#[async_trait]
#[automock]
pub trait SubscriberNotifier {
    async fn payment_approved(
        &self,
        user_id: i64,
        plan: &Plan,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn renewal_offer(&self, user_id: i64, offer_until: DateTime<Utc>) -> Result<()>;

    async fn subscription_expired(&self, user_id: i64) -> Result<()>;
}
