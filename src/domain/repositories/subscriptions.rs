use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::plan_codes::PlanCode;

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<SubscriptionEntity>>;

    /// Lazily creates the record with status `none` on first interaction.
    async fn ensure_exists(&self, user_id: i64) -> Result<SubscriptionEntity>;

    /// Moves `none`/`expired` to `pending` when a purchase is requested.
    /// A live entitlement (active/renewal_window) is left untouched.
    async fn mark_pending(&self, user_id: i64) -> Result<()>;

    /// Activation upsert: status `active`, the plan and expiry computed from
    /// the approval instant, `renewal_offer_until` cleared, and the approving
    /// payment linked.
    async fn activate(
        &self,
        user_id: i64,
        plan_code: PlanCode,
        expires_at: DateTime<Utc>,
        last_payment_id: &str,
    ) -> Result<()>;

    /// Opens the renewal window iff it was never opened for this entitlement
    /// (`renewal_offer_until IS NULL`) and the record is still active with a
    /// future expiry. Returns whether this call opened it.
    async fn open_renewal_window(
        &self,
        user_id: i64,
        offer_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Retires the entitlement iff it is live and `expires_at <= now`,
    /// clearing `plan_code`, `expires_at` and `renewal_offer_until`. Returns
    /// whether this call performed the transition.
    async fn expire(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool>;

    /// All records the sweeper must visit: live entitlements with a non-null
    /// expiry.
    async fn list_sweep_candidates(&self) -> Result<Vec<SubscriptionEntity>>;
}
