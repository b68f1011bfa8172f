use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::domain::value_objects::enums::{
    plan_codes::PlanCode, subscription_statuses::SubscriptionStatus,
};
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn ensure_exists(&self, user_id: i64) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(subscriptions::table)
            .values(&InsertSubscriptionEntity {
                user_id,
                status: SubscriptionStatus::None.to_string(),
            })
            .on_conflict(subscriptions::user_id)
            .do_nothing()
            .execute(&mut conn)?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn mark_pending(&self, user_id: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // A live entitlement is never downgraded by a purchase request.
        update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::status.eq_any([
                SubscriptionStatus::None.to_string(),
                SubscriptionStatus::Expired.to_string(),
            ]))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Pending.to_string()),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn activate(
        &self,
        user_id: i64,
        plan_code: PlanCode,
        expires_at: DateTime<Utc>,
        last_payment_id: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Upsert: recovery activations may precede the lazy row creation.
        insert_into(subscriptions::table)
            .values((
                subscriptions::user_id.eq(user_id),
                subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                subscriptions::plan_code.eq(Some(plan_code.to_string())),
                subscriptions::expires_at.eq(Some(expires_at)),
                subscriptions::renewal_offer_until.eq(None::<DateTime<Utc>>),
                subscriptions::last_payment_id.eq(Some(last_payment_id.to_string())),
            ))
            .on_conflict(subscriptions::user_id)
            .do_update()
            .set((
                subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                subscriptions::plan_code.eq(Some(plan_code.to_string())),
                subscriptions::expires_at.eq(Some(expires_at)),
                subscriptions::renewal_offer_until.eq(None::<DateTime<Utc>>),
                subscriptions::last_payment_id.eq(Some(last_payment_id.to_string())),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn open_renewal_window(
        &self,
        user_id: i64,
        offer_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // `renewal_offer_until IS NULL` makes the window open-once per
        // entitlement; a concurrent tick loses the conditional update.
        let updated = update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .filter(subscriptions::renewal_offer_until.is_null())
            .filter(subscriptions::expires_at.gt(Some(now)))
            .set((
                subscriptions::status.eq(SubscriptionStatus::RenewalWindow.to_string()),
                subscriptions::renewal_offer_until.eq(Some(offer_until)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn expire(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::status.eq_any([
                SubscriptionStatus::Active.to_string(),
                SubscriptionStatus::RenewalWindow.to_string(),
            ]))
            .filter(subscriptions::expires_at.le(Some(now)))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Expired.to_string()),
                subscriptions::plan_code.eq(None::<String>),
                subscriptions::expires_at.eq(None::<DateTime<Utc>>),
                subscriptions::renewal_offer_until.eq(None::<DateTime<Utc>>),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .filter(subscriptions::status.eq_any([
                SubscriptionStatus::Active.to_string(),
                SubscriptionStatus::RenewalWindow.to_string(),
            ]))
            .filter(subscriptions::expires_at.is_not_null())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }
}
