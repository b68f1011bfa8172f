use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::domain::entities::payments::{NewPaymentEntity, PaymentEntity};
use crate::domain::repositories::payments::PaymentRepository;
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payments};

const TERMINAL_STATUSES: [&str; 3] = ["approved", "rejected", "cancelled"];

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn find_by_id(&self, payment_id: &str) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payments::table
            .filter(payments::id.eq(payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, payment: NewPaymentEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(payments::table)
            .values(&payment)
            .on_conflict(payments::id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    async fn claim_approval(&self, payment_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The conditional update is the atomic claim: whoever flips the row
        // out of a non-terminal status owns the activation side effects.
        let updated = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.ne_all(TERMINAL_STATUSES))
            .set((
                payments::status.eq(PaymentStatus::Approved.to_string()),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn mark_terminal(&self, payment_id: &str, status: PaymentStatus) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.ne_all(TERMINAL_STATUSES))
            .set((
                payments::status.eq(status.to_string()),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }
}
