use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::subscriptions;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
#[diesel(primary_key(user_id))]
pub struct SubscriptionEntity {
    pub user_id: i64,
    pub status: String,
    pub plan_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub renewal_offer_until: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: i64,
    pub status: String,
}
