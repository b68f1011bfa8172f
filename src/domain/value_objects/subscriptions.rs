use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::{
    plan_codes::PlanCode, subscription_statuses::SubscriptionStatus,
};
use crate::domain::value_objects::plans::Plan;

#[derive(Debug, Serialize)]
pub struct PlanOfferDto {
    pub plan_code: PlanCode,
    pub name: &'static str,
    pub amount_minor: i32,
    pub duration_days: i64,
}

impl From<Plan> for PlanOfferDto {
    fn from(value: Plan) -> Self {
        Self {
            plan_code: value.code,
            name: value.name,
            amount_minor: value.amount_minor,
            duration_days: value.duration_days,
        }
    }
}

/// Answer to `start_or_renew`: where the user stands plus the menu that
/// applies to that state.
#[derive(Debug, Serialize)]
pub struct SubscriptionMenuDto {
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub renewal_offer_until: Option<DateTime<Utc>>,
    pub plan_menu: Vec<PlanOfferDto>,
}

#[derive(Debug, Deserialize)]
pub struct StartOrRenewRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RequestPaymentRequest {
    pub user_id: i64,
    pub plan_code: PlanCode,
}

#[derive(Debug, Serialize)]
pub struct PixCheckoutDto {
    pub payment_id: String,
    pub qr_payload: Option<String>,
    pub checkout_url: Option<String>,
}
