pub mod payment_statuses;
pub mod plan_codes;
pub mod subscription_statuses;
