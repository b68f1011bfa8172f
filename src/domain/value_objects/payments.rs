use chrono::{DateTime, Utc};

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

/// Outbound request to open a PIX charge at the provider.
#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub amount_minor: i32,
    pub description: String,
    pub payer_email: String,
    pub external_reference: String,
}

/// Provider response for a freshly created charge.
#[derive(Debug, Clone)]
pub struct CreatedCharge {
    pub payment_id: String,
    pub status: PaymentStatus,
    /// PIX copy-and-paste payload.
    pub qr_payload: Option<String>,
    pub checkout_url: Option<String>,
}

/// Authoritative charge state fetched back from the provider.
#[derive(Debug, Clone)]
pub struct ChargeDetails {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub amount_minor: Option<i32>,
    pub external_reference: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}
