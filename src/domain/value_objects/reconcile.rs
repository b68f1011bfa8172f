use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

/// Result of feeding one authoritative payment status through the
/// reconciliation engine.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Payment approved and the subscription activated by this call.
    Activated { expires_at: DateTime<Utc> },
    /// The terminal status had already been applied; nothing was written and
    /// no side effect fired.
    AlreadyApplied,
    /// A non-approved terminal status was recorded on the payment. The
    /// subscription is untouched.
    Recorded { status: PaymentStatus },
    /// The provider status is not terminal yet; no state change.
    Pending,
    /// The payment could not be correlated to a user/plan, even via the
    /// external reference. Requires manual intervention.
    Unmapped,
}
