use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Pending,
    Active,
    RenewalWindow,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::RenewalWindow => "renewal_window",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "none" => SubscriptionStatus::None,
            "pending" => SubscriptionStatus::Pending,
            "active" => SubscriptionStatus::Active,
            "renewal_window" => SubscriptionStatus::RenewalWindow,
            "expired" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::None,
        }
    }

    /// Statuses that carry a live entitlement and must be visited by the sweeper.
    pub fn is_entitled(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::RenewalWindow
        )
    }
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
