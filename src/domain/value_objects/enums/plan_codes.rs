use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifies a plan's duration + price tier. Renewal-tier codes carry the
/// discounted pricing and are only purchasable while the renewal offer is open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanCode {
    Weekly,
    Monthly,
    Annual,
    AnnualPromo,
    WeeklyRenewal,
    MonthlyRenewal,
    AnnualRenewal,
}

impl PlanCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCode::Weekly => "weekly",
            PlanCode::Monthly => "monthly",
            PlanCode::Annual => "annual",
            PlanCode::AnnualPromo => "annual_promo",
            PlanCode::WeeklyRenewal => "weekly_renewal",
            PlanCode::MonthlyRenewal => "monthly_renewal",
            PlanCode::AnnualRenewal => "annual_renewal",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "weekly" => Some(PlanCode::Weekly),
            "monthly" => Some(PlanCode::Monthly),
            "annual" => Some(PlanCode::Annual),
            "annual_promo" => Some(PlanCode::AnnualPromo),
            "weekly_renewal" => Some(PlanCode::WeeklyRenewal),
            "monthly_renewal" => Some(PlanCode::MonthlyRenewal),
            "annual_renewal" => Some(PlanCode::AnnualRenewal),
            _ => None,
        }
    }

    pub fn is_renewal_tier(&self) -> bool {
        matches!(
            self,
            PlanCode::WeeklyRenewal | PlanCode::MonthlyRenewal | PlanCode::AnnualRenewal
        )
    }
}

impl Display for PlanCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
