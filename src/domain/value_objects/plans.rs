use chrono::Duration;
use serde::Serialize;

use crate::domain::value_objects::enums::plan_codes::PlanCode;

/// A purchasable plan offer. The catalog lives in code: the reconciliation
/// core persists only payments and subscriptions.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Plan {
    pub code: PlanCode,
    pub name: &'static str,
    pub amount_minor: i32,
    pub duration_days: i64,
}

impl Plan {
    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days)
    }
}

/// Menu shown to users without a live entitlement.
pub const PLANS_INITIAL: [Plan; 4] = [
    Plan {
        code: PlanCode::Weekly,
        name: "Plano Semanal",
        amount_minor: 1990,
        duration_days: 7,
    },
    Plan {
        code: PlanCode::Monthly,
        name: "Plano Mensal",
        amount_minor: 2990,
        duration_days: 30,
    },
    Plan {
        code: PlanCode::Annual,
        name: "Plano Anual",
        amount_minor: 3990,
        duration_days: 365,
    },
    Plan {
        code: PlanCode::AnnualPromo,
        name: "Plano Anual Promocional",
        amount_minor: 2999,
        duration_days: 365,
    },
];

/// Discounted menu, offered only while the renewal window is open.
pub const PLANS_RENEWAL: [Plan; 3] = [
    Plan {
        code: PlanCode::WeeklyRenewal,
        name: "Plano Semanal (Renova\u{e7}\u{e3}o)",
        amount_minor: 1090,
        duration_days: 7,
    },
    Plan {
        code: PlanCode::MonthlyRenewal,
        name: "Plano Mensal (Renova\u{e7}\u{e3}o)",
        amount_minor: 1590,
        duration_days: 30,
    },
    Plan {
        code: PlanCode::AnnualRenewal,
        name: "Plano Anual (Renova\u{e7}\u{e3}o)",
        amount_minor: 1990,
        duration_days: 365,
    },
];

pub fn find_plan(code: PlanCode) -> Plan {
    match code {
        PlanCode::Weekly => PLANS_INITIAL[0],
        PlanCode::Monthly => PLANS_INITIAL[1],
        PlanCode::Annual => PLANS_INITIAL[2],
        PlanCode::AnnualPromo => PLANS_INITIAL[3],
        PlanCode::WeeklyRenewal => PLANS_RENEWAL[0],
        PlanCode::MonthlyRenewal => PLANS_RENEWAL[1],
        PlanCode::AnnualRenewal => PLANS_RENEWAL[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_plan_code_resolves_to_its_catalog_entry() {
        let codes = [
            PlanCode::Weekly,
            PlanCode::Monthly,
            PlanCode::Annual,
            PlanCode::AnnualPromo,
            PlanCode::WeeklyRenewal,
            PlanCode::MonthlyRenewal,
            PlanCode::AnnualRenewal,
        ];
        for code in codes {
            let plan = find_plan(code);
            assert_eq!(plan.code, code);
            assert!(plan.amount_minor > 0);
            assert!(plan.duration_days > 0);
        }
    }

    #[test]
    fn renewal_tier_is_cheaper_than_initial_tier() {
        assert!(
            find_plan(PlanCode::WeeklyRenewal).amount_minor
                < find_plan(PlanCode::Weekly).amount_minor
        );
        assert!(
            find_plan(PlanCode::MonthlyRenewal).amount_minor
                < find_plan(PlanCode::Monthly).amount_minor
        );
        assert!(
            find_plan(PlanCode::AnnualRenewal).amount_minor
                < find_plan(PlanCode::Annual).amount_minor
        );
    }
}
