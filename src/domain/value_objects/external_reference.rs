use std::fmt::Display;

use uuid::Uuid;

use crate::domain::value_objects::enums::plan_codes::PlanCode;

const NAMESPACE: &str = "vipgate";

/// Correlation string embedded in the outbound charge and echoed back by the
/// provider. Format: `vipgate:<user_id>:<plan_code>:<nonce>`. Parsing it is the
/// recovery path when a webhook references a payment this instance never
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub user_id: i64,
    pub plan_code: PlanCode,
    pub nonce: String,
}

impl ExternalReference {
    pub fn new(user_id: i64, plan_code: PlanCode) -> Self {
        Self {
            user_id,
            plan_code,
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(4, ':');
        let namespace = parts.next()?;
        if namespace != NAMESPACE {
            return None;
        }
        let user_id = parts.next()?.parse::<i64>().ok()?;
        let plan_code = PlanCode::from_str(parts.next()?)?;
        let nonce = parts.next()?;
        if nonce.is_empty() {
            return None;
        }
        Some(Self {
            user_id,
            plan_code,
            nonce: nonce.to_string(),
        })
    }
}

impl Display for ExternalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            NAMESPACE, self.user_id, self.plan_code, self.nonce
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let reference = ExternalReference::new(123456789, PlanCode::Monthly);
        let parsed = ExternalReference::parse(&reference.to_string()).unwrap();
        assert_eq!(parsed, reference);
    }

    #[test]
    fn rejects_foreign_namespace() {
        assert!(ExternalReference::parse("other:1:monthly:abc").is_none());
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert!(ExternalReference::parse("").is_none());
        assert!(ExternalReference::parse("vipgate").is_none());
        assert!(ExternalReference::parse("vipgate:not-a-number:monthly:abc").is_none());
        assert!(ExternalReference::parse("vipgate:1:no_such_plan:abc").is_none());
        assert!(ExternalReference::parse("vipgate:1:monthly:").is_none());
    }
}
