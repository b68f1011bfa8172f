use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::keyed_lock::KeyedLock;
use crate::domain::entities::payments::{NewPaymentEntity, PaymentEntity};
use crate::domain::repositories::{
    access::{AccessEnforcer, SubscriberNotifier},
    payment_gateway::PixGateway,
    payments::PaymentRepository,
    subscriptions::SubscriptionRepository,
};
use crate::domain::value_objects::{
    enums::{payment_statuses::PaymentStatus, plan_codes::PlanCode},
    external_reference::ExternalReference,
    payments::ChargeDetails,
    plans::find_plan,
    reconcile::ReconcileOutcome,
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Provider fetch failed; nothing was written and the caller may retry on
    /// the next trigger.
    #[error("payment gateway unavailable: {0}")]
    Gateway(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ReconcileError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ReconcileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

/// The reconciliation engine. Both the webhook queue worker and the manual
/// poll path feed authoritative provider statuses through here; terminal
/// payment statuses are the idempotency anchor, so redelivered notifications
/// collapse into `AlreadyApplied` without re-firing side effects.
pub struct ReconcileUseCase {
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    gateway: Arc<dyn PixGateway + Send + Sync>,
    access_enforcer: Arc<dyn AccessEnforcer + Send + Sync>,
    notifier: Arc<dyn SubscriberNotifier + Send + Sync>,
    locks: KeyedLock,
}

impl ReconcileUseCase {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        gateway: Arc<dyn PixGateway + Send + Sync>,
        access_enforcer: Arc<dyn AccessEnforcer + Send + Sync>,
        notifier: Arc<dyn SubscriberNotifier + Send + Sync>,
    ) -> Self {
        Self {
            payment_repo,
            subscription_repo,
            gateway,
            access_enforcer,
            notifier,
            locks: KeyedLock::new(),
        }
    }

    /// Re-fetches the authoritative status from the provider and applies it.
    /// Webhook bodies never reach this path directly.
    pub async fn fetch_and_reconcile(&self, payment_id: &str) -> ReconcileResult<ReconcileOutcome> {
        let details = self
            .gateway
            .get_payment(payment_id)
            .await
            .map_err(|err| {
                error!(
                    payment_id,
                    error = ?err,
                    "reconcile: failed to fetch payment from provider"
                );
                ReconcileError::Gateway(err)
            })?;

        info!(
            payment_id,
            status = %details.status,
            "reconcile: authoritative status fetched"
        );

        self.reconcile(payment_id, details.status, Some(&details))
            .await
    }

    pub async fn reconcile(
        &self,
        payment_id: &str,
        authoritative_status: PaymentStatus,
        details: Option<&ChargeDetails>,
    ) -> ReconcileResult<ReconcileOutcome> {
        let _payment_guard = self.locks.acquire(&format!("payment:{payment_id}")).await;

        let payment = match self.payment_repo.find_by_id(payment_id).await? {
            Some(payment) => payment,
            None => match self.recover_payment(payment_id, details).await? {
                Some(payment) => payment,
                None => {
                    warn!(
                        payment_id,
                        "reconcile: payment could not be correlated to a user/plan"
                    );
                    return Ok(ReconcileOutcome::Unmapped);
                }
            },
        };

        let stored_status = PaymentStatus::from_str(&payment.status);

        match authoritative_status {
            PaymentStatus::Approved => self.apply_approval(&payment, stored_status).await,
            PaymentStatus::Rejected | PaymentStatus::Cancelled => {
                self.apply_failure(&payment, stored_status, authoritative_status)
                    .await
            }
            PaymentStatus::Pending | PaymentStatus::InProcess | PaymentStatus::Unknown => {
                info!(
                    payment_id = %payment.id,
                    status = %authoritative_status,
                    "reconcile: status not terminal yet; nothing to apply"
                );
                Ok(ReconcileOutcome::Pending)
            }
        }
    }

    async fn apply_approval(
        &self,
        payment: &PaymentEntity,
        stored_status: PaymentStatus,
    ) -> ReconcileResult<ReconcileOutcome> {
        let Some(plan_code) = PlanCode::from_str(&payment.plan_code) else {
            warn!(
                payment_id = %payment.id,
                plan_code = %payment.plan_code,
                "reconcile: stored plan code is not recognized"
            );
            return Ok(ReconcileOutcome::Unmapped);
        };

        let _user_guard = self
            .locks
            .acquire(&format!("user:{}", payment.user_id))
            .await;

        // The approval instant anchors the entitlement duration. On the fresh
        // claim that is now; when converging after a partial write it is the
        // instant the approval was recorded.
        let approval_instant: DateTime<Utc>;

        if stored_status == PaymentStatus::Approved {
            let subscription = self.subscription_repo.find_by_user(payment.user_id).await?;
            let linked = subscription
                .as_ref()
                .and_then(|sub| sub.last_payment_id.as_deref())
                == Some(payment.id.as_str());
            if linked {
                info!(
                    payment_id = %payment.id,
                    user_id = payment.user_id,
                    "reconcile: approval already applied"
                );
                return Ok(ReconcileOutcome::AlreadyApplied);
            }
            if subscription
                .map(|sub| sub.updated_at > payment.updated_at)
                .unwrap_or(false)
            {
                // The subscription moved past this approval (e.g. a newer
                // renewal); a stale redelivery must not resurrect it.
                info!(
                    payment_id = %payment.id,
                    user_id = payment.user_id,
                    "reconcile: approval superseded by a later subscription write"
                );
                return Ok(ReconcileOutcome::AlreadyApplied);
            }
            warn!(
                payment_id = %payment.id,
                user_id = payment.user_id,
                "reconcile: approved payment not reflected on subscription; converging"
            );
            approval_instant = payment.updated_at;
        } else if stored_status.is_terminal() {
            warn!(
                payment_id = %payment.id,
                stored_status = %stored_status,
                "reconcile: provider reports approved but a different terminal status is stored"
            );
            return Ok(ReconcileOutcome::AlreadyApplied);
        } else {
            let claimed = self.payment_repo.claim_approval(&payment.id).await?;
            if !claimed {
                info!(
                    payment_id = %payment.id,
                    "reconcile: approval already claimed by a concurrent writer"
                );
                return Ok(ReconcileOutcome::AlreadyApplied);
            }
            approval_instant = Utc::now();
        }

        let plan = find_plan(plan_code);
        let expires_at = approval_instant + plan.duration();

        self.subscription_repo
            .activate(payment.user_id, plan_code, expires_at, &payment.id)
            .await?;

        info!(
            payment_id = %payment.id,
            user_id = payment.user_id,
            plan_code = %plan_code,
            expires_at = %expires_at,
            "reconcile: subscription activated"
        );

        // The transition is committed; grant/notify failures are logged and
        // left to out-of-band retry.
        if let Err(err) = self.access_enforcer.grant_access(payment.user_id).await {
            error!(
                user_id = payment.user_id,
                error = ?err,
                "reconcile: failed to grant access after activation"
            );
        }
        if let Err(err) = self
            .notifier
            .payment_approved(payment.user_id, &plan, expires_at)
            .await
        {
            error!(
                user_id = payment.user_id,
                error = ?err,
                "reconcile: failed to notify user of approved payment"
            );
        }

        Ok(ReconcileOutcome::Activated { expires_at })
    }

    async fn apply_failure(
        &self,
        payment: &PaymentEntity,
        stored_status: PaymentStatus,
        authoritative_status: PaymentStatus,
    ) -> ReconcileResult<ReconcileOutcome> {
        if stored_status.is_terminal() {
            info!(
                payment_id = %payment.id,
                stored_status = %stored_status,
                "reconcile: terminal status already recorded"
            );
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let recorded = self
            .payment_repo
            .mark_terminal(&payment.id, authoritative_status)
            .await?;
        if !recorded {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        info!(
            payment_id = %payment.id,
            user_id = payment.user_id,
            status = %authoritative_status,
            "reconcile: payment failure recorded; subscription untouched"
        );

        Ok(ReconcileOutcome::Recorded {
            status: authoritative_status,
        })
    }

    /// A notification may reference a charge this instance never recorded.
    /// The external reference embedded at charge creation carries enough to
    /// rebuild the record.
    async fn recover_payment(
        &self,
        payment_id: &str,
        details: Option<&ChargeDetails>,
    ) -> ReconcileResult<Option<PaymentEntity>> {
        let Some(details) = details else {
            return Ok(None);
        };
        let Some(raw_reference) = details.external_reference.as_deref() else {
            warn!(
                payment_id,
                "reconcile: unknown payment carries no external reference"
            );
            return Ok(None);
        };
        let Some(reference) = ExternalReference::parse(raw_reference) else {
            warn!(
                payment_id,
                external_reference = raw_reference,
                "reconcile: external reference did not parse"
            );
            return Ok(None);
        };

        let plan = find_plan(reference.plan_code);
        info!(
            payment_id,
            user_id = reference.user_id,
            plan_code = %reference.plan_code,
            "reconcile: rebuilding missing payment record from external reference"
        );

        self.payment_repo
            .create(NewPaymentEntity {
                id: payment_id.to_string(),
                user_id: reference.user_id,
                plan_code: reference.plan_code.to_string(),
                amount_minor: details.amount_minor.unwrap_or(plan.amount_minor),
                status: PaymentStatus::Pending.to_string(),
                external_reference: raw_reference.to_string(),
            })
            .await?;

        Ok(self.payment_repo.find_by_id(payment_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::domain::entities::subscriptions::SubscriptionEntity;
    use crate::domain::repositories::{
        access::{MockAccessEnforcer, MockSubscriberNotifier},
        payment_gateway::MockPixGateway,
        payments::MockPaymentRepository,
        subscriptions::MockSubscriptionRepository,
    };
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

    fn sample_payment(status: PaymentStatus) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: "pay-1".to_string(),
            user_id: 42,
            plan_code: PlanCode::Monthly.to_string(),
            amount_minor: 2990,
            status: status.to_string(),
            external_reference: "vipgate:42:monthly:abc".to_string(),
            created_at: now - Duration::minutes(5),
            updated_at: now - Duration::minutes(1),
        }
    }

    fn sample_subscription(user_id: i64, last_payment_id: Option<&str>) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            user_id,
            status: SubscriptionStatus::Active.to_string(),
            plan_code: Some(PlanCode::Monthly.to_string()),
            expires_at: Some(now + Duration::days(20)),
            renewal_offer_until: None,
            last_payment_id: last_payment_id.map(|id| id.to_string()),
            created_at: now - Duration::days(10),
            updated_at: now - Duration::days(10),
        }
    }

    fn usecase(
        payment_repo: MockPaymentRepository,
        subscription_repo: MockSubscriptionRepository,
        gateway: MockPixGateway,
        enforcer: MockAccessEnforcer,
        notifier: MockSubscriberNotifier,
    ) -> ReconcileUseCase {
        ReconcileUseCase::new(
            Arc::new(payment_repo),
            Arc::new(subscription_repo),
            Arc::new(gateway),
            Arc::new(enforcer),
            Arc::new(notifier),
        )
    }

    #[tokio::test]
    async fn approval_activates_subscription_and_fires_side_effects_once() {
        let mut payment_repo = MockPaymentRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut enforcer = MockAccessEnforcer::new();
        let mut notifier = MockSubscriberNotifier::new();

        let payment = sample_payment(PaymentStatus::Pending);
        payment_repo
            .expect_find_by_id()
            .withf(|id| id == "pay-1")
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        payment_repo
            .expect_claim_approval()
            .withf(|id| id == "pay-1")
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));

        let before = Utc::now();
        subscription_repo
            .expect_activate()
            .withf(move |user_id, plan_code, expires_at, last_payment_id| {
                let lower = before + Duration::days(30);
                let upper = Utc::now() + Duration::days(30);
                *user_id == 42
                    && *plan_code == PlanCode::Monthly
                    && *expires_at >= lower
                    && *expires_at <= upper
                    && last_payment_id == "pay-1"
            })
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(()) }));

        enforcer
            .expect_grant_access()
            .withf(|user_id| *user_id == 42)
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        notifier
            .expect_payment_approved()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let usecase = usecase(
            payment_repo,
            subscription_repo,
            MockPixGateway::new(),
            enforcer,
            notifier,
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
    }

    #[tokio::test]
    async fn redelivered_approval_is_a_no_op() {
        let mut payment_repo = MockPaymentRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();

        let payment = sample_payment(PaymentStatus::Approved);
        let mut subscription = sample_subscription(42, Some("pay-1"));
        subscription.updated_at = Utc::now();

        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        subscription_repo
            .expect_find_by_user()
            .withf(|user_id| *user_id == 42)
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(Some(subscription)) })
            });

        // No enforcer/notifier expectations: a second grant or notification
        // would panic the mock.
        let usecase = usecase(
            payment_repo,
            subscription_repo,
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn lost_claim_race_does_not_double_apply() {
        let mut payment_repo = MockPaymentRepository::new();

        let payment = sample_payment(PaymentStatus::Pending);
        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        payment_repo
            .expect_claim_approval()
            .returning(|_| Box::pin(async { Ok(false) }));

        let usecase = usecase(
            payment_repo,
            MockSubscriptionRepository::new(),
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn rejected_payment_never_touches_the_subscription() {
        let mut payment_repo = MockPaymentRepository::new();

        let payment = sample_payment(PaymentStatus::Pending);
        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        payment_repo
            .expect_mark_terminal()
            .withf(|id, status| id == "pay-1" && *status == PaymentStatus::Rejected)
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(true) }));

        // Subscription repo has no expectations; any call would panic.
        let usecase = usecase(
            payment_repo,
            MockSubscriptionRepository::new(),
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Rejected, None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Recorded {
                status: PaymentStatus::Rejected
            }
        );
    }

    #[tokio::test]
    async fn non_terminal_status_changes_nothing() {
        let mut payment_repo = MockPaymentRepository::new();

        let payment = sample_payment(PaymentStatus::Pending);
        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });

        let usecase = usecase(
            payment_repo,
            MockSubscriptionRepository::new(),
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::InProcess, None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Pending);
    }

    #[tokio::test]
    async fn unknown_payment_without_reference_is_unmapped() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = usecase(
            payment_repo,
            MockSubscriptionRepository::new(),
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-404", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unmapped);
    }

    #[tokio::test]
    async fn unknown_payment_recovers_through_external_reference() {
        let mut payment_repo = MockPaymentRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut enforcer = MockAccessEnforcer::new();
        let mut notifier = MockSubscriberNotifier::new();

        let mut recovered = sample_payment(PaymentStatus::Pending);
        recovered.id = "pay-9".to_string();

        let mut first_lookup = true;
        payment_repo.expect_find_by_id().returning(move |_| {
            if first_lookup {
                first_lookup = false;
                Box::pin(async { Ok(None) })
            } else {
                let payment = recovered.clone();
                Box::pin(async move { Ok(Some(payment)) })
            }
        });
        payment_repo
            .expect_create()
            .withf(|record| {
                record.id == "pay-9"
                    && record.user_id == 42
                    && record.plan_code == "monthly"
                    && record.status == "pending"
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        payment_repo
            .expect_claim_approval()
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));

        subscription_repo
            .expect_activate()
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(()) }));
        enforcer
            .expect_grant_access()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        notifier
            .expect_payment_approved()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let details = ChargeDetails {
            payment_id: "pay-9".to_string(),
            status: PaymentStatus::Approved,
            amount_minor: Some(2990),
            external_reference: Some("vipgate:42:monthly:abc".to_string()),
            approved_at: Some(Utc::now()),
        };

        let usecase = usecase(
            payment_repo,
            subscription_repo,
            MockPixGateway::new(),
            enforcer,
            notifier,
        );

        let outcome = usecase
            .reconcile("pay-9", PaymentStatus::Approved, Some(&details))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
    }

    #[tokio::test]
    async fn partial_write_converges_on_retry() {
        let mut payment_repo = MockPaymentRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut enforcer = MockAccessEnforcer::new();
        let mut notifier = MockSubscriberNotifier::new();

        // Approval was recorded but the subscription write never landed.
        let payment = sample_payment(PaymentStatus::Approved);
        let approval_instant = payment.updated_at;
        let mut stale_subscription = sample_subscription(42, None);
        stale_subscription.updated_at = approval_instant - Duration::days(5);

        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        subscription_repo
            .expect_find_by_user()
            .returning(move |_| {
                let subscription = stale_subscription.clone();
                Box::pin(async move { Ok(Some(subscription)) })
            });
        subscription_repo
            .expect_activate()
            .withf(move |_, _, expires_at, last_payment_id| {
                // Duration anchored to the recorded approval instant, not the
                // retry instant.
                *expires_at == approval_instant + Duration::days(30) && last_payment_id == "pay-1"
            })
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(()) }));
        enforcer
            .expect_grant_access()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        notifier
            .expect_payment_approved()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let usecase = usecase(
            payment_repo,
            subscription_repo,
            MockPixGateway::new(),
            enforcer,
            notifier,
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
    }

    #[tokio::test]
    async fn stale_redelivery_does_not_resurrect_a_superseded_approval() {
        let mut payment_repo = MockPaymentRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();

        let payment = sample_payment(PaymentStatus::Approved);
        // A later renewal already moved the subscription to another payment.
        let mut subscription = sample_subscription(42, Some("pay-2"));
        subscription.updated_at = Utc::now();

        payment_repo
            .expect_find_by_id()
            .returning(move |_| {
                let payment = payment.clone();
                Box::pin(async move { Ok(Some(payment)) })
            });
        subscription_repo
            .expect_find_by_user()
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(Some(subscription)) })
            });

        let usecase = usecase(
            payment_repo,
            subscription_repo,
            MockPixGateway::new(),
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let outcome = usecase
            .reconcile("pay-1", PaymentStatus::Approved, None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn gateway_failure_aborts_without_writing() {
        let mut gateway = MockPixGateway::new();
        gateway
            .expect_get_payment()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("connect timeout")) }));

        let usecase = usecase(
            MockPaymentRepository::new(),
            MockSubscriptionRepository::new(),
            gateway,
            MockAccessEnforcer::new(),
            MockSubscriberNotifier::new(),
        );

        let err = usecase.fetch_and_reconcile("pay-1").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Gateway(_)));
    }
}
