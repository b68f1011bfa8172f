use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::usecases::reconcile::{ReconcileError, ReconcileUseCase};
use crate::domain::entities::payments::NewPaymentEntity;
use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::repositories::{
    payment_gateway::PixGateway, payments::PaymentRepository,
    subscriptions::SubscriptionRepository,
};
use crate::domain::value_objects::{
    enums::{plan_codes::PlanCode, subscription_statuses::SubscriptionStatus},
    external_reference::ExternalReference,
    payments::CreateChargeRequest,
    plans::{PLANS_INITIAL, PLANS_RENEWAL, find_plan},
    reconcile::ReconcileOutcome,
    subscriptions::{PixCheckoutDto, PlanOfferDto, SubscriptionMenuDto},
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("plan is not available for this subscription state")]
    PlanNotAvailable,
    #[error("payment gateway request failed")]
    GatewayFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::PlanNotAvailable => StatusCode::BAD_REQUEST,
            SubscriptionError::GatewayFailed(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

/// Operations the messaging front-end drives: menu selection, opening a PIX
/// charge, and the manual payment poll.
pub struct SubscriptionUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    gateway: Arc<dyn PixGateway + Send + Sync>,
    reconcile: Arc<ReconcileUseCase>,
    payer_email_domain: String,
}

impl SubscriptionUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        gateway: Arc<dyn PixGateway + Send + Sync>,
        reconcile: Arc<ReconcileUseCase>,
        payer_email_domain: String,
    ) -> Self {
        Self {
            subscription_repo,
            payment_repo,
            gateway,
            reconcile,
            payer_email_domain,
        }
    }

    /// Lazily creates the subscription record and returns the menu matching
    /// its state: the discounted renewal menu while the offer is open, the
    /// initial menu otherwise.
    pub async fn start_or_renew(&self, user_id: i64) -> UseCaseResult<SubscriptionMenuDto> {
        let subscription = self
            .subscription_repo
            .ensure_exists(user_id)
            .await
            .map_err(|err| {
                error!(user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        let status = SubscriptionStatus::from_str(&subscription.status);
        let renewal_open = Self::renewal_offer_open(&subscription);
        let menu: Vec<PlanOfferDto> = if renewal_open {
            PLANS_RENEWAL.iter().copied().map(Into::into).collect()
        } else {
            PLANS_INITIAL.iter().copied().map(Into::into).collect()
        };

        info!(
            user_id,
            status = %status,
            renewal_open,
            "subscriptions: menu resolved"
        );

        Ok(SubscriptionMenuDto {
            status,
            expires_at: subscription.expires_at,
            renewal_offer_until: subscription.renewal_offer_until,
            plan_menu: menu,
        })
    }

    /// Opens a PIX charge for the chosen plan, records the pending payment and
    /// moves a dormant subscription to `pending`. A live entitlement stays as
    /// it is until the renewal payment is actually approved.
    pub async fn request_payment(
        &self,
        user_id: i64,
        plan_code: PlanCode,
    ) -> UseCaseResult<PixCheckoutDto> {
        let subscription = self
            .subscription_repo
            .ensure_exists(user_id)
            .await
            .map_err(|err| {
                error!(user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        if plan_code.is_renewal_tier() && !Self::renewal_offer_open(&subscription) {
            warn!(
                user_id,
                plan_code = %plan_code,
                "subscriptions: renewal-tier plan requested outside the renewal window"
            );
            return Err(SubscriptionError::PlanNotAvailable);
        }

        let plan = find_plan(plan_code);
        let reference = ExternalReference::new(user_id, plan_code);
        let request = CreateChargeRequest {
            amount_minor: plan.amount_minor,
            description: format!("{} - Prime VIP", plan.name),
            payer_email: format!("user-{}@{}", user_id, self.payer_email_domain),
            external_reference: reference.to_string(),
        };

        info!(
            user_id,
            plan_code = %plan_code,
            amount_minor = plan.amount_minor,
            "subscriptions: creating PIX charge"
        );

        let charge = self.gateway.create_payment(request).await.map_err(|err| {
            error!(
                user_id,
                plan_code = %plan_code,
                error = ?err,
                "subscriptions: PIX charge creation failed"
            );
            SubscriptionError::GatewayFailed(err)
        })?;

        self.payment_repo
            .create(NewPaymentEntity {
                id: charge.payment_id.clone(),
                user_id,
                plan_code: plan_code.to_string(),
                amount_minor: plan.amount_minor,
                status: charge.status.to_string(),
                external_reference: reference.to_string(),
            })
            .await
            .map_err(|err| {
                error!(
                    user_id,
                    payment_id = %charge.payment_id,
                    db_error = ?err,
                    "subscriptions: failed to record pending payment"
                );
                SubscriptionError::Internal(err)
            })?;

        self.subscription_repo
            .mark_pending(user_id)
            .await
            .map_err(|err| {
                error!(
                    user_id,
                    db_error = ?err,
                    "subscriptions: failed to mark subscription pending"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(
            user_id,
            payment_id = %charge.payment_id,
            "subscriptions: PIX charge created"
        );

        Ok(PixCheckoutDto {
            payment_id: charge.payment_id,
            qr_payload: charge.qr_payload,
            checkout_url: charge.checkout_url,
        })
    }

    /// Manual poll. Runs the same engine the webhook path uses.
    pub async fn check_payment(&self, payment_id: &str) -> UseCaseResult<ReconcileOutcome> {
        self.reconcile
            .fetch_and_reconcile(payment_id)
            .await
            .map_err(|err| match err {
                ReconcileError::Gateway(inner) => SubscriptionError::GatewayFailed(inner),
                ReconcileError::Internal(inner) => SubscriptionError::Internal(inner),
            })
    }

    fn renewal_offer_open(subscription: &SubscriptionEntity) -> bool {
        let status = SubscriptionStatus::from_str(&subscription.status);
        status.is_entitled()
            && subscription
                .renewal_offer_until
                .map(|until| Utc::now() <= until)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::domain::repositories::{
        access::{MockAccessEnforcer, MockSubscriberNotifier},
        payment_gateway::MockPixGateway,
        payments::MockPaymentRepository,
        subscriptions::MockSubscriptionRepository,
    };
    use crate::domain::value_objects::payments::CreatedCharge;
    use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

    fn subscription_with(
        status: SubscriptionStatus,
        renewal_offer_until: Option<chrono::DateTime<Utc>>,
    ) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            user_id: 42,
            status: status.to_string(),
            plan_code: None,
            expires_at: matches!(
                status,
                SubscriptionStatus::Active | SubscriptionStatus::RenewalWindow
            )
            .then(|| now + Duration::hours(20)),
            renewal_offer_until,
            last_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn reconcile_stub() -> Arc<ReconcileUseCase> {
        Arc::new(ReconcileUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockPixGateway::new()),
            Arc::new(MockAccessEnforcer::new()),
            Arc::new(MockSubscriberNotifier::new()),
        ))
    }

    fn usecase(
        subscription_repo: MockSubscriptionRepository,
        payment_repo: MockPaymentRepository,
        gateway: MockPixGateway,
    ) -> SubscriptionUseCase {
        SubscriptionUseCase::new(
            Arc::new(subscription_repo),
            Arc::new(payment_repo),
            Arc::new(gateway),
            reconcile_stub(),
            "vip.example".to_string(),
        )
    }

    #[tokio::test]
    async fn new_user_gets_the_initial_menu() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_ensure_exists()
            .withf(|user_id| *user_id == 42)
            .returning(|_| {
                Box::pin(async {
                    Ok(subscription_with(SubscriptionStatus::None, None))
                })
            });

        let usecase = usecase(
            subscription_repo,
            MockPaymentRepository::new(),
            MockPixGateway::new(),
        );

        let menu = usecase.start_or_renew(42).await.unwrap();
        assert_eq!(menu.status, SubscriptionStatus::None);
        assert_eq!(menu.plan_menu.len(), PLANS_INITIAL.len());
        assert!(!menu.plan_menu[0].plan_code.is_renewal_tier());
    }

    #[tokio::test]
    async fn open_renewal_window_switches_to_the_discounted_menu() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_ensure_exists().returning(|_| {
            Box::pin(async {
                Ok(subscription_with(
                    SubscriptionStatus::RenewalWindow,
                    Some(Utc::now() + Duration::hours(10)),
                ))
            })
        });

        let usecase = usecase(
            subscription_repo,
            MockPaymentRepository::new(),
            MockPixGateway::new(),
        );

        let menu = usecase.start_or_renew(42).await.unwrap();
        assert_eq!(menu.status, SubscriptionStatus::RenewalWindow);
        assert_eq!(menu.plan_menu.len(), PLANS_RENEWAL.len());
        assert!(menu.plan_menu.iter().all(|offer| offer.plan_code.is_renewal_tier()));
    }

    #[tokio::test]
    async fn lapsed_offer_falls_back_to_the_initial_menu() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_ensure_exists().returning(|_| {
            Box::pin(async {
                Ok(subscription_with(
                    SubscriptionStatus::RenewalWindow,
                    Some(Utc::now() - Duration::minutes(5)),
                ))
            })
        });

        let usecase = usecase(
            subscription_repo,
            MockPaymentRepository::new(),
            MockPixGateway::new(),
        );

        let menu = usecase.start_or_renew(42).await.unwrap();
        assert_eq!(menu.plan_menu.len(), PLANS_INITIAL.len());
    }

    #[tokio::test]
    async fn request_payment_records_pending_payment_and_subscription() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut payment_repo = MockPaymentRepository::new();
        let mut gateway = MockPixGateway::new();

        subscription_repo
            .expect_ensure_exists()
            .returning(|_| {
                Box::pin(async { Ok(subscription_with(SubscriptionStatus::None, None)) })
            });
        gateway
            .expect_create_payment()
            .withf(|request| {
                request.amount_minor == 2990
                    && request.description == "Plano Mensal - Prime VIP"
                    && request.payer_email == "user-42@vip.example"
                    && request.external_reference.starts_with("vipgate:42:monthly:")
            })
            .times(1)
            .returning(|_| {
                Box::pin(async {
                    Ok(CreatedCharge {
                        payment_id: "pay-7".to_string(),
                        status: PaymentStatus::Pending,
                        qr_payload: Some("000201pix-code".to_string()),
                        checkout_url: Some("https://provider.example/t/pay-7".to_string()),
                    })
                })
            });
        payment_repo
            .expect_create()
            .withf(|record| {
                record.id == "pay-7"
                    && record.user_id == 42
                    && record.plan_code == "monthly"
                    && record.amount_minor == 2990
                    && record.status == "pending"
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        subscription_repo
            .expect_mark_pending()
            .withf(|user_id| *user_id == 42)
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = usecase(subscription_repo, payment_repo, gateway);
        let checkout = usecase
            .request_payment(42, PlanCode::Monthly)
            .await
            .unwrap();

        assert_eq!(checkout.payment_id, "pay-7");
        assert_eq!(checkout.qr_payload.as_deref(), Some("000201pix-code"));
    }

    #[tokio::test]
    async fn renewal_tier_is_rejected_outside_the_window() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_ensure_exists()
            .returning(|_| {
                Box::pin(async { Ok(subscription_with(SubscriptionStatus::Active, None)) })
            });

        // Gateway and payment repo must never be reached.
        let usecase = usecase(
            subscription_repo,
            MockPaymentRepository::new(),
            MockPixGateway::new(),
        );

        let err = usecase
            .request_payment(42, PlanCode::MonthlyRenewal)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::PlanNotAvailable));
    }

    #[tokio::test]
    async fn gateway_failure_surfaces_as_retryable_and_writes_nothing() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut gateway = MockPixGateway::new();

        subscription_repo
            .expect_ensure_exists()
            .returning(|_| {
                Box::pin(async { Ok(subscription_with(SubscriptionStatus::None, None)) })
            });
        gateway
            .expect_create_payment()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("request timed out")) }));

        // Payment repo has no expectations; a write would panic the mock.
        let usecase = usecase(subscription_repo, MockPaymentRepository::new(), gateway);

        let err = usecase
            .request_payment(42, PlanCode::Weekly)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::GatewayFailed(_)));
    }
}
