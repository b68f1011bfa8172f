use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::repositories::access::{AccessEnforcer, SubscriberNotifier};
use crate::domain::repositories::subscriptions::SubscriptionRepository;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub expired: usize,
    pub windows_opened: usize,
}

/// Periodic pass over live entitlements: opens the renewal-discount window
/// once per entitlement lifetime and retires subscriptions whose expiry has
/// elapsed. Running a tick twice without time passing is a no-op because both
/// transitions are conditional updates in the store.
pub struct ExpirationSweeperUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    access_enforcer: Arc<dyn AccessEnforcer + Send + Sync>,
    notifier: Arc<dyn SubscriberNotifier + Send + Sync>,
    renewal_window: Duration,
}

impl ExpirationSweeperUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        access_enforcer: Arc<dyn AccessEnforcer + Send + Sync>,
        notifier: Arc<dyn SubscriberNotifier + Send + Sync>,
        renewal_window: Duration,
    ) -> Self {
        Self {
            subscription_repo,
            access_enforcer,
            notifier,
            renewal_window,
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let candidates = self.subscription_repo.list_sweep_candidates().await?;
        let mut summary = SweepSummary {
            scanned: candidates.len(),
            ..Default::default()
        };

        for subscription in candidates {
            let user_id = subscription.user_id;
            if let Err(err) = self.sweep_one(&subscription, now, &mut summary).await {
                // One user's failure must not starve the rest of the pass.
                error!(
                    user_id,
                    error = ?err,
                    "sweeper: user sweep failed; continuing"
                );
            }
        }

        info!(
            scanned = summary.scanned,
            expired = summary.expired,
            windows_opened = summary.windows_opened,
            "sweeper: pass completed"
        );

        Ok(summary)
    }

    async fn sweep_one(
        &self,
        subscription: &SubscriptionEntity,
        now: DateTime<Utc>,
        summary: &mut SweepSummary,
    ) -> Result<()> {
        let Some(expires_at) = subscription.expires_at else {
            return Ok(());
        };
        let user_id = subscription.user_id;

        if expires_at <= now {
            if self.subscription_repo.expire(user_id, now).await? {
                summary.expired += 1;
                info!(user_id, %expires_at, "sweeper: subscription expired");
                if let Err(err) = self.access_enforcer.revoke_access(user_id).await {
                    error!(
                        user_id,
                        error = ?err,
                        "sweeper: failed to revoke access after expiry"
                    );
                }
                if let Err(err) = self.notifier.subscription_expired(user_id).await {
                    error!(
                        user_id,
                        error = ?err,
                        "sweeper: failed to notify user of expiry"
                    );
                }
            }
            return Ok(());
        }

        if expires_at - now <= self.renewal_window && subscription.renewal_offer_until.is_none() {
            let offer_until = now + self.renewal_window;
            if self
                .subscription_repo
                .open_renewal_window(user_id, offer_until, now)
                .await?
            {
                summary.windows_opened += 1;
                info!(user_id, %offer_until, "sweeper: renewal window opened");
                if let Err(err) = self.notifier.renewal_offer(user_id, offer_until).await {
                    error!(
                        user_id,
                        error = ?err,
                        "sweeper: failed to send renewal offer"
                    );
                }
            }
        }

        Ok(())
    }
}
