use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::{error, info};
use vip_gate::application::usecases::{
    expiration_sweeper::ExpirationSweeperUseCase, reconcile::ReconcileUseCase,
    subscriptions::SubscriptionUseCase,
};
use vip_gate::config::config_loader;
use vip_gate::domain::repositories::{
    access::{AccessEnforcer, SubscriberNotifier},
    payment_gateway::PixGateway,
    payments::PaymentRepository,
    subscriptions::SubscriptionRepository,
};
use vip_gate::infrastructure::{
    axum_http::{self, routers::payment_webhook::WebhookState},
    messaging::telegram::{TelegramClient, TelegramClientConfig},
    payments::pix_client::{PixClient, PixClientConfig},
    postgres::{
        postgres_connection,
        repositories::{payments::PaymentPostgres, subscriptions::SubscriptionPostgres},
    },
    queue::reconcile_queue::ReconcileQueue,
};
use vip_gate::services;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Service exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    vip_gate::observability::init_observability()?;

    let dotenvy_env = Arc::new(config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    // Repositories (shared DB pool)
    let payment_repository: Arc<dyn PaymentRepository + Send + Sync> =
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool_arc)));
    let subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc)));

    let pix_client = Arc::new(PixClient::new(PixClientConfig {
        base_url: dotenvy_env.payments.base_url.clone(),
        access_token: dotenvy_env.payments.access_token.clone(),
        notification_url: dotenvy_env.payments.notification_url.clone(),
        webhook_secret: dotenvy_env.payments.webhook_secret.clone(),
    })?);
    let gateway: Arc<dyn PixGateway + Send + Sync> = Arc::clone(&pix_client) as Arc<dyn PixGateway + Send + Sync>;

    let telegram_client = Arc::new(TelegramClient::new(TelegramClientConfig {
        bot_token: dotenvy_env.telegram.bot_token.clone(),
        group_invite_link: dotenvy_env.telegram.group_invite_link.clone(),
        group_chat_id: dotenvy_env.telegram.group_chat_id,
    }));
    let access_enforcer: Arc<dyn AccessEnforcer + Send + Sync> =
        Arc::clone(&telegram_client) as Arc<dyn AccessEnforcer + Send + Sync>;
    let notifier: Arc<dyn SubscriberNotifier + Send + Sync> =
        Arc::clone(&telegram_client) as Arc<dyn SubscriberNotifier + Send + Sync>;

    let reconcile_usecase = Arc::new(ReconcileUseCase::new(
        Arc::clone(&payment_repository),
        Arc::clone(&subscription_repository),
        Arc::clone(&gateway),
        Arc::clone(&access_enforcer),
        Arc::clone(&notifier),
    ));

    // Webhook acknowledgment is decoupled from reconciliation by the queue.
    let queue = ReconcileQueue::spawn(
        Arc::clone(&reconcile_usecase),
        dotenvy_env.queue.workers,
        dotenvy_env.queue.capacity,
    );
    let webhook_state = Arc::new(WebhookState {
        queue,
        pix_client: Arc::clone(&pix_client),
    });

    let subscription_usecase = Arc::new(SubscriptionUseCase::new(
        Arc::clone(&subscription_repository),
        Arc::clone(&payment_repository),
        Arc::clone(&gateway),
        Arc::clone(&reconcile_usecase),
        dotenvy_env.payments.payer_email_domain.clone(),
    ));

    let sweeper_usecase = Arc::new(ExpirationSweeperUseCase::new(
        Arc::clone(&subscription_repository),
        Arc::clone(&access_enforcer),
        Arc::clone(&notifier),
        chrono::Duration::hours(dotenvy_env.sweeper.renewal_window_hours),
    ));

    // Spawn background sweep loop
    let sweeper_loop = tokio::spawn(services::sweeper_loop::run_sweeper_loop(
        sweeper_usecase,
        Duration::from_secs(dotenvy_env.sweeper.interval_secs),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, subscription_usecase, webhook_state).await
    });

    tokio::select! {
        result = sweeper_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
