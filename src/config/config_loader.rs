use anyhow::{Context, Result};
use url::Url;

use super::config_model::{Database, DotEnvyConfig, Payments, Queue, Server, Sweeper, Telegram};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("SERVER_PORT is invalid")?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let notification_url = std::env::var("PIX_NOTIFICATION_URL").ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    });
    if let Some(raw) = notification_url.as_deref() {
        Url::parse(raw).context("PIX_NOTIFICATION_URL is invalid")?;
    }

    let payments = Payments {
        base_url: std::env::var("PIX_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
        access_token: std::env::var("PIX_ACCESS_TOKEN").expect("PIX_ACCESS_TOKEN is invalid"),
        notification_url,
        webhook_secret: std::env::var("PIX_WEBHOOK_SECRET").ok().and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }),
        payer_email_domain: std::env::var("PIX_PAYER_EMAIL_DOMAIN")
            .unwrap_or_else(|_| "subscribers.vip-gate.app".to_string()),
    };

    let telegram = Telegram {
        bot_token: std::env::var("BOT_TOKEN").expect("BOT_TOKEN is invalid"),
        group_invite_link: std::env::var("GROUP_INVITE_LINK").ok().and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }),
        group_chat_id: std::env::var("GROUP_CHAT_ID")
            .ok()
            .and_then(|v| v.parse::<i64>().ok()),
    };

    let sweeper = Sweeper {
        interval_secs: std::env::var("SWEEPER_INTERVAL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .context("SWEEPER_INTERVAL_SECS is invalid")?,
        renewal_window_hours: std::env::var("RENEWAL_WINDOW_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .context("RENEWAL_WINDOW_HOURS is invalid")?,
    };

    let queue = Queue {
        workers: std::env::var("RECONCILE_QUEUE_WORKERS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .context("RECONCILE_QUEUE_WORKERS is invalid")?,
        capacity: std::env::var("RECONCILE_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .context("RECONCILE_QUEUE_CAPACITY is invalid")?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        payments,
        telegram,
        sweeper,
        queue,
    })
}
