use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info};

use crate::domain::repositories::access::{AccessEnforcer, SubscriberNotifier};
use crate::domain::value_objects::plans::{PLANS_RENEWAL, Plan};

#[derive(Debug, Clone)]
pub struct TelegramClientConfig {
    pub bot_token: String,
    pub group_invite_link: Option<String>,
    pub group_chat_id: Option<i64>,
}

/// Telegram Bot API client. Private chat ids equal user ids, so lifecycle
/// messages go straight to `user_id`.
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    group_invite_link: Option<String>,
    group_chat_id: Option<i64>,
}

impl TelegramClient {
    pub fn new(config: TelegramClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: config.bot_token,
            group_invite_link: config.group_invite_link,
            group_chat_id: config.group_chat_id,
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let resp = self
            .http
            .post(format!(
                "https://api.telegram.org/bot{}/{}",
                self.bot_token, method
            ))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(
                status = %status,
                response_body = %body,
                method,
                "telegram api request failed"
            );
            anyhow::bail!("Telegram API request failed: {} (status {})", method, status);
        }

        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: String) -> Result<()> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    fn format_brl(amount_minor: i32) -> String {
        format!("R${},{:02}", amount_minor / 100, amount_minor % 100)
    }
}

#[async_trait]
impl AccessEnforcer for TelegramClient {
    async fn grant_access(&self, user_id: i64) -> Result<()> {
        let Some(invite_link) = self.group_invite_link.as_deref() else {
            info!(user_id, "telegram: no invite link configured; skipping grant message");
            return Ok(());
        };
        self.send_message(user_id, format!("\u{1f517} Entre no grupo: {invite_link}"))
            .await
    }

    async fn revoke_access(&self, user_id: i64) -> Result<()> {
        let Some(group_chat_id) = self.group_chat_id else {
            info!(user_id, "telegram: no group chat configured; skipping kick");
            return Ok(());
        };
        self.call(
            "banChatMember",
            json!({ "chat_id": group_chat_id, "user_id": user_id }),
        )
        .await?;
        // Unban immediately so the user can rejoin after a new purchase.
        self.call(
            "unbanChatMember",
            json!({ "chat_id": group_chat_id, "user_id": user_id, "only_if_banned": true }),
        )
        .await
    }
}

#[async_trait]
impl SubscriberNotifier for TelegramClient {
    async fn payment_approved(
        &self,
        user_id: i64,
        plan: &Plan,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let text = format!(
            "\u{2705} Pagamento aprovado!\n\n\
             \u{1f4e6} Plano: {}\n\
             \u{23f3} V\u{e1}lido at\u{e9}: {} UTC",
            plan.name,
            expires_at.format("%Y-%m-%d %H:%M"),
        );
        self.send_message(user_id, text).await
    }

    async fn renewal_offer(&self, user_id: i64, offer_until: DateTime<Utc>) -> Result<()> {
        let mut text = String::from(
            "\u{1f381} MENU EXCLUSIVO DE RENOVA\u{c7}\u{c3}O (v\u{e1}lido por 24 horas)\n\n",
        );
        for plan in PLANS_RENEWAL {
            text.push_str(&format!(
                "{} \u{2014} {}\n",
                plan.name,
                Self::format_brl(plan.amount_minor)
            ));
        }
        text.push_str(&format!(
            "\n\u{23f3} Esses valores expiram em {} UTC.",
            offer_until.format("%Y-%m-%d %H:%M"),
        ));
        self.send_message(user_id, text).await
    }

    async fn subscription_expired(&self, user_id: i64) -> Result<()> {
        self.send_message(
            user_id,
            "\u{26d4} Sua assinatura expirou. Para voltar, assine novamente pelo menu inicial."
                .to_string(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_centavos_as_brl() {
        assert_eq!(TelegramClient::format_brl(1990), "R$19,90");
        assert_eq!(TelegramClient::format_brl(2999), "R$29,99");
        assert_eq!(TelegramClient::format_brl(100), "R$1,00");
        assert_eq!(TelegramClient::format_brl(1005), "R$10,05");
    }
}
