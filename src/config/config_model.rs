#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub payments: Payments,
    pub telegram: Telegram,
    pub sweeper: Sweeper,
    pub queue: Queue,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Payments {
    pub base_url: String,
    pub access_token: String,
    pub notification_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub payer_email_domain: String,
}

#[derive(Debug, Clone)]
pub struct Telegram {
    pub bot_token: String,
    pub group_invite_link: Option<String>,
    pub group_chat_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Sweeper {
    pub interval_secs: u64,
    pub renewal_window_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Queue {
    pub workers: usize,
    pub capacity: usize,
}
