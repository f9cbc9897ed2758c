//! Telegram bot that mirrors the storefront through its REST API.

use std::time::Duration;

use sea_orm::DatabaseConnection;

pub mod api;
pub mod handler;
pub mod keyboards;
pub mod session;
pub mod telegram;
pub mod tokens;

use crate::config::BotConfig;
use api::ApiClient;
use handler::Bot;
use session::ExpiringCache;
use telegram::TelegramClient;
use tokens::TokenStore;

const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("API response has no data")]
    EmptyBody,
    #[error("telegram error: {0}")]
    Telegram(String),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl BotError {
    /// The API refused the bearer token, usually because it expired.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BotError::Api(401, _))
    }
}

pub type BotResult<T> = Result<T, BotError>;

pub fn build(config: &BotConfig, orm: DatabaseConnection) -> BotResult<Bot> {
    Ok(Bot::new(
        TelegramClient::new(&config.telegram_api_url, &config.bot_token)?,
        ApiClient::new(&config.base_url)?,
        TokenStore::new(orm),
        ExpiringCache::new(config.session_ttl, config.session_capacity),
    ))
}

/// Long-polls for updates forever, handling them one at a time.
pub async fn run(bot: Bot) {
    let mut offset = 0;
    tracing::info!("bot polling started");
    loop {
        match bot.telegram.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    bot.handle_update(update).await;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "polling failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
