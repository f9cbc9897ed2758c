use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub products_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let jwt_ttl_hours = check_ttl_hours(parse_or("JWT_TTL_HOURS", 24))?;
        let products_page_size = parse_or("PRODUCTS_PAGE_SIZE", 3);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            jwt_ttl_hours,
            products_page_size,
        })
    }
}

/// Longest token lifetime accepted from `JWT_TTL_HOURS`: one year.
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 366;

fn check_ttl_hours(hours: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (1..=MAX_JWT_TTL_HOURS).contains(&hours),
        "JWT_TTL_HOURS must be between 1 and {MAX_JWT_TTL_HOURS}, got {hours}"
    );
    Ok(hours)
}

/// Settings for the chat-bot client.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub base_url: String,
    pub database_url: String,
    pub telegram_api_url: String,
    pub session_ttl: Duration,
    pub session_capacity: usize,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bot_token = env::var("BOT_TOKEN")
            .map_err(|_| anyhow::anyhow!("BOT_TOKEN is not set"))?;
        let base_url = env::var("BASE_URL")
            .map_err(|_| anyhow::anyhow!("BASE_URL is not set"))?;
        let database_url = env::var("DATABASE_URL")?;
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string());
        let session_ttl = Duration::from_secs(parse_or("BOT_SESSION_TTL_SECS", 3600));
        let session_capacity = parse_or("BOT_SESSION_CAPACITY", 10_000);
        Ok(Self {
            bot_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            database_url,
            telegram_api_url: telegram_api_url.trim_end_matches('/').to_string(),
            session_ttl,
            session_capacity,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lifetime_is_bounded() {
        assert_eq!(check_ttl_hours(24).unwrap(), 24);
        assert!(check_ttl_hours(0).is_err());
        assert!(check_ttl_hours(-3).is_err());
        assert!(check_ttl_hours(i64::MAX).is_err());
    }
}
