use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eshop_api::{bot, config::BotConfig, db::create_orm_conn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eshop_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    let bot = bot::build(&config, orm)?;

    bot::run(bot).await;
    Ok(())
}
