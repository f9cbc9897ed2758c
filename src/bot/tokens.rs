use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait, sea_query::OnConflict};

use super::BotResult;
use crate::entity::{
    TelegramUsers,
    telegram_users::{ActiveModel, Column},
};

/// Bearer tokens the bot holds per chat, persisted across restarts.
#[derive(Clone)]
pub struct TokenStore {
    orm: DatabaseConnection,
}

impl TokenStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    pub async fn save(&self, telegram_id: i64, token: &str) -> BotResult<()> {
        let active = ActiveModel {
            telegram_id: Set(telegram_id),
            token: Set(token.to_string()),
        };
        TelegramUsers::insert(active)
            .on_conflict(
                OnConflict::column(Column::TelegramId)
                    .update_column(Column::Token)
                    .to_owned(),
            )
            .exec(&self.orm)
            .await?;
        tracing::info!(telegram_id, "token saved");
        Ok(())
    }

    pub async fn get(&self, telegram_id: i64) -> BotResult<Option<String>> {
        let user = TelegramUsers::find_by_id(telegram_id).one(&self.orm).await?;
        Ok(user.map(|u| u.token))
    }

    pub async fn delete(&self, telegram_id: i64) -> BotResult<()> {
        TelegramUsers::delete_by_id(telegram_id).exec(&self.orm).await?;
        tracing::info!(telegram_id, "token deleted");
        Ok(())
    }
}
