//! Minimal Telegram Bot API client over HTTPS.

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use super::{BotError, BotResult};

/// Long-poll timeout passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
    },
    Inline {
        inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    },
}

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;
        Ok(Self {
            http,
            base: format!("{api_url}/bot{token}"),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> BotResult<T> {
        let resp: TelegramResponse<T> = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(&params)
            .send()
            .await?
            .json()
            .await?;

        match resp {
            TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            TelegramResponse { description, .. } => Err(BotError::Telegram(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> BotResult<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> BotResult<Message> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = markup {
            params["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call("sendMessage", params).await
    }

    /// Sends a photo Telegram fetches from `photo_url`.
    pub async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> BotResult<Message> {
        self.call(
            "sendPhoto",
            json!({ "chat_id": chat_id, "photo": photo_url, "caption": caption }),
        )
        .await
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> BotResult<bool> {
        self.call(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> BotResult<bool> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_markup_serializes_in_bot_api_shape() {
        let markup = ReplyMarkup::Inline {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Next".into(),
                callback_data: "page_all_2".into(),
            }]],
        };
        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            json!({ "inline_keyboard": [[{ "text": "Next", "callback_data": "page_all_2" }]] })
        );
    }

    #[test]
    fn callback_update_parses() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "callback_query": {
                "id": "abc",
                "data": "page_ofis_3",
                "message": { "message_id": 5, "chat": { "id": 42, "type": "private" }, "date": 0 }
            }
        }))
        .unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.message.unwrap().chat.id, 42);
        assert_eq!(query.data.as_deref(), Some("page_ofis_3"));
    }
}
