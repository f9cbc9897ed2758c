use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};

use eshop_api::{
    bot::{self, handler::NOT_LOGGED_IN, keyboards, telegram::Update, tokens::TokenStore},
    config::BotConfig,
    db::{create_orm_conn, run_migrations},
};

type Sent = Arc<Mutex<Vec<String>>>;

async fn send_message(State(sent): State<Sent>, Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    sent.lock().unwrap().push(text);
    Json(json!({
        "ok": true,
        "result": { "message_id": 1, "chat": { "id": body["chat_id"] } }
    }))
}

// Every storefront call answers like an expired token would.
async fn token_expired() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized", "data": { "error": "token expired" }, "meta": null })),
    )
}

/// Serves both the Telegram methods and the storefront API on one local port.
async fn spawn_backend(sent: Sent) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/botTEST/sendMessage", post(send_message))
        .fallback(token_expired)
        .with_state(sent);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn text_update(chat_id: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": 1,
        "message": { "message_id": 1, "chat": { "id": chat_id }, "text": text }
    }))
    .unwrap()
}

// A stored token the API rejects is dropped, so the chat can log in again.
#[tokio::test]
async fn rejected_token_is_forgotten() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let sent: Sent = Arc::default();
    let base = spawn_backend(sent.clone()).await?;
    let config = BotConfig {
        bot_token: "TEST".into(),
        base_url: base.clone(),
        database_url,
        telegram_api_url: base,
        session_ttl: Duration::from_secs(60),
        session_capacity: 10,
    };
    let bot = bot::build(&config, orm.clone())?;
    let tokens = TokenStore::new(orm);

    // Logging out with an expired token still logs the chat out.
    let chat_id = 900_001;
    tokens.save(chat_id, "expired-token").await?;
    bot.handle_update(text_update(chat_id, keyboards::LOGOUT)).await;
    assert_eq!(tokens.get(chat_id).await?, None);
    assert_eq!(sent.lock().unwrap().last().map(String::as_str), Some("You have logged out."));

    // Any authenticated screen drops the token and asks for a login.
    let chat_id = 900_002;
    tokens.save(chat_id, "expired-token").await?;
    bot.handle_update(text_update(chat_id, keyboards::PROFILE)).await;
    assert_eq!(tokens.get(chat_id).await?, None);
    assert_eq!(sent.lock().unwrap().last().map(String::as_str), Some(NOT_LOGGED_IN));

    bot.handle_update(text_update(chat_id, keyboards::LOGIN)).await;
    let last = sent.lock().unwrap().last().cloned().unwrap_or_default();
    assert!(last.starts_with("Enter your username and password"), "got {last}");

    Ok(())
}
