use super::{
    BotError, BotResult,
    api::ApiClient,
    keyboards::{self, *},
    session::{ChatSession, ExpiringCache},
    telegram::{CallbackQuery, ReplyMarkup, TelegramClient, Update},
    tokens::TokenStore,
};

pub const NOT_LOGGED_IN: &str = "❌ You are not logged in. Press 'Log in' to sign in.";

/// What a text message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Catalog,
    BackToCatalog,
    BackToProducts,
    MainMenu,
    Login,
    Profile,
    Cart,
    Orders,
    OrderDetail(i64),
    Logout,
    Category(&'static str),
    SelectProduct(&'a str),
    Unknown,
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        match text {
            "/start" => return Command::Start,
            "/catalog" | CATALOG => return Command::Catalog,
            BACK_TO_CATALOG => return Command::BackToCatalog,
            BACK_TO_PRODUCTS => return Command::BackToProducts,
            MAIN_MENU => return Command::MainMenu,
            LOGIN => return Command::Login,
            PROFILE | BACK_TO_PROFILE => return Command::Profile,
            MY_CART => return Command::Cart,
            MY_ORDERS => return Command::Orders,
            LOGOUT => return Command::Logout,
            _ => {}
        }
        if let Some(slug) = keyboards::category_slug(text) {
            return Command::Category(slug);
        }
        if let Some(name) = text.strip_prefix(SELECT_PREFIX) {
            return Command::SelectProduct(name);
        }
        if let Some(id) = text.strip_prefix(ORDER_PREFIX).and_then(|id| id.parse().ok()) {
            return Command::OrderDetail(id);
        }
        Command::Unknown
    }

    /// Message shown when handling the command fails.
    fn fallback(&self) -> &'static str {
        match self {
            Command::Login => "❌ Login failed. Please try again.",
            Command::Profile => "❌ Failed to load the profile. Try again later.",
            Command::Cart => "❌ Failed to load the cart. Try again later.",
            Command::Orders => "❌ Failed to load orders. Try again later.",
            Command::OrderDetail(_) => "❌ Failed to load order details. Try again later.",
            Command::Logout => "❌ Logout failed. Try again later.",
            Command::SelectProduct(_) => "❌ Failed to load the product. Try again later.",
            _ => "❌ Something went wrong. Try again later.",
        }
    }
}

/// Splits `"login password"` into its two parts.
pub fn parse_credentials(text: &str) -> Option<(&str, &str)> {
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(login), Some(password), None) => Some((login, password)),
        _ => None,
    }
}

pub struct Bot {
    pub(super) telegram: TelegramClient,
    api: ApiClient,
    tokens: TokenStore,
    sessions: ExpiringCache<i64, ChatSession>,
}

impl Bot {
    pub fn new(
        telegram: TelegramClient,
        api: ApiClient,
        tokens: TokenStore,
        sessions: ExpiringCache<i64, ChatSession>,
    ) -> Self {
        Self {
            telegram,
            api,
            tokens,
            sessions,
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(query) = update.callback_query {
            self.handle_callback(query).await;
        } else if let Some(message) = update.message {
            if let Some(text) = message.text.as_deref() {
                self.handle_text(message.chat.id, text).await;
            }
        }
    }

    async fn send(&self, chat_id: i64, text: &str, markup: Option<&ReplyMarkup>) -> BotResult<i64> {
        Ok(self.telegram.send_message(chat_id, text, markup).await?.message_id)
    }

    async fn handle_text(&self, chat_id: i64, text: &str) {
        let session = self.sessions.get(&chat_id).await.unwrap_or_default();
        let command = Command::parse(text);

        let result = if session.awaiting_credentials && !matches!(command, Command::Start | Command::Login) {
            self.submit_credentials(chat_id, text).await
        } else {
            self.dispatch(chat_id, &command, session).await
        };

        if let Err(err) = result {
            if err.is_unauthorized() {
                self.expire_login(chat_id).await;
                return;
            }
            tracing::error!(chat_id, ?command, error = %err, "bot command failed");
            if let Err(err) = self.send(chat_id, command.fallback(), None).await {
                tracing::error!(chat_id, error = %err, "fallback message failed");
            }
        }
    }

    async fn dispatch(&self, chat_id: i64, command: &Command<'_>, session: ChatSession) -> BotResult<()> {
        match command {
            Command::Start => self.start(chat_id).await,
            Command::Catalog => self.show_categories(chat_id).await,
            Command::BackToCatalog => {
                self.sessions.update(chat_id, |s| s.last_products.clear()).await;
                self.show_categories(chat_id).await
            }
            Command::BackToProducts => match session.category_slug {
                Some(slug) => self.show_products(chat_id, &slug, session.page.max(1)).await,
                None => self.show_categories(chat_id).await,
            },
            Command::MainMenu => {
                let markup = self.main_keyboard(chat_id).await?;
                self.send(chat_id, "🏠 Back in the main menu.", Some(&markup)).await?;
                Ok(())
            }
            Command::Category(slug) => {
                tracing::info!(chat_id, slug, "category selected");
                self.show_products(chat_id, slug, 1).await
            }
            Command::SelectProduct(name) => match session.find_product(name) {
                Some(product) => self.show_product(chat_id, product.id).await,
                None => {
                    self.send(chat_id, "❌ Product not found. Pick one from the list.", None)
                        .await?;
                    Ok(())
                }
            },
            Command::Login => self.request_login(chat_id).await,
            Command::Profile => self.show_profile(chat_id).await,
            Command::Cart => self.show_cart(chat_id).await,
            Command::Orders => self.show_orders(chat_id).await,
            Command::OrderDetail(id) => self.show_order(chat_id, *id).await,
            Command::Logout => self.logout(chat_id).await,
            Command::Unknown => {
                self.send(chat_id, "❌ Unknown command. Choose an action from the menu.", None)
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        let Some(chat_id) = query.message.as_ref().map(|m| m.chat.id) else {
            return;
        };
        if let Some((slug, page)) = query.data.as_deref().and_then(keyboards::parse_page_callback) {
            let stale = self
                .sessions
                .get(&chat_id)
                .await
                .map(|s| s.last_message_ids)
                .unwrap_or_default();
            for message_id in stale {
                if let Err(err) = self.telegram.delete_message(chat_id, message_id).await {
                    tracing::warn!(chat_id, message_id, error = %err, "delete message failed");
                }
            }
            if let Err(err) = self.show_products(chat_id, slug, page).await {
                tracing::error!(chat_id, slug, page, error = %err, "paging failed");
            }
            tracing::info!(chat_id, slug, page, "products paged");
        }
        if let Err(err) = self.telegram.answer_callback_query(&query.id).await {
            tracing::warn!(chat_id, error = %err, "answer callback failed");
        }
    }

    async fn main_keyboard(&self, chat_id: i64) -> BotResult<ReplyMarkup> {
        let logged_in = self.tokens.get(chat_id).await?.is_some();
        Ok(keyboards::main_keyboard(logged_in))
    }

    async fn require_token(&self, chat_id: i64) -> BotResult<Option<String>> {
        let token = self.tokens.get(chat_id).await?;
        if token.is_none() {
            self.send(chat_id, NOT_LOGGED_IN, None).await?;
        }
        Ok(token)
    }

    /// Drops a token the API no longer accepts so the chat can log in again.
    async fn expire_login(&self, chat_id: i64) {
        if let Err(err) = self.tokens.delete(chat_id).await {
            tracing::error!(chat_id, error = %err, "failed to drop rejected token");
            return;
        }
        tracing::info!(chat_id, "stored token rejected, logged out");
        let markup = keyboards::main_keyboard(false);
        if let Err(err) = self.send(chat_id, NOT_LOGGED_IN, Some(&markup)).await {
            tracing::error!(chat_id, error = %err, "fallback message failed");
        }
    }

    async fn start(&self, chat_id: i64) -> BotResult<()> {
        self.sessions.insert(chat_id, ChatSession::default()).await;
        let markup = self.main_keyboard(chat_id).await?;
        self.send(
            chat_id,
            "🏬 Welcome to ModaHouse! Press 'Catalog' to browse products.",
            Some(&markup),
        )
        .await?;
        tracing::info!(chat_id, "bot started");
        Ok(())
    }

    async fn show_categories(&self, chat_id: i64) -> BotResult<()> {
        let message_id = self
            .send(chat_id, "Choose a category:", Some(&keyboards::categories_keyboard()))
            .await?;
        self.sessions
            .update(chat_id, |s| s.last_message_ids = vec![message_id])
            .await;
        Ok(())
    }

    async fn show_products(&self, chat_id: i64, slug: &str, page: i64) -> BotResult<()> {
        let listing = match self.api.products(slug, page).await {
            Ok(listing) => listing,
            Err(err) => {
                tracing::error!(chat_id, slug, page, error = %err, "failed to fetch products");
                self.send(chat_id, "❌ Failed to load products. Try again later.", None)
                    .await?;
                return Ok(());
            }
        };

        if listing.items.is_empty() {
            let message_id = self.send(chat_id, "No products found.", None).await?;
            self.sessions
                .update(chat_id, |s| {
                    s.category_slug = Some(slug.to_string());
                    s.page = page;
                    s.last_products.clear();
                    s.last_message_ids = vec![message_id];
                })
                .await;
            return Ok(());
        }

        let pagination = keyboards::pagination_keyboard(&listing, slug, page);
        let text = keyboards::products_text(&listing.items, page);
        let products_id = self.send(chat_id, &text, pagination.as_ref()).await?;
        let choice_id = self
            .send(
                chat_id,
                "Pick a product or go back to the catalog:",
                Some(&keyboards::products_keyboard(&listing.items)),
            )
            .await?;

        self.sessions
            .update(chat_id, |s| {
                s.awaiting_credentials = false;
                s.category_slug = Some(slug.to_string());
                s.page = page;
                s.last_products = listing.items;
                s.last_message_ids = vec![products_id, choice_id];
            })
            .await;
        Ok(())
    }

    async fn show_product(&self, chat_id: i64, id: i64) -> BotResult<()> {
        let product = self.api.product(id).await?;
        let caption = keyboards::product_caption(&product);

        match product.image.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => {
                if let Err(err) = self.telegram.send_photo(chat_id, url, &caption).await {
                    tracing::warn!(chat_id, product_id = id, error = %err, "photo failed");
                    self.send(chat_id, &caption, None).await?;
                }
            }
            None => {
                self.send(chat_id, &format!("{caption}\n(no image)"), None).await?;
            }
        }

        self.send(
            chat_id,
            "Press the button below to return to the product list:",
            Some(&keyboards::back_to_products_keyboard()),
        )
        .await?;
        tracing::info!(chat_id, product_id = id, "product shown");
        Ok(())
    }

    async fn request_login(&self, chat_id: i64) -> BotResult<()> {
        if self.tokens.get(chat_id).await?.is_some() {
            self.send(chat_id, "You are already logged in.", None).await?;
            return Ok(());
        }
        self.sessions
            .update(chat_id, |s| s.awaiting_credentials = true)
            .await;
        self.send(
            chat_id,
            "Enter your username and password separated by a space (e.g. user123 password123):",
            None,
        )
        .await?;
        Ok(())
    }

    async fn submit_credentials(&self, chat_id: i64, text: &str) -> BotResult<()> {
        let Some((login, password)) = parse_credentials(text) else {
            self.send(chat_id, "❌ Enter the username and password separated by a space.", None)
                .await?;
            return Ok(());
        };

        match self.api.login(login, password).await {
            Ok(token) => {
                self.tokens.save(chat_id, &token).await?;
                self.sessions
                    .update(chat_id, |s| s.awaiting_credentials = false)
                    .await;
                let markup = keyboards::main_keyboard(true);
                self.send(chat_id, "✅ Logged in!", Some(&markup)).await?;
                tracing::info!(chat_id, "logged in");
                Ok(())
            }
            Err(BotError::Api(status, _)) if status == 401 || status == 400 => {
                self.send(chat_id, "❌ Login failed. Check your username and password.", None)
                    .await?;
                tracing::warn!(chat_id, status, "login rejected");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn show_profile(&self, chat_id: i64) -> BotResult<()> {
        let Some(token) = self.require_token(chat_id).await? else {
            return Ok(());
        };
        let profile = self.api.profile(&token).await?;
        self.send(
            chat_id,
            &keyboards::profile_text(&profile),
            Some(&keyboards::profile_keyboard()),
        )
        .await?;
        Ok(())
    }

    async fn show_cart(&self, chat_id: i64) -> BotResult<()> {
        let Some(token) = self.require_token(chat_id).await? else {
            return Ok(());
        };
        let cart = self.api.cart(&token).await?;
        if cart.items.is_empty() {
            self.send(chat_id, "🛒 Your cart is empty.", None).await?;
            return Ok(());
        }
        self.send(
            chat_id,
            &keyboards::cart_text(&cart),
            Some(&keyboards::profile_keyboard()),
        )
        .await?;
        Ok(())
    }

    async fn show_orders(&self, chat_id: i64) -> BotResult<()> {
        let Some(token) = self.require_token(chat_id).await? else {
            return Ok(());
        };
        let orders = self.api.recent_orders(&token).await?;
        if orders.is_empty() {
            self.send(chat_id, "📋 You have no orders.", None).await?;
            return Ok(());
        }
        let message_id = self
            .send(
                chat_id,
                &keyboards::orders_text(&orders),
                Some(&keyboards::orders_keyboard(&orders)),
            )
            .await?;
        self.sessions
            .update(chat_id, |s| s.last_message_ids = vec![message_id])
            .await;
        Ok(())
    }

    async fn show_order(&self, chat_id: i64, id: i64) -> BotResult<()> {
        let Some(token) = self.require_token(chat_id).await? else {
            return Ok(());
        };
        let detail = self.api.order(&token, id).await?;
        self.send(
            chat_id,
            &keyboards::order_detail_text(&detail),
            Some(&keyboards::back_keyboard()),
        )
        .await?;
        tracing::info!(chat_id, order_id = id, "order shown");
        Ok(())
    }

    async fn logout(&self, chat_id: i64) -> BotResult<()> {
        let Some(token) = self.tokens.get(chat_id).await? else {
            self.send(chat_id, "You are not logged in.", None).await?;
            return Ok(());
        };
        // tokens are stateless on the server, so forgetting ours is the logout
        self.tokens.delete(chat_id).await?;
        if let Err(err) = self.api.logout(&token).await {
            tracing::warn!(chat_id, error = %err, "logout request failed");
        }
        let markup = keyboards::main_keyboard(false);
        self.send(chat_id, "You have logged out.", Some(&markup)).await?;
        tracing::info!(chat_id, "logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_buttons_parse_to_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse(CATALOG), Command::Catalog);
        assert_eq!(Command::parse(BACK_TO_PROFILE), Command::Profile);
        assert_eq!(Command::parse("Kitchen"), Command::Category("kuhnya"));
        assert_eq!(Command::parse("hello"), Command::Unknown);
    }

    #[test]
    fn prefixed_buttons_carry_their_argument() {
        assert_eq!(
            Command::parse("Select: Oak table"),
            Command::SelectProduct("Oak table")
        );
        assert_eq!(Command::parse("Order #17"), Command::OrderDetail(17));
        assert_eq!(Command::parse("Order #x"), Command::Unknown);
    }

    #[test]
    fn only_401_counts_as_an_expired_login() {
        assert!(BotError::Api(401, "expired".into()).is_unauthorized());
        assert!(!BotError::Api(400, "bad".into()).is_unauthorized());
        assert!(!BotError::EmptyBody.is_unauthorized());
    }

    #[test]
    fn credentials_need_exactly_two_words() {
        assert_eq!(parse_credentials(" anna  secret123 "), Some(("anna", "secret123")));
        assert_eq!(parse_credentials("anna"), None);
        assert_eq!(parse_credentials("anna secret extra"), None);
    }
}
