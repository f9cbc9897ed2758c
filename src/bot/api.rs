//! HTTP client for the storefront REST API.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use super::{BotError, BotResult, session::ExpiringCache};
use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, Profile},
        cart::CartList,
        orders::{OrderList, OrderSummary, OrderWithItems},
        products::ProductList,
    },
    models::Product,
    response::ApiResponse,
};

const PRODUCTS_TTL: Duration = Duration::from_secs(300);
const ORDERS_TTL: Duration = Duration::from_secs(100);
const CACHE_CAPACITY: usize = 100;
/// Orders shown by the bot.
pub const RECENT_ORDERS: i64 = 5;

/// One page of a category listing.
#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub has_previous: bool,
    pub has_next: bool,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    products: ExpiringCache<(String, i64), ProductPage>,
    orders: ExpiringCache<String, Vec<OrderSummary>>,
}

impl ApiClient {
    /// `base_url` is the server root; requests go to `{base_url}/api`.
    pub fn new(base_url: &str) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{base_url}/api"),
            products: ExpiringCache::new(PRODUCTS_TTL, CACHE_CAPACITY),
            orders: ExpiringCache::new(ORDERS_TTL, CACHE_CAPACITY),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> BotResult<ApiResponse<T>> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Api(status.as_u16(), body));
        }
        Ok(resp.json().await?)
    }

    async fn data<T: DeserializeOwned>(req: RequestBuilder) -> BotResult<T> {
        Self::send(req).await?.data.ok_or(BotError::EmptyBody)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> BotResult<T> {
        Self::data(self.http.post(self.url(path)).json(body)).await
    }

    /// A page of products in `category_slug`; unknown or empty categories give an empty page.
    pub async fn products(&self, category_slug: &str, page: i64) -> BotResult<ProductPage> {
        let key = (category_slug.to_string(), page);
        if let Some(cached) = self.products.get(&key).await {
            return Ok(cached);
        }

        let req = self
            .http
            .get(self.url("/products"))
            .query(&[("category_slug", category_slug)])
            .query(&[("page", page)]);
        let resp = match Self::send::<ProductList>(req).await {
            Ok(resp) => resp,
            Err(BotError::Api(code, _)) if code == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(ProductPage::default());
            }
            Err(err) => return Err(err),
        };

        let meta = resp.meta.unwrap_or_else(crate::response::Meta::empty);
        let page = ProductPage {
            items: resp.data.map(|list| list.items).unwrap_or_default(),
            has_previous: meta.has_previous(),
            has_next: meta.has_next(),
        };
        self.products.insert(key, page.clone()).await;
        Ok(page)
    }

    pub async fn product(&self, id: i64) -> BotResult<Product> {
        Self::data(self.http.get(self.url(&format!("/products/{id}")))).await
    }

    pub async fn login(&self, username: &str, password: &str) -> BotResult<String> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            session_key: None,
        };
        let resp: LoginResponse = self.post("/auth/login", &body).await?;
        Ok(resp.token)
    }

    pub async fn logout(&self, token: &str) -> BotResult<()> {
        Self::send::<serde_json::Value>(self.http.post(self.url("/auth/logout")).bearer_auth(token))
            .await?;
        self.orders.remove(&token.to_string()).await;
        Ok(())
    }

    pub async fn profile(&self, token: &str) -> BotResult<Profile> {
        Self::data(self.http.get(self.url("/auth/me")).bearer_auth(token)).await
    }

    pub async fn cart(&self, token: &str) -> BotResult<CartList> {
        Self::data(self.http.get(self.url("/cart")).bearer_auth(token)).await
    }

    /// The newest orders of the token's user.
    pub async fn recent_orders(&self, token: &str) -> BotResult<Vec<OrderSummary>> {
        let key = token.to_string();
        if let Some(cached) = self.orders.get(&key).await {
            return Ok(cached);
        }

        let req = self
            .http
            .get(self.url("/orders"))
            .query(&[("limit", RECENT_ORDERS)])
            .bearer_auth(token);
        let list: OrderList = Self::data(req).await?;
        self.orders.insert(key, list.items.clone()).await;
        Ok(list.items)
    }

    pub async fn order(&self, token: &str, id: i64) -> BotResult<OrderWithItems> {
        Self::data(self.http.get(self.url(&format!("/orders/{id}"))).bearer_auth(token)).await
    }
}
