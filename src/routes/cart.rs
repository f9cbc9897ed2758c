use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};

use crate::{
    dto::cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::CartOwner,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart))
        .route("/{product_id}", patch(update_cart_item).delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("X-Session-Key" = Option<String>, Header, description = "Anonymous cart key when no token is sent")
    ),
    responses(
        (status = 200, description = "Cart lines with totals", body = ApiResponse<CartList>),
        (status = 401, description = "Neither token nor session key")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    owner: CartOwner,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &owner).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    params(
        ("X-Session-Key" = Option<String>, Header, description = "Anonymous cart key when no token is sent")
    ),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a product or increase its quantity", body = ApiResponse<CartList>),
        (status = 400, description = "Unknown product or non-positive quantity"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    owner: CartOwner,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::add_to_cart(&state, &owner, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = i64, Path, description = "Product ID"),
        ("X-Session-Key" = Option<String>, Header, description = "Anonymous cart key when no token is sent")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Set the quantity of a cart line", body = ApiResponse<CartList>),
        (status = 400, description = "Non-positive quantity"),
        (status = 404, description = "Cart item not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    owner: CartOwner,
    Path(product_id): Path<i64>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::update_quantity(&state, &owner, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = i64, Path, description = "Product ID"),
        ("X-Session-Key" = Option<String>, Header, description = "Anonymous cart key when no token is sent")
    ),
    responses(
        (status = 200, description = "Remove a cart line", body = ApiResponse<CartList>),
        (status = 404, description = "Cart item not found"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    owner: CartOwner,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::remove_from_cart(&state, &owner, product_id).await?;
    Ok(Json(resp))
}
