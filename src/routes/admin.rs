//! Back-office endpoints: order fulfilment and stock control.
//!
//! Every handler checks the admin role in the service layer, so a valid
//! customer token gets 403 rather than 401.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};

use crate::{
    dto::orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    dto::products::{InventoryAdjustRequest, ProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, Product},
    response::ApiResponse,
    routes::params::{LowStockQuery, OrderListQuery},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    let fulfilment = Router::new()
        .route("/", get(list_all_orders))
        .route("/{id}", get(get_order_admin))
        .route("/{id}/status", patch(update_order_status));
    let inventory = Router::new()
        .route("/low-stock", get(list_low_stock))
        .route("/{id}", patch(adjust_inventory));

    Router::new()
        .nest("/orders", fulfilment)
        .nest("/inventory", inventory)
}

/// Orders of every customer, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("limit" = Option<i64>, Query, description = "Newest N orders instead of a page (1..=100)"),
        ("page" = Option<i64>, Query, description = "Page of the order book"),
        ("per_page" = Option<i64>, Query, description = "Orders per page"),
        ("status" = Option<String>, Query, description = "processing, paid, shipped, completed or cancelled")
    ),
    responses(
        (status = 200, description = "Order book", body = ApiResponse<OrderList>),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "No bearer token"),
        (status = 403, description = "Caller is not staff"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    staff: AuthUser,
    Query(filter): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(admin_service::list_all_orders(&state, &staff, filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order with its captured line prices", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(admin_service::get_order_admin(&state, &staff, order_id).await?))
}

/// Records payment and fulfilment progress reported outside the shop.
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(("id" = i64, Path, description = "Order number")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order after the transition", body = ApiResponse<Order>),
        (status = 400, description = "Neither status nor is_paid given"),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(order_id): Path<i64>,
    Json(change): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        admin_service::update_order_status(&state, &staff, order_id, change).await?,
    ))
}

/// Products that need restocking, scarcest first.
#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Report stock at or below this (5 when unset)"),
        ("page" = Option<i64>, Query, description = "Page of the report"),
        ("per_page" = Option<i64>, Query, description = "Products per page")
    ),
    responses(
        (status = 200, description = "Restocking report", body = ApiResponse<ProductList>),
        (status = 403, description = "Caller is not staff"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    staff: AuthUser,
    Query(report): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(admin_service::list_low_stock(&state, &staff, report).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}",
    params(("id" = i64, Path, description = "Product id")),
    request_body = InventoryAdjustRequest,
    responses(
        (status = 200, description = "Product with its new stock level", body = ApiResponse<Product>),
        (status = 400, description = "Zero delta, or stock would drop below zero"),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(product_id): Path<i64>,
    Json(adjustment): Json<InventoryAdjustRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        admin_service::adjust_inventory(&state, &staff, product_id, adjustment).await?,
    ))
}
