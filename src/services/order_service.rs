use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderList, OrderSummary, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    pricing::{self, Line},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

pub(crate) fn status_condition(status: Option<&str>) -> AppResult<Condition> {
    let mut condition = Condition::all();
    if let Some(status) = status.filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse().map_err(AppError::BadRequest)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    Ok(condition)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = match query.limit {
        Some(limit) => (1, limit.clamp(1, 100), 0),
        None => query.pagination().normalize(),
    };
    let condition = status_condition(query.status.as_deref())?
        .add(OrderCol::UserId.eq(user.user_id));

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| OrderSummary::from(Order::from(model)))
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

/// Turns the caller's cart into an order in one transaction.
///
/// Cart rows and their products are locked, each line is priced, the order and
/// its item snapshots are written, stock is decremented and the cart cleared.
/// An empty cart writes nothing and returns no order.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;

    // inner join: Postgres refuses FOR UPDATE on the nullable side of an outer join
    let rows = CartItems::find()
        .inner_join(Products)
        .select_also(Products)
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if rows.is_empty() {
        txn.rollback().await?;
        return Ok(ApiResponse::empty("Cart is empty"));
    }

    let mut priced = Vec::with_capacity(rows.len());
    for (cart_item, product) in rows {
        let product = product.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("cart item {} has no product", cart_item.id))
        })?;
        if product.stock < cart_item.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        let line = Line::new(
            pricing::effective_unit_price(product.price, product.discount),
            cart_item.quantity,
        );
        priced.push((product, line));
    }

    let totals = pricing::totals(priced.iter().map(|(_, line)| *line))?;

    let order = OrderActive {
        id: NotSet,
        user_id: Set(user.user_id),
        first_name: Set(payload.first_name.trim().to_string()),
        last_name: Set(payload.last_name.trim().to_string()),
        phone_number: Set(payload.phone_number.trim().to_string()),
        requires_delivery: Set(payload.requires_delivery),
        delivery_address: Set(payload
            .delivery_address
            .filter(|_| payload.requires_delivery)),
        payment_on_get: Set(payload.payment_on_get),
        is_paid: Set(false),
        status: Set(OrderStatus::Processing.as_str().to_string()),
        total_amount: Set(totals.total_amount),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(priced.len());
    for (product, line) in &priced {
        let item = OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(Some(product.id)),
            name: Set(product.name.clone()),
            price: Set(line.unit_price),
            quantity: Set(line.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(product.id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        user_id = %user.user_id,
        total_quantity = totals.total_quantity,
        total_amount = %totals.total_amount,
        "order placed"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let data = with_items(state, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub(crate) async fn with_items(state: &AppState, order: OrderModel) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

pub(crate) fn touch(active: &mut OrderActive) {
    active.updated_at = Set(Utc::now().into());
}
