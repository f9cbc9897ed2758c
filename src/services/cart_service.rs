use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    sea_query::{Expr, LockType},
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::CartOwner,
    models::Product,
    pricing::{self, Line, PricingError},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: i64,
    quantity: i32,
    product_id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    image: Option<String>,
    price: Decimal,
    discount: Decimal,
    sell_price: Decimal,
    stock: i32,
    category_id: i64,
    created_at: DateTime<Utc>,
}

/// Binds for `(ci.user_id = $1 OR ci.session_key = $2)`; the unused side stays NULL.
fn owner_binds(owner: &CartOwner) -> (Option<Uuid>, Option<String>) {
    match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Session(key) => (None, Some(key.clone())),
    }
}

pub async fn load_cart(state: &AppState, owner: &CartOwner) -> AppResult<CartList> {
    let (user_id, session_key) = owner_binds(owner);
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.name, p.slug, p.description, p.image,
               p.price, p.discount, p.sell_price, p.stock, p.category_id, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1 OR ci.session_key = $2
        ORDER BY ci.created_at, ci.id
        "#,
    )
    .bind(user_id)
    .bind(session_key)
    .fetch_all(&state.pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let line = Line::new(
            pricing::effective_unit_price(row.price, row.discount),
            row.quantity,
        );
        lines.push(line);
        items.push(CartItemDto {
            id: row.cart_id,
            quantity: row.quantity,
            total_price: line.total()?,
            product: Product {
                id: row.product_id,
                name: row.name,
                slug: row.slug,
                description: row.description,
                image: row.image,
                price: row.price,
                discount: row.discount,
                sell_price: row.sell_price,
                stock: row.stock,
                category_id: row.category_id,
                created_at: row.created_at,
            },
        });
    }

    let totals = pricing::totals(lines)?;
    Ok(CartList {
        items,
        total_quantity: totals.total_quantity,
        total_amount: totals.total_amount,
    })
}

pub async fn list_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<CartList>> {
    let cart = load_cart(state, owner).await?;
    let meta = Meta::new(1, cart.items.len() as i64, cart.items.len() as i64);
    Ok(ApiResponse::success("OK", cart, Some(meta)))
}

/// Adds `quantity` of a product, incrementing an existing line in one statement.
pub async fn add_to_cart(
    state: &AppState,
    owner: &CartOwner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartList>> {
    if payload.quantity <= 0 {
        return Err(PricingError::InvalidQuantity(payload.quantity).into());
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let conflict_target = match owner {
        CartOwner::User(_) => "(user_id, product_id) WHERE user_id IS NOT NULL",
        CartOwner::Session(_) => "(session_key, product_id) WHERE session_key IS NOT NULL",
    };
    let sql = format!(
        r#"
        INSERT INTO cart_items (user_id, session_key, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT {conflict_target}
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#
    );

    let (user_id, session_key) = owner_binds(owner);
    sqlx::query(&sql)
        .bind(user_id)
        .bind(session_key)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .execute(&state.pool)
        .await?;

    audit::record(
        &state.pool,
        owner.user_id(),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = load_cart(state, owner).await?;
    Ok(ApiResponse::success("Added to cart", cart, Some(Meta::empty())))
}

pub async fn update_quantity(
    state: &AppState,
    owner: &CartOwner,
    product_id: i64,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartList>> {
    if payload.quantity <= 0 {
        return Err(PricingError::InvalidQuantity(payload.quantity).into());
    }

    let (user_id, session_key) = owner_binds(owner);
    let result = sqlx::query(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE (user_id = $1 OR session_key = $2) AND product_id = $4
        "#,
    )
    .bind(user_id)
    .bind(session_key)
    .bind(payload.quantity)
    .bind(product_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        owner.user_id(),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = load_cart(state, owner).await?;
    Ok(ApiResponse::success("Cart updated", cart, Some(Meta::empty())))
}

pub async fn remove_from_cart(
    state: &AppState,
    owner: &CartOwner,
    product_id: i64,
) -> AppResult<ApiResponse<CartList>> {
    let (user_id, session_key) = owner_binds(owner);
    let result = sqlx::query(
        "DELETE FROM cart_items WHERE (user_id = $1 OR session_key = $2) AND product_id = $3",
    )
    .bind(user_id)
    .bind(session_key)
    .bind(product_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        owner.user_id(),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    let cart = load_cart(state, owner).await?;
    Ok(ApiResponse::success("Removed from cart", cart, Some(Meta::empty())))
}

/// Moves an anonymous cart onto `user_id`, dropping whatever cart the user had.
///
/// Last write wins: lines are not unioned. An empty session cart leaves the
/// user's cart alone. Run inside a transaction; returns the number of lines moved.
pub async fn merge_session_cart<C>(conn: &C, session_key: &str, user_id: Uuid) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let session_lines = CartItems::find()
        .filter(CartCol::SessionKey.eq(session_key))
        .lock(LockType::Update)
        .all(conn)
        .await?;
    if session_lines.is_empty() {
        return Ok(0);
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;

    let moved = CartItems::update_many()
        .col_expr(CartCol::UserId, Expr::value(user_id))
        .col_expr(CartCol::SessionKey, Expr::value(Option::<String>::None))
        .filter(CartCol::SessionKey.eq(session_key))
        .exec(conn)
        .await?;

    Ok(moved.rows_affected)
}
