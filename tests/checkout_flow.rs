use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, Statement,
};
use sea_orm::ActiveValue::NotSet;

use eshop_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        auth::{LoginRequest, RegisterRequest},
        cart::AddToCartRequest,
        orders::CheckoutRequest,
    },
    entity::{
        AuditLogs, Products, audit_logs,
        categories::ActiveModel as CategoryActive,
        products::{ActiveModel as ProductActive, Model as ProductModel},
    },
    middleware::auth::{CartOwner, verify_token},
    pricing,
    routes::params::OrderListQuery,
    services::{auth_service, cart_service, order_service},
    state::AppState,
};

const SECRET: &str = "flow-test-secret";

// Anonymous cart -> login merge -> checkout -> history keeps captured prices.
#[tokio::test]
async fn session_cart_survives_login_and_checks_out() -> anyhow::Result<()> {
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

    let state = setup_state(&database_url).await?;
    let sofa = create_product(&state, "Test Sofa", dec!(100.00), dec!(20), 10).await?;
    let lamp = create_product(&state, "Test Lamp", dec!(50.00), dec!(0), 5).await?;

    // Anonymous visitor fills a cart; adding twice increments the line.
    let session = CartOwner::Session("flow-session".into());
    for (product_id, quantity) in [(sofa.id, 2), (sofa.id, 1), (lamp.id, 1)] {
        cart_service::add_to_cart(&state, &session, AddToCartRequest { product_id, quantity })
            .await?;
    }
    let cart = cart_service::load_cart(&state, &session).await?;
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total_quantity, 4);
    assert_eq!(cart.total_amount, dec!(290.00));

    auth_service::register_user(
        &state,
        RegisterRequest {
            username: "anna".into(),
            email: "anna@example.com".into(),
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            password1: "secret123".into(),
            password2: "secret123".into(),
        },
    )
    .await?;

    let login_resp = auth_service::login_user(
        &state,
        LoginRequest {
            username: "anna".into(),
            password: "secret123".into(),
            session_key: Some("flow-session".into()),
        },
    )
    .await?;
    let token = login_resp.data.expect("token").token;
    let user = verify_token(SECRET, &token)?;

    // The session cart now belongs to the user.
    let owner = CartOwner::User(user.user_id);
    let cart = cart_service::load_cart(&state, &owner).await?;
    assert_eq!(cart.total_quantity, 4);
    assert!(cart_service::load_cart(&state, &session).await?.items.is_empty());

    let placed = order_service::checkout(&state, &user, checkout_request()).await?;
    let placed = placed.data.expect("order");
    assert_eq!(placed.order.total_amount, dec!(290.00));
    assert_eq!(placed.items.len(), 2);
    assert!(!placed.order.is_paid);

    let sofa_after = Products::find_by_id(sofa.id).one(&state.orm).await?.unwrap();
    assert_eq!(sofa_after.stock, 7);
    assert!(cart_service::load_cart(&state, &owner).await?.items.is_empty());

    // Re-invoking on the now empty cart changes nothing.
    let again = order_service::checkout(&state, &user, checkout_request()).await?;
    assert!(again.data.is_none());

    // A later price change does not rewrite history.
    let mut active: ProductActive = sofa_after.into();
    active.price = Set(dec!(500.00));
    active.sell_price = Set(pricing::effective_unit_price(dec!(500.00), dec!(20)));
    active.update(&state.orm).await?;

    let stored = order_service::get_order(&state, &user, placed.order.id).await?;
    let stored = stored.data.expect("order");
    let sofa_line = stored
        .items
        .iter()
        .find(|item| item.name == "Test Sofa")
        .expect("sofa line");
    assert_eq!(sofa_line.price, dec!(80.00));
    assert_eq!(sofa_line.total_price, dec!(240.00));
    assert_eq!(stored.order.total_amount, dec!(290.00));

    let history = order_service::list_orders(
        &state,
        &user,
        OrderListQuery {
            limit: Some(5),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(history.data.expect("orders").items.len(), 1);

    let audited = AuditLogs::find()
        .filter(audit_logs::Column::Action.eq("checkout"))
        .filter(audit_logs::Column::UserId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(audited, 1);

    // A user who already has a cart: the session cart replaces it, no union.
    register(&state, "boris").await?;
    let boris = verify_token(SECRET, &login(&state, "boris", None).await?)?;
    let boris_owner = CartOwner::User(boris.user_id);
    cart_service::add_to_cart(
        &state,
        &boris_owner,
        AddToCartRequest { product_id: sofa.id, quantity: 5 },
    )
    .await?;

    let boris_session = CartOwner::Session("boris-session".into());
    for (product_id, quantity) in [(sofa.id, 1), (lamp.id, 2)] {
        cart_service::add_to_cart(&state, &boris_session, AddToCartRequest { product_id, quantity })
            .await?;
    }
    login(&state, "boris", Some("boris-session")).await?;
    assert_eq!(
        cart_lines(&state, &boris_owner).await?,
        vec![(sofa.id, 1), (lamp.id, 2)]
    );
    assert!(cart_service::load_cart(&state, &boris_session).await?.items.is_empty());

    // An empty session cart leaves the user's cart alone.
    login(&state, "boris", Some("nothing-here")).await?;
    assert_eq!(
        cart_lines(&state, &boris_owner).await?,
        vec![(sofa.id, 1), (lamp.id, 2)]
    );

    Ok(())
}

async fn register(state: &AppState, username: &str) -> anyhow::Result<()> {
    auth_service::register_user(
        state,
        RegisterRequest {
            username: username.into(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password1: "secret123".into(),
            password2: "secret123".into(),
        },
    )
    .await?;
    Ok(())
}

async fn login(state: &AppState, username: &str, session_key: Option<&str>) -> anyhow::Result<String> {
    let resp = auth_service::login_user(
        state,
        LoginRequest {
            username: username.into(),
            password: "secret123".into(),
            session_key: session_key.map(str::to_string),
        },
    )
    .await?;
    Ok(resp.data.expect("token").token)
}

/// `(product_id, quantity)` of every line, sorted by product.
async fn cart_lines(state: &AppState, owner: &CartOwner) -> anyhow::Result<Vec<(i64, i32)>> {
    let mut lines: Vec<_> = cart_service::load_cart(state, owner)
        .await?
        .items
        .iter()
        .map(|item| (item.product.id, item.quantity))
        .collect();
    lines.sort();
    Ok(lines)
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        first_name: "Anna".into(),
        last_name: "Petrova".into(),
        phone_number: "9161234567".into(),
        requires_delivery: true,
        delivery_address: Some("Lenina 1".into()),
        payment_on_get: true,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let state = AppState::new(
        pool,
        AppConfig {
            database_url: database_url.to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: SECRET.into(),
            jwt_ttl_hours: 1,
            products_page_size: 3,
        },
    );
    run_migrations(&state.orm).await?;

    // Clean tables between runs
    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(
            backend,
            "TRUNCATE TABLE order_items, orders, cart_items, audit_logs, telegram_users, products, categories, users RESTART IDENTITY CASCADE",
        ))
        .await?;

    Ok(state)
}

async fn create_product(
    state: &AppState,
    name: &str,
    price: rust_decimal::Decimal,
    discount: rust_decimal::Decimal,
    stock: i32,
) -> anyhow::Result<ProductModel> {
    let slug = name.to_lowercase().replace(' ', "-");
    let category = CategoryActive {
        id: NotSet,
        name: Set(format!("{name} category")),
        slug: Set(format!("{slug}-category")),
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: NotSet,
        name: Set(name.to_string()),
        slug: Set(slug),
        description: Set(Some("Integration test product".into())),
        image: NotSet,
        price: Set(price),
        discount: Set(discount),
        sell_price: Set(pricing::effective_unit_price(price, discount)),
        stock: Set(stock),
        category_id: Set(category.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}
