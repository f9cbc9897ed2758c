use rust_decimal::Decimal;
use uuid::Uuid;

use eshop_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    pricing,
    services::auth_service::hash_password,
};

const CATEGORIES: [(&str, &str); 5] = [
    ("Kitchen", "kuhnya"),
    ("Bedroom", "spalnya"),
    ("Living room", "gostinnaya"),
    ("Office", "ofis"),
    ("Decor", "dekor"),
];

// name, category slug, price in cents, discount percent, stock
const PRODUCTS: [(&str, &str, i64, i64, i32); 10] = [
    ("Oak Dining Table", "kuhnya", 45000, 0, 12),
    ("Kitchen Stool", "kuhnya", 3500, 10, 40),
    ("Double Bed Frame", "spalnya", 62000, 15, 5),
    ("Bedside Lamp", "spalnya", 2900, 0, 60),
    ("Corner Sofa", "gostinnaya", 98000, 20, 3),
    ("Coffee Table", "gostinnaya", 15000, 0, 20),
    ("Office Chair", "ofis", 21000, 5, 25),
    ("Standing Desk", "ofis", 54000, 0, 8),
    ("Wall Mirror", "dekor", 7800, 30, 15),
    ("Ceramic Vase", "dekor", 1900, 0, 100),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_user(&pool, "user", "user@example.com", "user12345", "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {username} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (name, slug) in CATEGORIES {
        sqlx::query("INSERT INTO categories (name, slug) VALUES ($1, $2) ON CONFLICT (slug) DO NOTHING")
            .bind(name)
            .bind(slug)
            .execute(pool)
            .await?;
    }

    for (name, category, cents, discount, stock) in PRODUCTS {
        let price = Decimal::new(cents, 2);
        let discount = Decimal::from(discount);
        let slug = name.to_lowercase().replace(' ', "-");
        sqlx::query(
            r#"
            INSERT INTO products (name, slug, description, price, discount, sell_price, stock, category_id)
            SELECT $1, $2, $3, $4, $5, $6, $7, c.id FROM categories c WHERE c.slug = $8
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(&slug)
        .bind(format!("{name} from the demo catalog."))
        .bind(price)
        .bind(discount)
        .bind(pricing::effective_unit_price(price, discount))
        .bind(stock)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded {} categories and {} products", CATEGORIES.len(), PRODUCTS.len());
    Ok(())
}
