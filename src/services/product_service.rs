use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use rust_decimal::Decimal;

use crate::{
    audit,
    dto::products::{CategoryList, CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{ProductOrdering, ProductQuery},
    state::AppState,
};

/// How a free-text catalog query is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerms {
    /// Short all-digit queries address a product by id.
    Id(i64),
    /// Words longer than two characters, OR-matched against name and description.
    Keywords(Vec<String>),
}

pub fn search_terms(query: &str) -> SearchTerms {
    let query = query.trim();
    if !query.is_empty() && query.len() <= 5 && query.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = query.parse() {
            return SearchTerms::Id(id);
        }
    }

    let keywords = query
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .map(str::to_string)
        .collect();
    SearchTerms::Keywords(keywords)
}

/// `%word%` with the LIKE wildcards of `word` escaped, so it matches as a literal substring.
pub fn contains_pattern(word: &str) -> String {
    let mut pattern = String::with_capacity(word.len() + 2);
    pattern.push('%');
    for c in word.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn search_condition(terms: &SearchTerms) -> Condition {
    match terms {
        SearchTerms::Id(id) => Condition::all().add(Column::Id.eq(*id)),
        SearchTerms::Keywords(words) if words.is_empty() => Condition::all(),
        SearchTerms::Keywords(words) => {
            words.iter().fold(Condition::any(), |cond, word| {
                let pattern = contains_pattern(word);
                cond.add(Expr::col(Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(Column::Description).ilike(pattern))
            })
        }
    }
}

fn apply_ordering(finder: Select<Products>, ordering: ProductOrdering) -> Select<Products> {
    match ordering {
        ProductOrdering::Default => finder.order_by_asc(Column::Id),
        ProductOrdering::Price => finder.order_by_asc(Column::SellPrice).order_by_asc(Column::Id),
        ProductOrdering::PriceDesc => finder.order_by_desc(Column::SellPrice).order_by_asc(Column::Id),
        ProductOrdering::Name => finder.order_by_asc(Column::Name),
        ProductOrdering::NameDesc => finder.order_by_desc(Column::Name),
    }
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query
        .pagination()
        .normalize_with(state.config.products_page_size);
    let mut condition = Condition::all();

    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category_slug = query
        .category_slug
        .as_deref()
        .filter(|slug| !slug.is_empty() && *slug != "all");

    if let Some(search) = search {
        condition = condition.add(search_condition(&search_terms(search)));
    } else if let Some(slug) = category_slug {
        let category = Categories::find()
            .filter(CategoryCol::Slug.eq(slug))
            .one(&state.orm)
            .await?
            .ok_or(AppError::NotFound)?;
        // an existing category without products is reported like an unknown one
        let in_category = Products::find()
            .filter(Column::CategoryId.eq(category.id))
            .count(&state.orm)
            .await?;
        if in_category == 0 {
            return Err(AppError::NotFound);
        }
        condition = condition.add(Column::CategoryId.eq(category.id));
    }

    if query.on_sale {
        condition = condition.add(Column::Discount.gt(Decimal::ZERO));
    }

    let finder = apply_ordering(
        Products::find().filter(condition),
        query.order_by.unwrap_or_default(),
    );

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Product::from);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items: Vec<Category> = Categories::find()
        .order_by_asc(CategoryCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(1, total, total)),
    ))
}

async fn ensure_category(state: &AppState, category_id: i64) -> AppResult<()> {
    match Categories::find_by_id(category_id).one(&state.orm).await? {
        Some(_) => Ok(()),
        None => Err(AppError::BadRequest("category not found".into())),
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    pricing::validate_price(payload.price)?;
    pricing::validate_discount(payload.discount)?;
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }
    ensure_category(state, payload.category_id).await?;

    let active = ActiveModel {
        id: NotSet,
        name: Set(payload.name),
        slug: Set(payload.slug),
        description: Set(payload.description),
        image: Set(payload.image),
        price: Set(payload.price),
        discount: Set(payload.discount),
        sell_price: Set(pricing::effective_unit_price(payload.price, payload.discount)),
        stock: Set(payload.stock),
        category_id: Set(payload.category_id),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let price = payload.price.unwrap_or(existing.price);
    let discount = payload.discount.unwrap_or(existing.discount);
    pricing::validate_price(price)?;
    pricing::validate_discount(discount)?;
    if let Some(category_id) = payload.category_id {
        ensure_category(state, category_id).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".into()));
        }
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    active.price = Set(price);
    active.discount = Set(discount);
    active.sell_price = Set(pricing::effective_unit_price(price, discount));

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_numeric_query_is_an_id_lookup() {
        assert_eq!(search_terms("42"), SearchTerms::Id(42));
        assert_eq!(search_terms(" 12345 "), SearchTerms::Id(12345));
    }

    #[test]
    fn long_numbers_are_keywords() {
        assert_eq!(
            search_terms("123456"),
            SearchTerms::Keywords(vec!["123456".into()])
        );
    }

    #[test]
    fn short_words_are_dropped() {
        assert_eq!(
            search_terms("oak table in red"),
            SearchTerms::Keywords(vec!["oak".into(), "table".into(), "red".into()])
        );
        assert_eq!(search_terms("a of"), SearchTerms::Keywords(vec![]));
    }

    #[test]
    fn keyword_count_uses_characters_not_bytes() {
        // two Cyrillic letters are four bytes
        assert_eq!(search_terms("уж"), SearchTerms::Keywords(vec![]));
        assert_eq!(
            search_terms("стол"),
            SearchTerms::Keywords(vec!["стол".into()])
        );
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("table"), "%table%");
        assert_eq!(contains_pattern("a_cd"), r"%a\_cd%");
        assert_eq!(contains_pattern("%%%"), r"%\%\%\%%");
        assert_eq!(contains_pattern(r"c:\x"), r"%c:\\x%");
    }
}
