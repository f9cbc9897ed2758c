use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Category, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[serde(default)]
    #[schema(value_type = String)]
    pub discount: Decimal,
    pub stock: i32,
    pub category_id: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}
