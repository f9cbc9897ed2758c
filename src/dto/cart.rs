use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: i64,
    #[serde(default = "one")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItemDto {
    pub id: i64,
    pub product: Product,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
    pub total_quantity: i64,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}
