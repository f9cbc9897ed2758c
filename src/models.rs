use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{categories, order_items, orders, products, users};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone_number: model.phone_number,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub sell_price: Decimal,
    pub stock: i32,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price the customer pays per unit.
    pub fn display_price(&self) -> Decimal {
        if self.discount > Decimal::ZERO {
            self.sell_price
        } else {
            self.price
        }
    }
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            image: model.image,
            price: model.price,
            discount: model.discount,
            sell_price: model.sell_price,
            stock: model.stock,
            category_id: model.category_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(OrderStatus::Processing),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Order header as shown in lists.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_on_get: bool,
    pub is_paid: bool,
    pub requires_delivery: bool,
    pub delivery_address: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            status: model.status.parse().unwrap_or_else(|_| {
                tracing::warn!(order_id = model.id, status = %model.status, "unknown order status in database");
                OrderStatus::Processing
            }),
            payment_on_get: model.payment_on_get,
            is_paid: model.is_paid,
            requires_delivery: model.requires_delivery,
            delivery_address: model.delivery_address,
            first_name: model.first_name,
            last_name: model.last_name,
            phone_number: model.phone_number,
            total_amount: model.total_amount,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            total_price: model.price * Decimal::from(model.quantity),
            name: model.name,
            price: model.price,
            quantity: model.quantity,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn stored_order(status: &str) -> orders::Model {
        let now = Utc::now().fixed_offset();
        orders::Model {
            id: 7,
            user_id: Uuid::new_v4(),
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            phone_number: "9161234567".into(),
            requires_delivery: false,
            delivery_address: None,
            payment_on_get: true,
            is_paid: false,
            status: status.into(),
            total_amount: Decimal::new(29000, 2),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stored_status_maps_to_enum() {
        assert_eq!(Order::from(stored_order("shipped")).status, OrderStatus::Shipped);
    }

    #[test]
    fn unreadable_status_falls_back_to_processing() {
        assert_eq!(Order::from(stored_order("misplaced")).status, OrderStatus::Processing);
    }
}
