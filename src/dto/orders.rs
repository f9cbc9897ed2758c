use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{Order, OrderItem, OrderStatus},
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CheckoutRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub requires_delivery: bool,
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub payment_on_get: bool,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::BadRequest("first and last name are required".into()));
        }
        let phone = self.phone_number.trim();
        if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::BadRequest(
                "phone number must be 10 digits".into(),
            ));
        }
        let has_address = self
            .delivery_address
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if self.requires_delivery && !has_address {
            return Err(AppError::BadRequest(
                "delivery address is required for delivery".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub status: OrderStatus,
    pub payment_on_get: bool,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at,
            status: order.status,
            payment_on_get: order.payment_on_get,
            total_amount: order.total_amount,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderSummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            phone_number: "9161234567".into(),
            requires_delivery: false,
            delivery_address: None,
            payment_on_get: true,
        }
    }

    #[test]
    fn pickup_order_needs_no_address() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn delivery_needs_an_address() {
        let mut req = request();
        req.requires_delivery = true;
        assert!(req.validate().is_err());
        req.delivery_address = Some("Lenina 1".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn phone_must_be_ten_digits() {
        let mut req = request();
        req.phone_number = "12345".into();
        assert!(req.validate().is_err());
        req.phone_number = "91612345ab".into();
        assert!(req.validate().is_err());
    }
}
