use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{
    order_items::Model as OrderItemModel,
    orders::Model as OrderModel,
    products::Model as ProductModel,
    sea_orm_active_enums::{OrderStatus, PaymentMethod},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i32,
    pub user_id: i32,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl OrderItem {
    pub fn new(model: OrderItemModel, product_name: String) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name,
            quantity: model.quantity,
            price: model.price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total: model.total,
            status: model.status,
            shipping_address: model.shipping_address,
            phone: model.phone,
            payment_method: model.payment_method,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

// `order_items.product_id` restricts product deletion, so the product is
// always present in practice.
impl From<(OrderItemModel, Option<ProductModel>)> for OrderItem {
    fn from((model, product): (OrderItemModel, Option<ProductModel>)) -> Self {
        let product_name = product.map(|p| p.name).unwrap_or_default();
        Self::new(model, product_name)
    }
}
