use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod},
    models::{Order, OrderItem},
    routes::params::Pagination,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: i32,
    pub quantity: i32,
}

/// Checkout input. Prices and totals are never taken from the client; when
/// `items` is omitted the caller's cart is checked out.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items: Option<Vec<OrderLineRequest>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}

// Fields are listed inline rather than flattening `Pagination`: flattened
// query strings lose their numeric types under serde_urlencoded.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<OrderStatus>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}
