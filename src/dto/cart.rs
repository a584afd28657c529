use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: i32,
    pub quantity: i32,
}

/// The only mutable field of a cart line.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Cart contents priced at read time; `total` is never stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    /// `None` when the user has never had a cart.
    pub cart_id: Option<i32>,
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            total: Decimal::ZERO,
        }
    }
}
