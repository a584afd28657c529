use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        orders::{OrderLineRequest, OrderList, OrderWithItems, PlaceOrderRequest},
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
    ),
    components(
        schemas(
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLine,
            CartView,
            PlaceOrderRequest,
            OrderLineRequest,
            OrderList,
            OrderWithItems,
            params::Pagination,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart staging endpoints"),
        (name = "Orders", description = "Checkout and order history endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
