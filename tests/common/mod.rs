#![allow(dead_code)]

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ConnectOptions, ConnectionTrait, Database, EntityTrait,
    PaginatorTrait, Schema, Set,
};
use storefront_orders::{
    entity::{
        AuditLogs, CartItems, Carts, OrderItems, Orders, Products,
        products::{ActiveModel as ProductActive, Model as ProductModel},
    },
    middleware::auth::Claims,
    state::AppState,
};

pub const JWT_SECRET: &str = "test-secret";

/// Fresh in-memory database with the schema derived from the entities.
///
/// A single pooled connection keeps the in-memory database alive and makes
/// concurrent transactions queue behind each other.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;

    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);
    let tables = [
        schema.create_table_from_entity(Products),
        schema.create_table_from_entity(Carts),
        schema.create_table_from_entity(CartItems),
        schema.create_table_from_entity(Orders),
        schema.create_table_from_entity(OrderItems),
        schema.create_table_from_entity(AuditLogs),
    ];
    for table in tables {
        orm.execute(backend.build(&table)).await?;
    }

    Ok(AppState::new(orm, JWT_SECRET))
}

pub fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub async fn seed_product(
    state: &AppState,
    name: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<ProductModel> {
    let now = Utc::now();
    let product = ProductActive {
        id: NotSet,
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        stock: Set(stock),
        category_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

async fn product(state: &AppState, id: i32) -> anyhow::Result<ProductModel> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {id} missing"))
}

pub async fn stock_of(state: &AppState, id: i32) -> anyhow::Result<i32> {
    Ok(product(state, id).await?.stock)
}

/// Stands in for the catalog changing a product behind the cart's back.
pub async fn set_product(
    state: &AppState,
    id: i32,
    price: Option<Decimal>,
    stock: Option<i32>,
) -> anyhow::Result<()> {
    let mut active: ProductActive = product(state, id).await?.into();
    if let Some(price) = price {
        active.price = Set(price);
    }
    if let Some(stock) = stock {
        active.stock = Set(stock);
    }
    active.update(&state.orm).await?;
    Ok(())
}

pub async fn order_count(state: &AppState) -> anyhow::Result<u64> {
    Ok(Orders::find().count(&state.orm).await?)
}

pub fn bearer(user_id: i32) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token encodes");
    format!("Bearer {token}")
}
