//! Checkout under real row locks. These need a Postgres database and are
//! skipped when none is configured.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use storefront_orders::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::orders::{OrderLineRequest, PlaceOrderRequest},
    entity::{
        OrderItems, Products,
        order_items::Column as OrderItemCol,
        products::{ActiveModel as ProductActive, Model as ProductModel},
        sea_orm_active_enums::PaymentMethod,
    },
    error::AppError,
    middleware::auth::AuthUser,
    services::{order_service, product_ledger},
    state::AppState,
};

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run Postgres checkout tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 8).await?;
    run_migrations(&pool).await?;
    Ok(Some(AppState::new(orm_from_pool(pool), "test-secret")))
}

/// Product names are unique, and the database outlives a single run.
async fn seed_product(state: &AppState, label: &str, stock: i32) -> anyhow::Result<ProductModel> {
    let now = Utc::now();
    let product = ProductActive {
        id: NotSet,
        name: Set(format!("{label} {}", now.timestamp_micros())),
        description: Set(None),
        price: Set(Decimal::new(9900, 2)),
        stock: Set(stock),
        category_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

fn buy(product_id: i32, quantity: i32) -> PlaceOrderRequest {
    PlaceOrderRequest {
        shipping_address: "1 Lock Street".into(),
        phone: "555-0199".into(),
        payment_method: PaymentMethod::Card,
        items: Some(vec![OrderLineRequest {
            product_id,
            quantity,
        }]),
    }
}

async fn stock_of(state: &AppState, id: i32) -> anyhow::Result<i32> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {id} missing"))?;
    Ok(product.stock)
}

async fn lines_for(state: &AppState, product_id: i32) -> anyhow::Result<u64> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(product_id))
        .count(&state.orm)
        .await?)
}

fn user_base() -> i32 {
    (Utc::now().timestamp_micros() % 1_000_000) as i32 * 100
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_sell_the_last_unit_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let print = seed_product(&state, "Last Print", 1).await?;
    let print_id = print.id;
    let base = user_base();

    let mut handles = Vec::new();
    for n in 1..=8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            order_service::place_order(&state, &AuthUser::new(base + n), buy(print_id, 1)).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => wins += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected checkout error: {other}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(stock_of(&state, print_id).await?, 0);
    assert_eq!(lines_for(&state, print_id).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkout_waits_for_the_product_row_lock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let mug = seed_product(&state, "Locked Mug", 1).await?;
    let mug_id = mug.id;

    let holder = state.orm.begin().await?;
    let held = product_ledger::get_for_update(&holder, mug_id).await?;
    assert_eq!(held.stock, 1);

    let checkout_state = state.clone();
    let user = AuthUser::new(user_base() + 1);
    let mut checkout = tokio::spawn(async move {
        order_service::place_order(&checkout_state, &user, buy(mug_id, 1)).await
    });

    let still_waiting = tokio::time::timeout(Duration::from_millis(300), &mut checkout)
        .await
        .is_err();
    assert!(still_waiting, "checkout read the product while it was locked");

    product_ledger::decrement_stock(&holder, mug_id, 1).await?;
    holder.commit().await?;

    let result = checkout.await?;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
    assert_eq!(stock_of(&state, mug_id).await?, 0);
    assert_eq!(lines_for(&state, mug_id).await?, 0);
    Ok(())
}
