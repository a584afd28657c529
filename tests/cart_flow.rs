mod common;

use common::{price, seed_product, set_product, setup_state};
use storefront_orders::{
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    entity::{CartItems, Carts},
    error::AppError,
    middleware::auth::AuthUser,
    services::cart_service,
};
use sea_orm::{EntityTrait, PaginatorTrait};

fn add(product_id: i32, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
    }
}

#[tokio::test]
async fn cart_is_created_once_per_user() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(1);

    let first = cart_service::view(&state, &user).await?.data.unwrap();
    let second = cart_service::view(&state, &user).await?.data.unwrap();
    let other = cart_service::view(&state, &AuthUser::new(2)).await?.data.unwrap();

    assert_eq!(first.cart_id, second.cart_id);
    assert_ne!(first.cart_id, other.cart_id);
    assert!(first.items.is_empty());
    assert_eq!(first.total, price(0));
    Ok(())
}

#[tokio::test]
async fn adding_same_product_twice_merges_into_one_line() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(1);
    let mug = seed_product(&state, "Ferris Mug", price(1200), 10).await?;

    cart_service::add_item(&state, &user, add(mug.id, 2)).await?;
    let cart = cart_service::add_item(&state, &user, add(mug.id, 3))
        .await?
        .data
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, price(6000));
    assert_eq!(CartItems::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn merge_beyond_stock_fails_and_keeps_existing_line() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(1);
    let hoodie = seed_product(&state, "Axum Hoodie", price(5500), 4).await?;

    cart_service::add_item(&state, &user, add(hoodie.id, 3)).await?;
    let err = cart_service::add_item(&state, &user, add(hoodie.id, 2))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, AppError::InsufficientStock { product_name, .. } if product_name == "Axum Hoodie")
    );
    let cart = cart_service::view(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    Ok(())
}

#[tokio::test]
async fn add_rejects_unknown_product_and_bad_quantity() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(1);
    let sticker = seed_product(&state, "Sticker", price(500), 1).await?;

    let err = cart_service::add_item(&state, &user, add(9999, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Product")));

    let err = cart_service::add_item(&state, &user, add(sticker.id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = cart_service::add_item(&state, &user, add(sticker.id, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    Ok(())
}

#[tokio::test]
async fn update_item_is_scoped_to_owner_and_checks_stock() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let owner = AuthUser::new(1);
    let intruder = AuthUser::new(2);
    let mug = seed_product(&state, "Ferris Mug", price(1200), 5).await?;

    let cart = cart_service::add_item(&state, &owner, add(mug.id, 1))
        .await?
        .data
        .unwrap();
    let item_id = cart.items[0].id;

    // The intruder has no cart yet, then an empty one: both read as not found.
    let err = cart_service::update_item(&state, &intruder, item_id, UpdateCartItemRequest { quantity: 2 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    cart_service::view(&state, &intruder).await?;
    let err = cart_service::update_item(&state, &intruder, item_id, UpdateCartItemRequest { quantity: 2 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = cart_service::update_item(&state, &owner, item_id, UpdateCartItemRequest { quantity: 6 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let cart = cart_service::update_item(&state, &owner, item_id, UpdateCartItemRequest { quantity: 5 })
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, price(6000));
    Ok(())
}

#[tokio::test]
async fn remove_item_is_idempotent_and_never_touches_other_carts() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let owner = AuthUser::new(1);
    let other = AuthUser::new(2);
    let mug = seed_product(&state, "Ferris Mug", price(1200), 5).await?;

    let cart = cart_service::add_item(&state, &owner, add(mug.id, 1))
        .await?
        .data
        .unwrap();
    let item_id = cart.items[0].id;

    cart_service::remove_item(&state, &other, item_id).await?;
    let cart = cart_service::view(&state, &owner).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);

    let cart = cart_service::remove_item(&state, &owner, item_id)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    cart_service::remove_item(&state, &owner, item_id).await?;
    Ok(())
}

#[tokio::test]
async fn clearing_a_missing_cart_is_a_no_op() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(42);

    let resp = cart_service::clear(&state, &user).await?;
    assert_eq!(resp.message, "Cart cleared");

    let mug = seed_product(&state, "Ferris Mug", price(1200), 5).await?;
    cart_service::add_item(&state, &user, add(mug.id, 2)).await?;
    cart_service::clear(&state, &user).await?;
    cart_service::clear(&state, &user).await?;

    let cart = cart_service::view(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn view_total_follows_live_prices() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(1);
    let mug = seed_product(&state, "Ferris Mug", price(1000), 10).await?;
    let pack = seed_product(&state, "Sticker Pack", price(250), 10).await?;

    cart_service::add_item(&state, &user, add(mug.id, 2)).await?;
    cart_service::add_item(&state, &user, add(pack.id, 4)).await?;
    let before = cart_service::view(&state, &user).await?.data.unwrap();
    assert_eq!(before.total, price(3000));

    set_product(&state, mug.id, Some(price(1500)), None).await?;

    let after = cart_service::view(&state, &user).await?.data.unwrap();
    assert_eq!(after.items[0].unit_price, price(1500));
    assert_eq!(after.items[0].line_total, price(3000));
    assert_eq!(after.total, price(4000));
    Ok(())
}

#[tokio::test]
async fn removing_without_a_cart_creates_nothing() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = AuthUser::new(9);

    let cart = cart_service::remove_item(&state, &user, 1)
        .await?
        .data
        .unwrap();

    assert_eq!(cart.cart_id, None);
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, price(0));
    assert_eq!(Carts::find().count(&state.orm).await?, 0);
    Ok(())
}
