//! Per-user cart that stages items before checkout.
//!
//! Stock checks in here are advisory: they read current stock without
//! reserving it. The checkout repeats them under lock.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
    entity::prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::{
    audit::log_audit,
    dto::{
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        orders::OrderLineRequest,
    },
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::product_ledger,
    state::AppState,
};

pub async fn find_cart<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Option<CartModel>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(cart)
}

/// Returns the user's cart, creating an empty one on first use.
///
/// Run this outside a transaction: a lost creation race is resolved by
/// re-reading after the unique violation, which would poison an open
/// Postgres transaction.
pub async fn get_or_create<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<CartModel> {
    if let Some(cart) = find_cart(conn, user_id).await? {
        return Ok(cart);
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let inserted = CartActive {
        id: NotSet,
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(cart) => {
            tracing::debug!(user_id, cart_id = cart.id, "cart created");
            Ok(cart)
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_cart(conn, user_id)
                .await?
                .ok_or(AppError::NotFound("Cart"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Stamp the cart row, which also holds its write lock until the enclosing
/// transaction ends. Serializes line merges for one user only.
pub(crate) async fn touch_cart<C: ConnectionTrait>(conn: &C, cart_id: i32) -> AppResult<()> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    Carts::update_many()
        .col_expr(CartCol::UpdatedAt, Expr::value(now))
        .filter(CartCol::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Locks the cart and returns its lines in insertion order. A user without a
/// cart has no lines.
pub(crate) async fn snapshot_lines<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> AppResult<Vec<OrderLineRequest>> {
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(Vec::new());
    };
    touch_cart(conn, cart.id).await?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|item| OrderLineRequest {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();
    Ok(lines)
}

/// Deletes every line of the user's cart. Returns how many were removed.
pub async fn clear_items<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<u64> {
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(0);
    };
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Prices every line with the product's current price.
pub async fn load_view<C: ConnectionTrait>(conn: &C, cart: &CartModel) -> AppResult<CartView> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::Id)
        .find_also_related(Products)
        .all(conn)
        .await?;

    let mut total = Decimal::ZERO;
    let mut items = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let Some(product) = product else {
            continue;
        };
        let line_total = product.price * Decimal::from(item.quantity);
        total += line_total;
        items.push(CartLine {
            id: item.id,
            product_id: product.id,
            product_name: product.name,
            unit_price: product.price,
            quantity: item.quantity,
            line_total,
        });
    }

    Ok(CartView {
        cart_id: Some(cart.id),
        items,
        total,
    })
}

pub async fn view(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create(&state.orm, user.user_id).await?;
    let data = load_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    ensure_positive(payload.quantity)?;

    let product = product_ledger::get(&state.orm, payload.product_id).await?;
    product_ledger::ensure_available(&product, payload.quantity)?;

    let cart = get_or_create(&state.orm, user.user_id).await?;

    let txn = state.orm.begin().await?;
    touch_cart(&txn, cart.id).await?;

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    let quantity = match existing {
        Some(item) => {
            let combined = item
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(|| AppError::BadRequest("quantity is too large".to_string()))?;
            // Leaves the existing line untouched when the merge would oversell.
            product_ledger::ensure_available(&product, combined)?;

            let mut active: CartItemActive = item.into();
            active.quantity = Set(combined);
            active.update(&txn).await?;
            combined
        }
        None => {
            CartItemActive {
                id: NotSet,
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(payload.quantity),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?;
            payload.quantity
        }
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product.id, "quantity": quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = load_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Added to cart", data, Some(Meta::empty())))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: i32,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    ensure_positive(payload.quantity)?;

    let cart = find_cart(&state.orm, user.user_id)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;

    // Scoping by cart id makes another user's line indistinguishable from a
    // missing one.
    let item = CartItems::find_by_id(item_id)
        .filter(CartItemCol::CartId.eq(cart.id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;

    let product = product_ledger::get(&state.orm, item.product_id).await?;
    product_ledger::ensure_available(&product, payload.quantity)?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": item_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = load_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Cart updated", data, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: i32,
) -> AppResult<ApiResponse<CartView>> {
    let Some(cart) = find_cart(&state.orm, user.user_id).await? else {
        return Ok(ApiResponse::success(
            "Removed from cart",
            CartView::empty(),
            Some(Meta::empty()),
        ));
    };

    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        if let Err(err) = log_audit(
            &state.orm,
            Some(user.user_id),
            "cart_remove",
            Some("cart_items"),
            Some(serde_json::json!({ "item_id": item_id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    let data = load_view(&state.orm, &cart).await?;
    Ok(ApiResponse::success("Removed from cart", data, Some(Meta::empty())))
}

pub async fn clear(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    let removed = clear_items(&state.orm, user.user_id).await?;

    if removed > 0 {
        if let Err(err) = log_audit(
            &state.orm,
            Some(user.user_id),
            "cart_clear",
            Some("cart_items"),
            Some(serde_json::json!({ "removed": removed })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn ensure_positive(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
