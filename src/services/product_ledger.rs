//! Authoritative price and stock for each product.
//!
//! Every function takes the connection explicitly, so the checkout passes its
//! open transaction and the cart passes the shared pool. The only write here
//! is [`decrement_stock`], and only the checkout calls it.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
    entity::prelude::DateTimeWithTimeZone,
    sea_query::{Expr, LockType},
};

use crate::{
    entity::products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
};

/// Plain read. Good enough for advisory checks; may be stale by commit time.
pub async fn get<C: ConnectionTrait>(conn: &C, product_id: i32) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

/// Read under a row lock held until the surrounding transaction ends.
///
/// Concurrent checkouts touching the same product queue here, and the second
/// one observes the first one's committed stock.
pub async fn get_for_update<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub fn ensure_available(product: &ProductModel, quantity: i32) -> AppResult<()> {
    if product.stock < quantity {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
            product_name: product.name.clone(),
        });
    }
    Ok(())
}

/// Take `amount` units out of stock.
///
/// The update is conditional on `stock >= amount` at execution time, so stock
/// cannot go negative even if an earlier read said there was enough.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    amount: i32,
) -> AppResult<()> {
    if amount < 1 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(amount))
        .col_expr(ProdCol::UpdatedAt, Expr::value(now))
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    // Nothing matched: either the product vanished or the stock is short.
    let product = get(conn, product_id).await?;
    tracing::debug!(
        product_id,
        stock = product.stock,
        requested = amount,
        "stock decrement rejected"
    );
    Err(AppError::InsufficientStock {
        product_id,
        product_name: product.name,
    })
}
