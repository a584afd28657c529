use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    audit::log_audit,
    dto::orders::{OrderLineRequest, OrderList, OrderListQuery, OrderWithItems, PlaceOrderRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::{
        cart_service,
        order_store::{self, NewOrder, NewOrderItem},
        product_ledger,
    },
    state::AppState,
};

/// Turn the caller's cart (or the explicit `items`) into a `PENDING` order.
///
/// Runs on a single transaction: each line re-reads its product under lock,
/// checks stock, snapshots the current price and decrements stock before the
/// next line is looked at. Any error returns early and drops the transaction,
/// which rolls back every decrement; the cart is left untouched.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let PlaceOrderRequest {
        shipping_address,
        phone,
        payment_method,
        items,
    } = payload;
    let shipping_address = required("shipping_address", shipping_address)?;
    let phone = required("phone", phone)?;

    let txn = state.orm.begin().await?;

    let lines = match items {
        Some(lines) => lines,
        None => cart_service::snapshot_lines(&txn, user.user_id).await?,
    };
    validate_lines(&lines)?;

    let mut total = Decimal::ZERO;
    let mut snapshot = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = product_ledger::get_for_update(&txn, line.product_id).await?;
        product_ledger::ensure_available(&product, line.quantity)?;

        total += product.price * Decimal::from(line.quantity);
        snapshot.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            price: product.price,
        });

        product_ledger::decrement_stock(&txn, product.id, line.quantity).await?;
        tracing::debug!(
            product_id = product.id,
            quantity = line.quantity,
            price = %product.price,
            "order line reserved"
        );
    }

    let order = order_store::create(
        &txn,
        NewOrder {
            user_id: user.user_id,
            total,
            shipping_address,
            phone,
            payment_method,
            items: snapshot,
        },
    )
    .await?;

    clear_cart_best_effort(&txn, user.user_id).await;

    txn.commit().await?;

    tracing::info!(
        order_id = order.order.id,
        user_id = user.user_id,
        items = order.items.len(),
        total = %order.order.total,
        "order placed"
    );

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.order.id, "total": order.order.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let page = order_store::find_all_for_user(&state.orm, user.user_id, &query).await?;
    let meta = Meta::paged(page.page, page.per_page, page.total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: page.orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = order_store::find_one(&state.orm, id, user.user_id).await?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Empty the user's cart inside a savepoint so a failure here cannot abort
/// the order. A failure leaves a stale cart behind; it is logged, not raised.
async fn clear_cart_best_effort(txn: &DatabaseTransaction, user_id: i32) {
    let savepoint = match txn.begin().await {
        Ok(savepoint) => savepoint,
        Err(err) => {
            tracing::warn!(error = %err, user_id, "could not open savepoint for cart clear");
            return;
        }
    };

    match cart_service::clear_items(&savepoint, user_id).await {
        Ok(removed) => {
            if let Err(err) = savepoint.commit().await {
                tracing::warn!(error = %err, user_id, "cart clear after checkout failed");
            } else {
                tracing::debug!(user_id, removed, "cart cleared after checkout");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, user_id, "cart clear after checkout failed");
            if let Err(err) = savepoint.rollback().await {
                tracing::warn!(error = %err, user_id, "savepoint rollback failed");
            }
        }
    }
}

fn required(field: &str, value: String) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn validate_lines(lines: &[OrderLineRequest]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    if let Some(line) = lines.iter().find(|line| line.quantity < 1) {
        return Err(AppError::BadRequest(format!(
            "quantity for product {} must be greater than 0",
            line.product_id
        )));
    }
    Ok(())
}
