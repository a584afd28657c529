//! Append-only history of placed orders and their frozen lines.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    LoaderTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    entity::prelude::DateTimeWithTimeZone,
};

use crate::{
    dto::orders::{OrderListQuery, OrderWithItems},
    models::OrderItem,
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        sea_orm_active_enums::{OrderStatus, PaymentMethod},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i32,
    pub total: Decimal,
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    /// Unit price at checkout time.
    pub price: Decimal,
}

#[derive(Debug)]
pub struct OrderPage {
    pub orders: Vec<OrderWithItems>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// Insert a `PENDING` order and its lines. Only the checkout calls this, on
/// its own transaction.
pub async fn create<C: ConnectionTrait>(conn: &C, new_order: NewOrder) -> AppResult<OrderWithItems> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let order = OrderActive {
        id: NotSet,
        user_id: Set(new_order.user_id),
        total: Set(new_order.total),
        status: Set(OrderStatus::Pending),
        shipping_address: Set(new_order.shipping_address),
        phone: Set(new_order.phone),
        payment_method: Set(new_order.payment_method),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(new_order.items.len());
    for line in new_order.items {
        let item = OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
        }
        .insert(conn)
        .await?;
        items.push(OrderItem::new(item, line.product_name));
    }

    Ok(OrderWithItems {
        order: order.into(),
        items,
    })
}

/// The user's orders, newest first.
pub async fn find_all_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    query: &OrderListQuery,
) -> AppResult<OrderPage> {
    let (page, per_page, offset) = query.pagination().normalize();

    let mut condition = Condition::all().add(OrderCol::UserId.eq(user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(conn).await?;

    let orders = finder.limit(per_page).offset(offset).all(conn).await?;
    let lines = orders
        .load_many(OrderItems::find().order_by_asc(OrderItemCol::Id), conn)
        .await?;

    let product_ids: Vec<i32> = lines.iter().flatten().map(|item| item.product_id).collect();
    let names = product_names(conn, product_ids).await?;

    let orders = orders
        .into_iter()
        .zip(lines)
        .map(|(order, items)| OrderWithItems {
            order: order.into(),
            items: items
                .into_iter()
                .map(|item| {
                    let name = names.get(&item.product_id).cloned().unwrap_or_default();
                    OrderItem::new(item, name)
                })
                .collect(),
        })
        .collect();

    Ok(OrderPage {
        orders,
        page,
        per_page,
        total,
    })
}

/// Another user's order is reported as missing, never as forbidden.
pub async fn find_one<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    user_id: i32,
) -> AppResult<OrderWithItems> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    let items = order
        .find_related(OrderItems)
        .order_by_asc(OrderItemCol::Id)
        .find_also_related(Products)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(OrderWithItems {
        order: order.into(),
        items,
    })
}

async fn product_names<C: ConnectionTrait>(
    conn: &C,
    product_ids: Vec<i32>,
) -> AppResult<HashMap<i32, String>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let names = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product.name))
        .collect();
    Ok(names)
}
