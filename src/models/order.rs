use crate::entities::{OrderStatus, order_entity, order_item_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: i64,
    pub sale_price_at_purchase: Option<i64>,
}

impl From<order_item_entity::Model> for OrderItemResponse {
    fn from(m: order_item_entity::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            product_name: m.product_name,
            quantity: m.quantity,
            price_at_purchase: m.price_at_purchase,
            sale_price_at_purchase: m.sale_price_at_purchase,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_amount: i64,
    pub total_amount: i64,
    pub billing_address_id: Option<i64>,
    pub shipping_address_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_parts(order: order_entity::Model, items: Vec<order_item_entity::Model>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            shipping_amount: order.shipping_amount,
            total_amount: order.total_amount,
            billing_address_id: order.billing_address_id,
            shipping_address_id: order.shipping_address_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// 管理端订单视图：在订单之上补充客户信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminOrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_amount: i64,
    pub total_amount: i64,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// 管理端队列告警，取走即消费
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueAlert {
    NewOrder {
        order_id: i64,
        order_number: String,
    },
    StatusChanged {
        order_id: i64,
        order_number: String,
        from: OrderStatus,
        to: OrderStatus,
    },
}
