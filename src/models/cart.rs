use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// 购物车行，关联商品的实时快照（非下单价格快照）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub image_url: Option<String>,
    pub unit_price: i64,
    pub sale_unit_price: Option<i64>,
    pub quantity: i32,
    pub line_total: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub cart_id: i64,
    pub items: Vec<CartItemResponse>,
    pub total: i64,
}
