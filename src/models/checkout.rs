use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 下单行项目。名称与价格在进入结算时解析一次，
/// 之后贯穿订单创建与通知，不再回查商品表。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub sale_unit_price: Option<i64>,
}

impl OrderLine {
    pub fn effective_unit_price(&self) -> i64 {
        self.sale_unit_price.unwrap_or(self.unit_price)
    }

    pub fn line_total(&self) -> i64 {
        self.effective_unit_price() * self.quantity as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Address,
    Shipping,
    Review,
    Success,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DirectCheckoutItem {
    pub product_id: i64,
    pub quantity: i32,
}

/// 开始结算；不传 items 时快照整个购物车（Buy Now 传单件）
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct StartCheckoutRequest {
    pub items: Option<Vec<DirectCheckoutItem>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectAddressRequest {
    pub address_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectShippingRequest {
    pub shipping_method_id: i64,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    /// 缺省为货到付款 ("cod")
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub step: CheckoutStep,
    pub lines: Vec<OrderLine>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_amount: i64,
    pub total_amount: i64,
    pub address_id: Option<i64>,
    pub shipping_method_id: Option<i64>,
    pub order_id: Option<i64>,
    pub order_number: Option<String>,
    pub failure: Option<String>,
}
