use crate::entities::product_entity as products;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{AddressService, CartService, NewOrder, OrderService, ShippingService};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 每用户一份的结算会话，只存在内存里。
/// 行快照在 start 时解析一次，此后购物车怎么改都不影响本次结算。
#[derive(Debug, Clone)]
struct CheckoutSession {
    step: CheckoutStep,
    lines: Vec<OrderLine>,
    merchandise_total: i64,
    address_id: Option<i64>,
    shipping_method_id: Option<i64>,
    shipping_cost: i64,
    payment_method: String,
    order_id: Option<i64>,
    order_number: Option<String>,
    failure: Option<String>,
}

impl CheckoutSession {
    fn view(&self) -> CheckoutSessionResponse {
        CheckoutSessionResponse {
            step: self.step,
            lines: self.lines.clone(),
            subtotal: self.merchandise_total,
            tax_amount: 0,
            shipping_amount: self.shipping_cost,
            total_amount: self.merchandise_total + self.shipping_cost,
            address_id: self.address_id,
            shipping_method_id: self.shipping_method_id,
            order_id: self.order_id,
            order_number: self.order_number.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// 结算向导：Address → Shipping → Review → (Success | Failed)。
/// 步骤只能前进，例外是 retry (Failed → Review) 与 close。
#[derive(Clone)]
pub struct CheckoutService {
    pool: DatabaseConnection,
    sessions: Arc<Mutex<HashMap<i64, CheckoutSession>>>,
    cart_service: CartService,
    address_service: AddressService,
    shipping_service: ShippingService,
    order_service: OrderService,
}

impl CheckoutService {
    pub fn new(
        pool: DatabaseConnection,
        cart_service: CartService,
        address_service: AddressService,
        shipping_service: ShippingService,
        order_service: OrderService,
    ) -> Self {
        Self {
            pool,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            cart_service,
            address_service,
            shipping_service,
            order_service,
        }
    }

    /// 开始结算。直接下单传 items（Buy Now），否则快照整个购物车。
    /// 重复 start 会替换掉旧会话
    pub async fn start(
        &self,
        user_id: i64,
        req: StartCheckoutRequest,
    ) -> AppResult<CheckoutSessionResponse> {
        let lines = match req.items {
            Some(items) if !items.is_empty() => self.snapshot_direct(&items).await?,
            _ => self.cart_service.snapshot_lines(user_id).await?,
        };

        if lines.is_empty() {
            return Err(AppError::ValidationError(
                "Cannot start checkout with an empty cart".to_string(),
            ));
        }

        let merchandise_total = lines.iter().map(|l| l.line_total()).sum();
        let session = CheckoutSession {
            step: CheckoutStep::Address,
            lines,
            merchandise_total,
            address_id: None,
            shipping_method_id: None,
            shipping_cost: 0,
            payment_method: "cod".to_string(),
            order_id: None,
            order_number: None,
            failure: None,
        };

        let mut sessions = self.sessions.lock().await;
        sessions.insert(user_id, session);
        Ok(sessions[&user_id].view())
    }

    pub async fn session(&self, user_id: i64) -> AppResult<CheckoutSessionResponse> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|s| s.view())
            .ok_or_else(|| AppError::NotFound("No active checkout session".to_string()))
    }

    /// 选择收货地址并提升为默认地址，进入 Shipping 步骤
    pub async fn select_address(
        &self,
        user_id: i64,
        req: SelectAddressRequest,
    ) -> AppResult<CheckoutSessionResponse> {
        let mut sessions = self.sessions.lock().await;
        let session = Self::session_at(&mut sessions, user_id, CheckoutStep::Address)?;

        let address = self.address_service.set_default(user_id, req.address_id).await?;

        session.address_id = Some(address.id);
        session.step = CheckoutStep::Shipping;
        Ok(session.view())
    }

    /// 在向导里新建地址并直接选中
    pub async fn create_address(
        &self,
        user_id: i64,
        req: CreateAddressRequest,
    ) -> AppResult<CheckoutSessionResponse> {
        let mut sessions = self.sessions.lock().await;
        let session = Self::session_at(&mut sessions, user_id, CheckoutStep::Address)?;

        let created = self.address_service.create(user_id, req).await?;
        let address = self.address_service.set_default(user_id, created.id).await?;

        session.address_id = Some(address.id);
        session.step = CheckoutStep::Shipping;
        Ok(session.view())
    }

    pub async fn select_shipping(
        &self,
        user_id: i64,
        req: SelectShippingRequest,
    ) -> AppResult<CheckoutSessionResponse> {
        let mut sessions = self.sessions.lock().await;
        let session = Self::session_at(&mut sessions, user_id, CheckoutStep::Shipping)?;

        let method = self
            .shipping_service
            .get_active(req.shipping_method_id)
            .await?;

        session.shipping_method_id = Some(method.id);
        session.shipping_cost = method.rate;
        session.step = CheckoutStep::Review;
        Ok(session.view())
    }

    /// 确认下单。交易失败不报错误响应，
    /// 会话进入 Failed 并携带失败原因，可 retry
    pub async fn place(
        &self,
        user_id: i64,
        req: PlaceOrderRequest,
    ) -> AppResult<CheckoutSessionResponse> {
        let mut sessions = self.sessions.lock().await;
        let session = Self::session_at(&mut sessions, user_id, CheckoutStep::Review)?;

        if let Some(method) = req.payment_method {
            session.payment_method = method;
        }
        let Some(address_id) = session.address_id else {
            return Err(AppError::ValidationError(
                "No address selected".to_string(),
            ));
        };

        let input = NewOrder {
            user_id,
            address_id,
            payment_method: session.payment_method.clone(),
            lines: session.lines.clone(),
            subtotal: session.merchandise_total,
            tax_amount: 0,
            shipping_amount: session.shipping_cost,
            total_amount: session.merchandise_total + session.shipping_cost,
        };

        match self.order_service.place_order(input).await {
            Ok(order) => {
                session.step = CheckoutStep::Success;
                session.order_id = Some(order.id);
                session.order_number = Some(order.order_number);
                session.failure = None;
            }
            Err(e) => {
                log::error!("Order placement failed for user {user_id}: {e}");
                session.step = CheckoutStep::Failed;
                session.failure = Some(e.to_string());
            }
        }

        Ok(session.view())
    }

    /// 失败后重试：回到 Review，快照与金额原样保留
    pub async fn retry(&self, user_id: i64) -> AppResult<CheckoutSessionResponse> {
        let mut sessions = self.sessions.lock().await;
        let session = Self::session_at(&mut sessions, user_id, CheckoutStep::Failed)?;

        session.step = CheckoutStep::Review;
        session.failure = None;
        Ok(session.view())
    }

    /// 关闭向导，丢弃会话。任何步骤都可以关，重复关不报错
    pub async fn close(&self, user_id: i64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&user_id);
    }

    fn session_at<'a>(
        sessions: &'a mut HashMap<i64, CheckoutSession>,
        user_id: i64,
        expected: CheckoutStep,
    ) -> AppResult<&'a mut CheckoutSession> {
        let session = sessions
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("No active checkout session".to_string()))?;
        if session.step != expected {
            return Err(AppError::ValidationError(format!(
                "Checkout step must be {:?}",
                expected
            )));
        }
        Ok(session)
    }

    async fn snapshot_direct(&self, items: &[DirectCheckoutItem]) -> AppResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity < 1 {
                return Err(AppError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }
            let product = products::Entity::find_by_id(item.product_id)
                .one(&self.pool)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

            lines.push(OrderLine {
                product_id: product.id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
                sale_unit_price: product.sale_price,
            });
        }
        Ok(lines)
    }
}
