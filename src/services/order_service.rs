use crate::entities::{
    OrderStatus, PaymentStatus, order_entity as orders, order_item_entity as order_items,
    payment_entity as payments, product_entity as products, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::events::{ChangeFeed, OrderChanged};
use crate::models::*;
use crate::services::{CartService, NotificationService, OrderNotification};
use crate::utils::generate_order_number;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

/// 下单输入。行项目与金额都来自结算快照
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub address_id: i64,
    pub payment_method: String,
    pub lines: Vec<OrderLine>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_amount: i64,
    pub total_amount: i64,
}

#[derive(Clone)]
pub struct OrderService {
    pool: DatabaseConnection,
    feed: ChangeFeed,
    cart_service: CartService,
    notifications: NotificationService,
}

impl OrderService {
    pub fn new(
        pool: DatabaseConnection,
        feed: ChangeFeed,
        cart_service: CartService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            pool,
            feed,
            cart_service,
            notifications,
        }
    }

    /// 创建订单。各步骤按程序顺序执行，没有整体事务也不回滚：
    /// 任一步失败时，前面已落库的行保持原样（部分状态是约定行为）。
    pub async fn place_order(&self, input: NewOrder) -> AppResult<orders::Model> {
        if input.lines.is_empty() {
            return Err(AppError::ValidationError(
                "Cannot place an order without items".to_string(),
            ));
        }

        let now = Utc::now();
        let order_number = generate_order_number();

        // 1. 订单行。写入即对外可见，不等后续步骤
        let order = orders::ActiveModel {
            user_id: Set(input.user_id),
            order_number: Set(order_number),
            status: Set(OrderStatus::Processing),
            subtotal: Set(input.subtotal),
            tax_amount: Set(input.tax_amount),
            shipping_amount: Set(input.shipping_amount),
            total_amount: Set(input.total_amount),
            billing_address_id: Set(Some(input.address_id)),
            shipping_address_id: Set(Some(input.address_id)),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        self.feed.publish(OrderChanged::inserted(order.clone()));

        // 2. 订单明细，沿用快照价格。失败即失败，订单行保留
        for line in &input.lines {
            order_items::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                price_at_purchase: Set(line.unit_price),
                sale_price_at_purchase: Set(line.sale_unit_price),
                created_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&self.pool)
            .await?;
        }

        // 3. 尽力扣减库存，单行失败跳过，订单不受影响
        self.decrement_stock(order.id, &input.lines).await;

        // 4. 支付记录。失败即失败，但订单与明细已经存在
        payments::ActiveModel {
            order_id: Set(order.id),
            amount: Set(input.total_amount),
            payment_method: Set(input.payment_method.clone()),
            status: Set(PaymentStatus::Pending),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        // 5. 清空购物车，Buy Now 也清。失败影响上报结果，订单仍保留
        self.cart_service.clear(input.user_id).await?;

        // 6. 外发通知，入队即忘
        self.enqueue_notification(&order, &input.lines).await;

        Ok(order)
    }

    async fn decrement_stock(&self, order_id: i64, lines: &[OrderLine]) {
        for line in lines {
            match products::Entity::find_by_id(line.product_id)
                .one(&self.pool)
                .await
            {
                Ok(Some(product)) => {
                    // 不做预占，并发下单可能超卖，库存在0封底
                    let new_stock = (product.stock - line.quantity as i64).max(0);
                    let mut am = product.into_active_model();
                    am.stock = Set(new_stock);
                    am.updated_at = Set(Some(Utc::now()));
                    if let Err(e) = am.update(&self.pool).await {
                        log::error!(
                            "Stock decrement failed for product {} on order {}: {}",
                            line.product_id,
                            order_id,
                            e
                        );
                    }
                }
                Ok(None) => {
                    log::warn!(
                        "Product {} missing during stock decrement for order {}, skipping",
                        line.product_id,
                        order_id
                    );
                }
                Err(e) => {
                    log::error!(
                        "Stock read failed for product {} on order {}: {}",
                        line.product_id,
                        order_id,
                        e
                    );
                }
            }
        }
    }

    async fn enqueue_notification(&self, order: &orders::Model, lines: &[OrderLine]) {
        let (customer_name, customer_email) = match users::Entity::find_by_id(order.user_id)
            .one(&self.pool)
            .await
        {
            Ok(Some(user)) => (
                user.full_name.unwrap_or_else(|| "Guest".to_string()),
                user.email,
            ),
            Ok(None) => ("Guest".to_string(), String::new()),
            Err(e) => {
                log::warn!("Customer lookup failed for order notification: {}", e);
                ("Guest".to_string(), String::new())
            }
        };

        self.notifications.enqueue(OrderNotification {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_name,
            customer_email,
            total_amount: order.total_amount,
            lines: lines.to_vec(),
        });
    }

    /// 客户订单历史，新订单在前
    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<OrderResponse>> {
        let rows = orders::Entity::find()
            .filter(orders::Column::UserId.eq(user_id))
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .all(&self.pool)
            .await?;
        self.attach_items(rows).await
    }

    /// 给一批订单行补齐明细，订单同步视图的出口也用它
    pub async fn attach_items(&self, rows: Vec<orders::Model>) -> AppResult<Vec<OrderResponse>> {
        let mut items_map = self.load_items(rows.iter().map(|o| o.id).collect()).await?;
        Ok(rows
            .into_iter()
            .map(|o| {
                let items = items_map.remove(&o.id).unwrap_or_default();
                OrderResponse::from_parts(o, items)
            })
            .collect())
    }

    pub async fn get_for_user(&self, user_id: i64, order_id: i64) -> AppResult<OrderResponse> {
        let order = orders::Entity::find_by_id(order_id)
            .one(&self.pool)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order.id))
            .order_by_asc(order_items::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(OrderResponse::from_parts(order, items))
    }

    /// 管理端全量订单（含已送达），带客户信息
    pub async fn list_all(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<AdminOrderResponse>> {
        #[derive(Debug, sea_orm::FromQueryResult)]
        struct CountRow {
            count: i64,
        }
        let total = orders::Entity::find()
            .select_only()
            .column_as(Expr::val(1).count(), "count")
            .into_model::<CountRow>()
            .one(&self.pool)
            .await?
            .map(|r| r.count)
            .unwrap_or(0);

        let rows = orders::Entity::find()
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .offset(params.offset())
            .limit(params.page_size())
            .all(&self.pool)
            .await?;

        let items = self.enrich_for_admin(rows).await?;

        Ok(PaginatedResponse::new(items, params, total as u64))
    }

    /// 把订单行批量补齐明细与客户信息，管理端队列快照也走这里
    pub async fn enrich_for_admin(
        &self,
        rows: Vec<orders::Model>,
    ) -> AppResult<Vec<AdminOrderResponse>> {
        let mut items_map = self.load_items(rows.iter().map(|o| o.id).collect()).await?;

        let user_ids: Vec<i64> = rows.iter().map(|o| o.user_id).collect();
        let users_map: HashMap<i64, users::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|o| {
                let items = items_map.remove(&o.id).unwrap_or_default();
                let user = users_map.get(&o.user_id);
                AdminOrderResponse {
                    id: o.id,
                    user_id: o.user_id,
                    order_number: o.order_number,
                    status: o.status,
                    subtotal: o.subtotal,
                    tax_amount: o.tax_amount,
                    shipping_amount: o.shipping_amount,
                    total_amount: o.total_amount,
                    customer_name: user.and_then(|u| u.full_name.clone()),
                    customer_email: user.map(|u| u.email.clone()),
                    created_at: o.created_at,
                    updated_at: o.updated_at,
                    items: items.into_iter().map(Into::into).collect(),
                }
            })
            .collect())
    }

    /// 更新订单状态。状态机在服务端校验，
    /// 成功后发布带新旧快照的变更事件
    pub async fn update_status(&self, order_id: i64, status: &str) -> AppResult<OrderResponse> {
        let requested = status.trim();
        let next = OrderStatus::parse(requested).ok_or_else(|| {
            AppError::ValidationError(format!("Unknown order status: {requested}"))
        })?;

        let order = orders::Entity::find_by_id(order_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if !order.status.can_transition_to(next) {
            return Err(AppError::ValidationError(format!(
                "Cannot change order status from {} to {}",
                order.status, next
            )));
        }

        let old = order.clone();
        let mut am = order.into_active_model();
        am.status = Set(next);
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&self.pool).await?;

        self.feed
            .publish(OrderChanged::updated(old, updated.clone()));

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(updated.id))
            .order_by_asc(order_items::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(OrderResponse::from_parts(updated, items))
    }

    pub async fn list_payments_for_order(&self, order_id: i64) -> AppResult<Vec<PaymentResponse>> {
        let rows = payments::Entity::find()
            .filter(payments::Column::OrderId.eq(order_id))
            .order_by_asc(payments::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PaymentResponse::from).collect())
    }

    /// 支付状态独立于订单状态机，可直接改写
    pub async fn update_payment_status(
        &self,
        payment_id: i64,
        status: &str,
    ) -> AppResult<PaymentResponse> {
        let requested = status.trim();
        let next = PaymentStatus::parse(requested).ok_or_else(|| {
            AppError::ValidationError(format!("Unknown payment status: {requested}"))
        })?;

        let payment = payments::Entity::find_by_id(payment_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        let mut am = payment.into_active_model();
        am.status = Set(next);
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&self.pool).await?;

        Ok(PaymentResponse::from(updated))
    }

    async fn load_items(
        &self,
        order_ids: Vec<i64>,
    ) -> AppResult<HashMap<i64, Vec<order_items::Model>>> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = order_items::Entity::find()
            .filter(order_items::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_items::Column::Id)
            .all(&self.pool)
            .await?;

        let mut map: HashMap<i64, Vec<order_items::Model>> = HashMap::new();
        for row in rows {
            map.entry(row.order_id).or_default().push(row);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::events::ChangeOp;
    use crate::external::TelegramService;
    use crate::services::NotificationWorker;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};

    async fn setup() -> (DatabaseConnection, OrderService, CartService, NotificationWorker) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let feed = ChangeFeed::new(16);
        let cart_service = CartService::new(db.clone());
        let telegram = TelegramService::new(TelegramConfig::default());
        let (notifications, worker) = NotificationService::new(telegram, 1, 0);
        let svc = OrderService::new(db.clone(), feed, cart_service.clone(), notifications);
        (db, svc, cart_service, worker)
    }

    async fn seed_user(db: &DatabaseConnection, email: &str, name: &str) -> i64 {
        users::ActiveModel {
            email: Set(email.to_string()),
            full_name: Set(Some(name.to_string())),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    async fn seed_product(db: &DatabaseConnection, name: &str, price: i64, stock: i64) -> i64 {
        products::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    fn one_line(product_id: i64, name: &str, price: i64, quantity: i32) -> Vec<OrderLine> {
        vec![OrderLine {
            product_id,
            product_name: name.to_string(),
            quantity,
            unit_price: price,
            sale_unit_price: None,
        }]
    }

    fn new_order(user_id: i64, lines: Vec<OrderLine>, subtotal: i64, shipping: i64) -> NewOrder {
        NewOrder {
            user_id,
            address_id: 1,
            payment_method: "cod".to_string(),
            lines,
            subtotal,
            tax_amount: 0,
            shipping_amount: shipping,
            total_amount: subtotal + shipping,
        }
    }

    async fn drop_table(db: &DatabaseConnection, table: &str) {
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("DROP TABLE {table}"),
        ))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_placing_order_writes_all_rows_and_clears_cart() {
        let (db, svc, cart, _worker) = setup().await;
        let user_id = seed_user(&db, "alice@example.com", "Alice").await;
        let product_id = seed_product(&db, "Oolong", 500, 10).await;

        cart.add_item(user_id, AddCartItemRequest { product_id, quantity: 1 })
            .await
            .unwrap();

        let order = svc
            .place_order(new_order(
                user_id,
                one_line(product_id, "Oolong", 500, 1),
                500,
                50,
            ))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.subtotal, 500);
        assert_eq!(order.tax_amount, 0);
        assert_eq!(order.total_amount, 550);
        assert!(order.order_number.starts_with("ORD-"));

        let detail = svc.get_for_user(user_id, order.id).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].price_at_purchase, 500);

        let product = products::Entity::find_by_id(product_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 9);

        let payments = svc.list_payments_for_order(order.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, 550);
        assert_eq!(payments[0].status, PaymentStatus::Pending);

        assert!(cart.get_cart(user_id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_order_insert_publishes_feed_event() {
        let (db, svc, _cart, _worker) = setup().await;
        let user_id = seed_user(&db, "bob@example.com", "Bob").await;
        let product_id = seed_product(&db, "Sencha", 400, 5).await;

        let mut rx = svc.feed.subscribe();
        let order = svc
            .place_order(new_order(
                user_id,
                one_line(product_id, "Sencha", 400, 1),
                400,
                0,
            ))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, ChangeOp::Insert);
        assert_eq!(event.new.id, order.id);
        assert_eq!(event.new.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_oversold_stock_floors_at_zero() {
        let (db, svc, _cart, _worker) = setup().await;
        let user_a = seed_user(&db, "a@example.com", "A").await;
        let user_b = seed_user(&db, "b@example.com", "B").await;
        let product_id = seed_product(&db, "Last tin", 700, 1).await;

        svc.place_order(new_order(user_a, one_line(product_id, "Last tin", 700, 1), 700, 0))
            .await
            .unwrap();
        svc.place_order(new_order(user_b, one_line(product_id, "Last tin", 700, 1), 700, 0))
            .await
            .unwrap();

        let product = products::Entity::find_by_id(product_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 0);

        // 两个订单都成立，超卖被接受
        assert_eq!(svc.list_for_user(user_a).await.unwrap().len(), 1);
        assert_eq!(svc.list_for_user(user_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_failure_leaves_order_and_items_in_place() {
        let (db, svc, cart, _worker) = setup().await;
        let user_id = seed_user(&db, "carol@example.com", "Carol").await;
        let product_id = seed_product(&db, "Puer", 900, 3).await;

        cart.add_item(user_id, AddCartItemRequest { product_id, quantity: 1 })
            .await
            .unwrap();

        drop_table(&db, "payments").await;

        let result = svc
            .place_order(new_order(
                user_id,
                one_line(product_id, "Puer", 900, 1),
                900,
                50,
            ))
            .await;
        assert!(result.is_err());

        // 订单与明细保留在processing，没有支付记录
        let history = svc.list_for_user(user_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Processing);
        assert_eq!(history[0].items.len(), 1);

        // 清空购物车发生在支付之后，因此购物车原样保留
        assert_eq!(cart.get_cart(user_id).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_stock_failure_is_skipped_and_order_succeeds() {
        let (db, svc, _cart, _worker) = setup().await;
        let user_id = seed_user(&db, "dave@example.com", "Dave").await;
        let product_id = seed_product(&db, "Gyokuro", 1200, 4).await;
        let lines = one_line(product_id, "Gyokuro", 1200, 2);

        drop_table(&db, "products").await;

        let order = svc
            .place_order(new_order(user_id, lines, 2400, 100))
            .await
            .unwrap();

        let detail = svc.get_for_user(user_id, order.id).await.unwrap();
        assert_eq!(detail.total_amount, 2500);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(svc.list_payments_for_order(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_updates_follow_the_state_machine() {
        let (db, svc, _cart, _worker) = setup().await;
        let user_id = seed_user(&db, "erin@example.com", "Erin").await;
        let product_id = seed_product(&db, "Longjing", 600, 5).await;

        let order = svc
            .place_order(new_order(
                user_id,
                one_line(product_id, "Longjing", 600, 1),
                600,
                0,
            ))
            .await
            .unwrap();

        let mut rx = svc.feed.subscribe();

        // 状态字符串先trim再解析
        let shipped = svc.update_status(order.id, " shipped ").await.unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, ChangeOp::Update);
        assert_eq!(event.old.unwrap().status, OrderStatus::Processing);
        assert_eq!(event.new.status, OrderStatus::Shipped);

        // 回退与未知状态都被拒绝
        assert!(matches!(
            svc.update_status(order.id, "processing").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.update_status(order.id, "teleported").await,
            Err(AppError::ValidationError(_))
        ));

        let delivered = svc.update_status(order.id, "delivered").await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        // 终态之后一律拒绝
        assert!(matches!(
            svc.update_status(order.id, "cancelled").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_owner_scoped_and_newest_first() {
        let (db, svc, _cart, _worker) = setup().await;
        let alice = seed_user(&db, "alice2@example.com", "Alice").await;
        let mallory = seed_user(&db, "mallory@example.com", "Mallory").await;
        let product_id = seed_product(&db, "Keemun", 500, 10).await;

        let first = svc
            .place_order(new_order(alice, one_line(product_id, "Keemun", 500, 1), 500, 0))
            .await
            .unwrap();
        let second = svc
            .place_order(new_order(alice, one_line(product_id, "Keemun", 500, 2), 1000, 0))
            .await
            .unwrap();

        let history = svc.list_for_user(alice).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        assert!(svc.list_for_user(mallory).await.unwrap().is_empty());
        assert!(matches!(
            svc.get_for_user(mallory, first.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_status_is_updateable_independently() {
        let (db, svc, _cart, _worker) = setup().await;
        let user_id = seed_user(&db, "frank@example.com", "Frank").await;
        let product_id = seed_product(&db, "Baihao", 800, 2).await;

        let order = svc
            .place_order(new_order(
                user_id,
                one_line(product_id, "Baihao", 800, 1),
                800,
                0,
            ))
            .await
            .unwrap();

        let payment_id = svc.list_payments_for_order(order.id).await.unwrap()[0].id;
        let updated = svc
            .update_payment_status(payment_id, "completed")
            .await
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Completed);

        // 订单状态不随支付状态变化
        let detail = svc.get_for_user(user_id, order.id).await.unwrap();
        assert_eq!(detail.status, OrderStatus::Processing);

        assert!(matches!(
            svc.update_payment_status(payment_id, "gold-pressed").await,
            Err(AppError::ValidationError(_))
        ));
    }
}
