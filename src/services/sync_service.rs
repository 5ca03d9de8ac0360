use crate::entities::{OrderStatus, order_entity as orders};
use crate::error::AppResult;
use crate::events::{ChangeFeed, OrderChanged};
use crate::models::QueueAlert;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// 待取告警的保留上限，超出丢最旧的
const MAX_PENDING_ALERTS: usize = 100;

#[derive(Default)]
struct SyncState {
    /// 管理端行动队列：不含 delivered，新订单在前
    queue: Vec<orders::Model>,
    /// 队列告警，take_alerts 取走即消费
    alerts: Vec<QueueAlert>,
    /// 每用户的订单实时视图，首次读取时从数据库水化
    histories: HashMap<i64, Vec<orders::Model>>,
    /// 首次轮询静默建立基线，避免启动时告警轰炸
    primed: bool,
}

impl SyncState {
    fn push_alert(&mut self, alert: QueueAlert) {
        self.alerts.push(alert);
        if self.alerts.len() > MAX_PENDING_ALERTS {
            let overflow = self.alerts.len() - MAX_PENDING_ALERTS;
            self.alerts.drain(0..overflow);
            log::warn!("Alert backlog overflowed, dropped {overflow} oldest alerts");
        }
    }

    /// 不产生告警的视图更新，轮询基线用
    fn install_silent(&mut self, row: &orders::Model) {
        match self.queue.iter().position(|o| o.id == row.id) {
            Some(i) if row.status == OrderStatus::Delivered => {
                self.queue.remove(i);
            }
            Some(i) => self.queue[i] = row.clone(),
            None if row.status != OrderStatus::Delivered => self.queue.insert(0, row.clone()),
            None => {}
        }
        if let Some(view) = self.histories.get_mut(&row.user_id) {
            match view.iter().position(|o| o.id == row.id) {
                Some(i) => view[i] = row.clone(),
                None => view.insert(0, row.clone()),
            }
        }
    }
}

/// 订单同步层：订阅变更总线，维护管理端队列与客户订单视图，
/// 并用周期轮询兜底丢失的事件。
#[derive(Clone)]
pub struct SyncService {
    pool: DatabaseConnection,
    feed: ChangeFeed,
    state: Arc<Mutex<SyncState>>,
}

impl SyncService {
    pub fn new(pool: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self {
            pool,
            feed,
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    /// 事件循环。Lagged 只记日志等轮询兜底，总线关闭才退出
    pub async fn run(self) {
        let mut rx = self.feed.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => self.apply_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Order feed lagged, {n} events skipped; polling will reconcile");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    log::info!("Order feed closed, sync listener exiting");
                    break;
                }
            }
        }
    }

    /// 把一条变更落到两个视图上。按存量状态做变化检测，
    /// 重复投递同一事件不会产生重复告警
    pub async fn apply_event(&self, event: &OrderChanged) {
        let new = &event.new;
        let mut state = self.state.lock().await;

        match state.queue.iter().position(|o| o.id == new.id) {
            Some(i) => {
                let stored_status = state.queue[i].status;
                if new.status == OrderStatus::Delivered {
                    state.queue.remove(i);
                    state.push_alert(QueueAlert::StatusChanged {
                        order_id: new.id,
                        order_number: new.order_number.clone(),
                        from: stored_status,
                        to: new.status,
                    });
                } else if stored_status != new.status {
                    state.queue[i] = new.clone();
                    state.push_alert(QueueAlert::StatusChanged {
                        order_id: new.id,
                        order_number: new.order_number.clone(),
                        from: stored_status,
                        to: new.status,
                    });
                } else {
                    state.queue[i] = new.clone();
                }
            }
            None => {
                // delivered 的订单不进行动队列
                if new.status != OrderStatus::Delivered {
                    state.queue.insert(0, new.clone());
                    state.push_alert(QueueAlert::NewOrder {
                        order_id: new.id,
                        order_number: new.order_number.clone(),
                    });
                }
            }
        }

        // 客户视图只更新已水化的用户，其余等首次读取时再水化
        if let Some(view) = state.histories.get_mut(&new.user_id) {
            match view.iter().position(|o| o.id == new.id) {
                Some(i) => view[i] = new.clone(),
                None => view.insert(0, new.clone()),
            }
        }
    }

    /// 轮询兜底：比对数据库与视图，为漏掉的变更补发合成事件。
    /// 首次运行只建立基线不发事件。返回补发的事件数
    pub async fn poll_once(&self) -> AppResult<usize> {
        let rows = orders::Entity::find()
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .all(&self.pool)
            .await?;

        let mut synthetic: Vec<OrderChanged> = Vec::new();
        {
            let mut state = self.state.lock().await;
            if !state.primed {
                for row in rows.iter().rev() {
                    state.install_silent(row);
                }
                state.primed = true;
                return Ok(0);
            }

            for row in rows.iter().rev() {
                let known = state
                    .queue
                    .iter()
                    .find(|o| o.id == row.id)
                    .or_else(|| {
                        state
                            .histories
                            .get(&row.user_id)
                            .and_then(|v| v.iter().find(|o| o.id == row.id))
                    });
                match known {
                    None => {
                        let tracked_history = state.histories.contains_key(&row.user_id);
                        if row.status != OrderStatus::Delivered || tracked_history {
                            synthetic.push(OrderChanged::inserted(row.clone()));
                        }
                    }
                    Some(known) if known.status != row.status => {
                        synthetic.push(OrderChanged::updated(known.clone(), row.clone()));
                    }
                    Some(_) => {}
                }
            }
        }

        let count = synthetic.len();
        if count > 0 {
            log::info!("Order poll reconciled {count} missed changes");
        }
        for event in synthetic {
            self.apply_event(&event).await;
            self.feed.publish(event);
        }
        Ok(count)
    }

    /// 管理端队列快照（未建立基线时先走一次轮询）
    pub async fn admin_queue(&self) -> AppResult<Vec<orders::Model>> {
        self.ensure_primed().await?;
        Ok(self.state.lock().await.queue.clone())
    }

    /// 取走累计的队列告警
    pub async fn take_alerts(&self) -> Vec<QueueAlert> {
        std::mem::take(&mut self.state.lock().await.alerts)
    }

    /// 某用户的实时订单视图，首次访问从数据库水化
    pub async fn history_for(&self, user_id: i64) -> AppResult<Vec<orders::Model>> {
        {
            let state = self.state.lock().await;
            if let Some(view) = state.histories.get(&user_id) {
                return Ok(view.clone());
            }
        }

        let rows = orders::Entity::find()
            .filter(orders::Column::UserId.eq(user_id))
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .all(&self.pool)
            .await?;

        let mut state = self.state.lock().await;
        let view = state.histories.entry(user_id).or_insert(rows);
        Ok(view.clone())
    }

    async fn ensure_primed(&self) -> AppResult<()> {
        let primed = { self.state.lock().await.primed };
        if !primed {
            self.poll_once().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::external::TelegramService;
    use crate::models::{AddCartItemRequest, OrderLine};
    use crate::services::{CartService, NewOrder, NotificationService, OrderService};
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, Set};
    use std::time::Duration;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn make_order(id: i64, user_id: i64, status: OrderStatus) -> orders::Model {
        orders::Model {
            id,
            user_id,
            order_number: format!("ORD-{id}"),
            status,
            subtotal: 500,
            tax_amount: 0,
            shipping_amount: 50,
            total_amount: 550,
            billing_address_id: Some(1),
            shipping_address_id: Some(1),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    async fn seed_order(db: &DatabaseConnection, user_id: i64, status: OrderStatus) -> orders::Model {
        orders::ActiveModel {
            user_id: Set(user_id),
            order_number: Set(format!(
                "ORD-{}-{user_id}",
                Utc::now().timestamp_nanos_opt().unwrap_or(0)
            )),
            status: Set(status),
            subtotal: Set(500),
            tax_amount: Set(0),
            shipping_amount: Set(50),
            total_amount: Set(550),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_event_enters_queue_and_alerts_once() {
        let db = setup_db().await;
        let sync = SyncService::new(db, ChangeFeed::new(16));

        let order = make_order(1, 7, OrderStatus::Processing);
        sync.apply_event(&OrderChanged::inserted(order.clone())).await;

        let queue = sync.admin_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, 1);

        let alerts = sync.take_alerts().await;
        assert_eq!(alerts.len(), 1);
        assert!(matches!(alerts[0], QueueAlert::NewOrder { order_id: 1, .. }));

        // 告警取走即消费
        assert!(sync.take_alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_change_updates_queue_entry_in_place() {
        let db = setup_db().await;
        let sync = SyncService::new(db, ChangeFeed::new(16));

        let order = make_order(1, 7, OrderStatus::Processing);
        sync.apply_event(&OrderChanged::inserted(order.clone())).await;

        let shipped = orders::Model {
            status: OrderStatus::Shipped,
            ..order.clone()
        };
        sync.apply_event(&OrderChanged::updated(order, shipped.clone())).await;
        // 同一变更重复投递不产生重复告警
        sync.apply_event(&OrderChanged::updated(
            make_order(1, 7, OrderStatus::Processing),
            shipped,
        ))
        .await;

        let queue = sync.admin_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, OrderStatus::Shipped);

        let alerts = sync.take_alerts().await;
        assert_eq!(alerts.len(), 2);
        assert!(matches!(alerts[0], QueueAlert::NewOrder { .. }));
        assert!(matches!(
            alerts[1],
            QueueAlert::StatusChanged {
                from: OrderStatus::Processing,
                to: OrderStatus::Shipped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delivered_orders_leave_queue_but_stay_in_history() {
        let db = setup_db().await;
        let sync = SyncService::new(db.clone(), ChangeFeed::new(16));

        let seeded = seed_order(&db, 7, OrderStatus::Shipped).await;

        // 先水化客户视图再送达
        let history = sync.history_for(7).await.unwrap();
        assert_eq!(history.len(), 1);

        sync.apply_event(&OrderChanged::inserted(seeded.clone())).await;
        let delivered = orders::Model {
            status: OrderStatus::Delivered,
            ..seeded.clone()
        };
        sync.apply_event(&OrderChanged::updated(seeded, delivered)).await;

        let queue = sync.admin_queue().await.unwrap();
        assert!(queue.iter().all(|o| o.status != OrderStatus::Delivered));

        let history = sync.history_for(7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_first_poll_builds_baseline_without_alerts() {
        let db = setup_db().await;
        seed_order(&db, 1, OrderStatus::Processing).await;
        seed_order(&db, 2, OrderStatus::Shipped).await;
        seed_order(&db, 3, OrderStatus::Delivered).await;

        let sync = SyncService::new(db, ChangeFeed::new(16));
        let emitted = sync.poll_once().await.unwrap();
        assert_eq!(emitted, 0);

        let queue = sync.admin_queue().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(sync.take_alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_poll_reconciles_changes_that_bypassed_the_feed() {
        let db = setup_db().await;
        let seeded = seed_order(&db, 7, OrderStatus::Processing).await;

        let sync = SyncService::new(db.clone(), ChangeFeed::new(16));
        sync.poll_once().await.unwrap();

        // 绕过总线直接改库
        let mut am = sea_orm::IntoActiveModel::into_active_model(seeded);
        am.status = Set(OrderStatus::Shipped);
        am.update(&db).await.unwrap();
        seed_order(&db, 8, OrderStatus::Processing).await;

        let emitted = sync.poll_once().await.unwrap();
        assert_eq!(emitted, 2);

        let queue = sync.admin_queue().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().any(|o| o.status == OrderStatus::Shipped));

        let alerts = sync.take_alerts().await;
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| matches!(a, QueueAlert::NewOrder { .. })));
        assert!(alerts.iter().any(|a| matches!(
            a,
            QueueAlert::StatusChanged {
                from: OrderStatus::Processing,
                to: OrderStatus::Shipped,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_admin_ship_reflects_in_customer_view_without_reload() {
        let db = setup_db().await;
        let feed = ChangeFeed::new(16);

        let cart = CartService::new(db.clone());
        let telegram = TelegramService::new(TelegramConfig::default());
        let (notifications, _worker) = NotificationService::new(telegram, 1, 0);
        let order_svc = OrderService::new(db.clone(), feed.clone(), cart.clone(), notifications);
        let sync = SyncService::new(db.clone(), feed.clone());

        tokio::spawn(sync.clone().run());

        let user = crate::entities::user_entity::ActiveModel {
            email: Set("ivy@example.com".to_string()),
            full_name: Set(Some("Ivy".to_string())),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let product = crate::entities::product_entity::ActiveModel {
            name: Set("Tieguanyin".to_string()),
            price: Set(500),
            stock: Set(10),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        cart.add_item(
            user.id,
            AddCartItemRequest {
                product_id: product.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();
        let order = order_svc
            .place_order(NewOrder {
                user_id: user.id,
                address_id: 1,
                payment_method: "cod".to_string(),
                lines: vec![OrderLine {
                    product_id: product.id,
                    product_name: "Tieguanyin".to_string(),
                    quantity: 1,
                    unit_price: 500,
                    sale_unit_price: None,
                }],
                subtotal: 500,
                tax_amount: 0,
                shipping_amount: 50,
                total_amount: 550,
            })
            .await
            .unwrap();

        // 等事件循环水化后的视图看到 processing
        let mut status = None;
        for _ in 0..100 {
            let history = sync.history_for(user.id).await.unwrap();
            if let Some(first) = history.first() {
                status = Some(first.status);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(OrderStatus::Processing));

        // 管理端发货，客户视图不重新水化也要看到 shipped
        order_svc.update_status(order.id, "shipped").await.unwrap();

        let mut status = None;
        for _ in 0..100 {
            let history = sync.history_for(user.id).await.unwrap();
            if history.first().map(|o| o.status) == Some(OrderStatus::Shipped) {
                status = Some(OrderStatus::Shipped);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(OrderStatus::Shipped));
    }
}
