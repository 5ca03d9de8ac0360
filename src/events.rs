//! 订单变更事件总线。
//!
//! 本地写入（下单、状态更新）与轮询兜底都会发布事件；
//! 管理端队列与客户订单视图订阅同一总线保持一致。

use crate::entities::order_entity as orders;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
}

/// 订单行变更事件，携带变更前后的完整行快照
#[derive(Clone, Debug)]
pub struct OrderChanged {
    pub event_id: Uuid,
    pub op: ChangeOp,
    pub old: Option<orders::Model>,
    pub new: orders::Model,
    pub emitted_at: DateTime<Utc>,
}

impl OrderChanged {
    pub fn inserted(new: orders::Model) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            op: ChangeOp::Insert,
            old: None,
            new,
            emitted_at: Utc::now(),
        }
    }

    pub fn updated(old: orders::Model, new: orders::Model) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            op: ChangeOp::Update,
            old: Some(old),
            new,
            emitted_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<OrderChanged>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 发布事件；没有任何订阅者时静默丢弃
    pub fn publish(&self, event: OrderChanged) {
        if self.tx.send(event).is_err() {
            log::debug!("No change feed subscribers, event dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderChanged> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;

    fn make_order(id: i64, status: OrderStatus) -> orders::Model {
        orders::Model {
            id,
            user_id: 1,
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

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();

        feed.publish(OrderChanged::inserted(make_order(1, OrderStatus::Processing)));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.op, ChangeOp::Insert);
        assert!(ev.old.is_none());
        assert_eq!(ev.new.id, 1);
    }

    #[tokio::test]
    async fn test_update_event_carries_old_and_new_snapshots() {
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();

        let old = make_order(7, OrderStatus::Processing);
        let new = orders::Model {
            status: OrderStatus::Shipped,
            ..old.clone()
        };
        feed.publish(OrderChanged::updated(old, new));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.op, ChangeOp::Update);
        assert_eq!(ev.old.unwrap().status, OrderStatus::Processing);
        assert_eq!(ev.new.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let feed = ChangeFeed::new(4);
        feed.publish(OrderChanged::inserted(make_order(2, OrderStatus::Processing)));
    }
}
