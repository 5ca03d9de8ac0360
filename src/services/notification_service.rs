use crate::external::TelegramService;
use crate::models::OrderLine;
use std::time::Duration;
use tokio::sync::mpsc;

/// 外发通知负载。行项目沿用结算快照，不再回查商品表
#[derive(Debug, Clone)]
pub struct OrderNotification {
    pub order_id: i64,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub total_amount: i64,
    pub lines: Vec<OrderLine>,
}

/// 下单通知入队端。克隆后分发给各服务，入队永不阻塞
#[derive(Clone)]
pub struct NotificationService {
    tx: mpsc::UnboundedSender<OrderNotification>,
}

impl NotificationService {
    pub fn new(
        telegram: TelegramService,
        max_attempts: u32,
        backoff_secs: u64,
    ) -> (Self, NotificationWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            NotificationWorker {
                rx,
                telegram,
                max_attempts,
                backoff_secs,
            },
        )
    }

    /// 入队即返回；队列已关闭时记日志丢弃，绝不影响下单
    pub fn enqueue(&self, notification: OrderNotification) {
        if let Err(e) = self.tx.send(notification) {
            log::error!(
                "Notification queue closed, dropping message for order {}",
                e.0.order_id
            );
        }
    }
}

/// 后台投递循环：逐条取出并按退避重试，最终失败进错误日志
pub struct NotificationWorker {
    rx: mpsc::UnboundedReceiver<OrderNotification>,
    telegram: TelegramService,
    max_attempts: u32,
    backoff_secs: u64,
}

impl NotificationWorker {
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            self.deliver(notification).await;
        }
        log::info!("Notification queue closed, worker exiting");
    }

    async fn deliver(&self, notification: OrderNotification) {
        let text = format_order_message(&notification);

        for attempt in 0..self.max_attempts {
            match self.telegram.send_message(&text).await {
                Ok(()) => return,
                Err(e) => {
                    log::warn!(
                        "Notification delivery attempt {}/{} failed for order {}: {}",
                        attempt + 1,
                        self.max_attempts,
                        notification.order_id,
                        e
                    );
                    if attempt + 1 < self.max_attempts {
                        let wait = self.backoff_secs * 2u64.pow(attempt);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                }
            }
        }

        // 死信：留在错误日志里供人工跟进
        log::error!(
            "Notification for order {} ({}) dead-lettered after {} attempts",
            notification.order_id,
            notification.order_number,
            self.max_attempts
        );
    }
}

pub fn format_order_message(n: &OrderNotification) -> String {
    let mut text = format!(
        "<b>New order {}</b>\nCustomer: {} ({})\nItems: {}\n",
        n.order_number,
        n.customer_name,
        n.customer_email,
        n.lines.len()
    );
    for line in &n.lines {
        text.push_str(&format!(
            "- {} x{} @ {}\n",
            line.product_name,
            line.quantity,
            format_amount(line.effective_unit_price())
        ));
    }
    text.push_str(&format!("Total: {}", format_amount(n.total_amount)));
    text
}

fn format_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, minor % 100)
}
