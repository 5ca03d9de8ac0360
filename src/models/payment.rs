use crate::entities::{PaymentStatus, payment_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i64,
    pub order_id: i64,
    pub amount: i64,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<payment_entity::Model> for PaymentResponse {
    fn from(m: payment_entity::Model) -> Self {
        Self {
            id: m.id,
            order_id: m.order_id,
            amount: m.amount,
            payment_method: m.payment_method,
            status: m.status,
            transaction_id: m.transaction_id,
            created_at: m.created_at,
        }
    }
}
