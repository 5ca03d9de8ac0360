use crate::entities::shipping_method_entity;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateShippingMethodRequest {
    pub name: String,
    pub rate: i64,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateShippingMethodRequest {
    pub name: Option<String>,
    pub rate: Option<i64>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingMethodResponse {
    pub id: i64,
    pub name: String,
    pub rate: i64,
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<shipping_method_entity::Model> for ShippingMethodResponse {
    fn from(m: shipping_method_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            rate: m.rate,
            description: m.description,
            is_active: m.is_active,
        }
    }
}
