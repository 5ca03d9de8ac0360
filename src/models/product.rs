use crate::entities::product_entity;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub image_url: Option<String>,
    pub stock: i64,
    pub is_active: bool,
}

impl From<product_entity::Model> for ProductResponse {
    fn from(m: product_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            price: m.price,
            sale_price: m.sale_price,
            image_url: m.image_url,
            stock: m.stock,
            is_active: m.is_active,
        }
    }
}
