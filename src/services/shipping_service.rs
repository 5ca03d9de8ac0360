use crate::entities::shipping_method_entity as shipping_methods;
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

#[derive(Clone)]
pub struct ShippingService {
    pool: DatabaseConnection,
}

impl ShippingService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 店面可选的配送方式，按创建顺序排列
    pub async fn list_active(&self) -> AppResult<Vec<ShippingMethodResponse>> {
        let rows = shipping_methods::Entity::find()
            .filter(shipping_methods::Column::IsActive.eq(true))
            .order_by_asc(shipping_methods::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShippingMethodResponse::from).collect())
    }

    /// 管理端列表，包含已停用的方式
    pub async fn list_all(&self) -> AppResult<Vec<ShippingMethodResponse>> {
        let rows = shipping_methods::Entity::find()
            .order_by_asc(shipping_methods::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShippingMethodResponse::from).collect())
    }

    /// 结算时校验配送方式：必须存在且在用
    pub async fn get_active(&self, method_id: i64) -> AppResult<shipping_methods::Model> {
        shipping_methods::Entity::find_by_id(method_id)
            .one(&self.pool)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::NotFound("Shipping method not found".to_string()))
    }

    pub async fn create(
        &self,
        req: CreateShippingMethodRequest,
    ) -> AppResult<ShippingMethodResponse> {
        if req.rate < 0 {
            return Err(AppError::ValidationError(
                "Shipping rate cannot be negative".to_string(),
            ));
        }

        let row = shipping_methods::ActiveModel {
            name: Set(req.name),
            rate: Set(req.rate),
            description: Set(req.description),
            is_active: Set(req.is_active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        Ok(ShippingMethodResponse::from(row))
    }

    pub async fn update(
        &self,
        method_id: i64,
        req: UpdateShippingMethodRequest,
    ) -> AppResult<ShippingMethodResponse> {
        let method = shipping_methods::Entity::find_by_id(method_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Shipping method not found".to_string()))?;

        if let Some(rate) = req.rate {
            if rate < 0 {
                return Err(AppError::ValidationError(
                    "Shipping rate cannot be negative".to_string(),
                ));
            }
        }

        let mut am = method.into_active_model();
        if let Some(name) = req.name {
            am.name = Set(name);
        }
        if let Some(rate) = req.rate {
            am.rate = Set(rate);
        }
        if req.description.is_some() {
            am.description = Set(req.description);
        }
        if let Some(is_active) = req.is_active {
            am.is_active = Set(is_active);
        }
        am.updated_at = Set(Some(Utc::now()));

        let row = am.update(&self.pool).await?;
        Ok(ShippingMethodResponse::from(row))
    }

    /// 软删除：下架但保留行，历史订单仍可引用
    pub async fn delete(&self, method_id: i64) -> AppResult<()> {
        let method = shipping_methods::Entity::find_by_id(method_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Shipping method not found".to_string()))?;

        let mut am = method.into_active_model();
        am.is_active = Set(false);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&self.pool).await?;
        Ok(())
    }
}
