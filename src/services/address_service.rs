use crate::entities::{AddressType, address_entity as addresses};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::validate_phone;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

#[derive(Clone)]
pub struct AddressService {
    pool: DatabaseConnection,
}

impl AddressService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 地址列表，默认地址排最前，其余按新到旧
    pub async fn list(&self, user_id: i64) -> AppResult<Vec<AddressResponse>> {
        let rows = addresses::Entity::find()
            .filter(addresses::Column::UserId.eq(user_id))
            .order_by_desc(addresses::Column::IsDefault)
            .order_by_desc(addresses::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AddressResponse::from).collect())
    }

    /// 新建地址。用户的第一条地址自动成为默认地址
    pub async fn create(
        &self,
        user_id: i64,
        req: CreateAddressRequest,
    ) -> AppResult<AddressResponse> {
        validate_phone(&req.phone)?;

        let has_any = addresses::Entity::find()
            .filter(addresses::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .is_some();

        let row = addresses::ActiveModel {
            user_id: Set(user_id),
            address_type: Set(req.address_type.unwrap_or(AddressType::Shipping)),
            is_default: Set(!has_any),
            full_name: Set(req.full_name),
            phone: Set(req.phone),
            street_address: Set(req.street_address),
            street_address2: Set(req.street_address2),
            city: Set(req.city),
            state: Set(req.state),
            postal_code: Set(req.postal_code),
            country: Set(req.country),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        Ok(AddressResponse::from(row))
    }

    pub async fn update(
        &self,
        user_id: i64,
        address_id: i64,
        req: UpdateAddressRequest,
    ) -> AppResult<AddressResponse> {
        let address = self.find_owned(user_id, address_id).await?;

        if let Some(phone) = &req.phone {
            validate_phone(phone)?;
        }

        let mut am = address.into_active_model();
        if let Some(address_type) = req.address_type {
            am.address_type = Set(address_type);
        }
        if let Some(full_name) = req.full_name {
            am.full_name = Set(full_name);
        }
        if let Some(phone) = req.phone {
            am.phone = Set(phone);
        }
        if let Some(street_address) = req.street_address {
            am.street_address = Set(street_address);
        }
        if req.street_address2.is_some() {
            am.street_address2 = Set(req.street_address2);
        }
        if let Some(city) = req.city {
            am.city = Set(city);
        }
        if let Some(state) = req.state {
            am.state = Set(state);
        }
        if let Some(postal_code) = req.postal_code {
            am.postal_code = Set(postal_code);
        }
        if let Some(country) = req.country {
            am.country = Set(country);
        }
        am.updated_at = Set(Some(Utc::now()));

        let row = am.update(&self.pool).await?;
        Ok(AddressResponse::from(row))
    }

    pub async fn delete(&self, user_id: i64, address_id: i64) -> AppResult<()> {
        let address = self.find_owned(user_id, address_id).await?;
        address.into_active_model().delete(&self.pool).await?;
        Ok(())
    }

    /// 设为默认地址：先全部降级再提升目标，两次写入
    pub async fn set_default(&self, user_id: i64, address_id: i64) -> AppResult<AddressResponse> {
        let address = self.find_owned(user_id, address_id).await?;

        addresses::Entity::update_many()
            .col_expr(addresses::Column::IsDefault, Expr::value(false))
            .filter(addresses::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;

        let mut am = address.into_active_model();
        am.is_default = Set(true);
        am.updated_at = Set(Some(Utc::now()));
        let row = am.update(&self.pool).await?;

        Ok(AddressResponse::from(row))
    }

    async fn find_owned(&self, user_id: i64, address_id: i64) -> AppResult<addresses::Model> {
        addresses::Entity::find_by_id(address_id)
            .one(&self.pool)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Address not found".to_string()))
    }
}
