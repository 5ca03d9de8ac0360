use crate::entities::product_entity as products;
use crate::error::{AppError, AppResult};
use crate::models::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

#[derive(Clone)]
pub struct ProductService {
    pool: DatabaseConnection,
}

impl ProductService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 获取在售商品列表
    pub async fn list_active(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ProductResponse>> {
        #[derive(Debug, sea_orm::FromQueryResult)]
        struct CountRow {
            count: i64,
        }
        let total = products::Entity::find()
            .filter(products::Column::IsActive.eq(true))
            .select_only()
            .column_as(Expr::val(1).count(), "count")
            .into_model::<CountRow>()
            .one(&self.pool)
            .await?
            .map(|r| r.count)
            .unwrap_or(0);

        let rows = products::Entity::find()
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Id)
            .offset(params.offset())
            .limit(params.page_size())
            .all(&self.pool)
            .await?;

        let items: Vec<ProductResponse> = rows.into_iter().map(ProductResponse::from).collect();

        Ok(PaginatedResponse::new(items, params, total as u64))
    }

    /// 获取商品详情；下架商品视为不存在
    pub async fn get(&self, product_id: i64) -> AppResult<ProductResponse> {
        let product = products::Entity::find_by_id(product_id)
            .one(&self.pool)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        Ok(ProductResponse::from(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, Set};

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_product(db: &DatabaseConnection, name: &str, price: i64, active: bool) -> i64 {
        let row = products::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            stock: Set(10),
            is_active: Set(active),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        row.id
    }

    #[tokio::test]
    async fn test_list_active_hides_inactive_products() {
        let db = setup().await;
        seed_product(&db, "Oolong", 500, true).await;
        seed_product(&db, "Retired blend", 300, false).await;

        let svc = ProductService::new(db);
        let page = svc.list_active(&PaginationParams::default()).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "Oolong");
    }

    #[tokio::test]
    async fn test_get_inactive_product_is_not_found() {
        let db = setup().await;
        let visible = seed_product(&db, "Sencha", 450, true).await;
        let hidden = seed_product(&db, "Hidden", 450, false).await;

        let svc = ProductService::new(db);
        assert!(svc.get(visible).await.is_ok());
        assert!(matches!(svc.get(hidden).await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.get(9999).await, Err(AppError::NotFound(_))));
    }
}
