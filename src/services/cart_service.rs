use crate::entities::{
    cart_entity as carts, cart_item_entity as cart_items, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct CartService {
    pool: DatabaseConnection,
}

impl CartService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 获取用户购物车，每个用户惰性建一条 cart 记录
    pub async fn get_cart(&self, user_id: i64) -> AppResult<CartResponse> {
        let cart = self.get_or_create_cart(user_id).await?;
        self.build_response(cart.id).await
    }

    /// 加入购物车。同一商品重复加入时合并为一行，数量累加
    pub async fn add_item(&self, user_id: i64, req: AddCartItemRequest) -> AppResult<CartResponse> {
        if req.quantity < 1 {
            return Err(AppError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = products::Entity::find_by_id(req.product_id)
            .one(&self.pool)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let cart = self.get_or_create_cart(user_id).await?;

        let existing = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .filter(cart_items::Column::ProductId.eq(product.id))
            .one(&self.pool)
            .await?;

        match existing {
            Some(item) => {
                let merged = item.quantity + req.quantity;
                let mut am = item.into_active_model();
                am.quantity = Set(merged);
                am.updated_at = Set(Some(Utc::now()));
                am.update(&self.pool).await?;
            }
            None => {
                cart_items::ActiveModel {
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(req.quantity),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?;
            }
        }

        self.build_response(cart.id).await
    }

    /// 修改行数量；数量小于等于0时等同删除该行
    pub async fn set_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: i32,
    ) -> AppResult<CartResponse> {
        let cart = self.get_or_create_cart(user_id).await?;
        let item = self.find_owned_item(cart.id, item_id).await?;

        if quantity <= 0 {
            item.into_active_model().delete(&self.pool).await?;
        } else {
            let mut am = item.into_active_model();
            am.quantity = Set(quantity);
            am.updated_at = Set(Some(Utc::now()));
            am.update(&self.pool).await?;
        }

        self.build_response(cart.id).await
    }

    pub async fn remove_item(&self, user_id: i64, item_id: i64) -> AppResult<CartResponse> {
        let cart = self.get_or_create_cart(user_id).await?;
        let item = self.find_owned_item(cart.id, item_id).await?;
        item.into_active_model().delete(&self.pool).await?;
        self.build_response(cart.id).await
    }

    /// 清空购物车，保留 cart 记录本身
    pub async fn clear(&self, user_id: i64) -> AppResult<()> {
        if let Some(cart) = carts::Entity::find()
            .filter(carts::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
        {
            cart_items::Entity::delete_many()
                .filter(cart_items::Column::CartId.eq(cart.id))
                .exec(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// 为结算生成下单行快照：名称与价格在此处解析一次
    pub async fn snapshot_lines(&self, user_id: i64) -> AppResult<Vec<OrderLine>> {
        let cart = self.get_or_create_cart(user_id).await?;
        let items = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .order_by_asc(cart_items::Column::Id)
            .all(&self.pool)
            .await?;

        let product_map = self
            .load_products(items.iter().map(|i| i.product_id).collect())
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let Some(product) = product_map.get(&item.product_id) else {
                log::warn!(
                    "Cart item {} references missing product {}, skipping",
                    item.id,
                    item.product_id
                );
                continue;
            };
            lines.push(OrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
                sale_unit_price: product.sale_price,
            });
        }
        Ok(lines)
    }

    async fn get_or_create_cart(&self, user_id: i64) -> AppResult<carts::Model> {
        if let Some(cart) = carts::Entity::find()
            .filter(carts::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
        {
            return Ok(cart);
        }

        let cart = carts::ActiveModel {
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn find_owned_item(&self, cart_id: i64, item_id: i64) -> AppResult<cart_items::Model> {
        cart_items::Entity::find_by_id(item_id)
            .one(&self.pool)
            .await?
            .filter(|i| i.cart_id == cart_id)
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
    }

    async fn load_products(
        &self,
        product_ids: Vec<i64>,
    ) -> AppResult<HashMap<i64, products::Model>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn build_response(&self, cart_id: i64) -> AppResult<CartResponse> {
        let items = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart_id))
            .order_by_asc(cart_items::Column::Id)
            .all(&self.pool)
            .await?;

        let product_map = self
            .load_products(items.iter().map(|i| i.product_id).collect())
            .await?;

        let mut responses = Vec::with_capacity(items.len());
        let mut total = 0i64;
        for item in items {
            let Some(product) = product_map.get(&item.product_id) else {
                log::warn!(
                    "Cart item {} references missing product {}, skipping",
                    item.id,
                    item.product_id
                );
                continue;
            };
            let line_total = product.effective_price() * item.quantity as i64;
            total += line_total;
            responses.push(CartItemResponse {
                id: item.id,
                product_id: product.id,
                product_name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price: product.price,
                sale_unit_price: product.sale_price,
                quantity: item.quantity,
                line_total,
                stock: product.stock,
            });
        }

        Ok(CartResponse {
            cart_id,
            items: responses,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_product(
        db: &DatabaseConnection,
        name: &str,
        price: i64,
        sale_price: Option<i64>,
    ) -> i64 {
        let row = products::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            sale_price: Set(sale_price),
            stock: Set(10),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        row.id
    }

    #[tokio::test]
    async fn test_adding_same_product_twice_merges_into_one_line() {
        let db = setup().await;
        let product_id = seed_product(&db, "Oolong", 500, None).await;
        let svc = CartService::new(db);

        svc.add_item(1, AddCartItemRequest { product_id, quantity: 2 })
            .await
            .unwrap();
        let cart = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 3 })
            .await
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.items[0].line_total, 2500);
        assert_eq!(cart.total, 2500);
    }

    #[tokio::test]
    async fn test_cart_total_uses_sale_price_when_present() {
        let db = setup().await;
        let product_id = seed_product(&db, "Matcha", 600, Some(450)).await;
        let svc = CartService::new(db);

        let cart = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 2 })
            .await
            .unwrap();

        assert_eq!(cart.items[0].unit_price, 600);
        assert_eq!(cart.items[0].sale_unit_price, Some(450));
        assert_eq!(cart.total, 900);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let db = setup().await;
        let product_id = seed_product(&db, "Sencha", 400, None).await;
        let svc = CartService::new(db);

        let cart = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 2 })
            .await
            .unwrap();
        let item_id = cart.items[0].id;

        let cart = svc.set_quantity(1, item_id, 0).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total, 0);
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_the_owning_cart() {
        let db = setup().await;
        let product_id = seed_product(&db, "Puer", 800, None).await;
        let svc = CartService::new(db);

        let cart = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 1 })
            .await
            .unwrap();
        let item_id = cart.items[0].id;

        // 另一个用户不能改别人的购物车行
        let result = svc.set_quantity(2, item_id, 5).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let untouched = svc.get_cart(1).await.unwrap();
        assert_eq!(untouched.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity_and_unknown_product() {
        let db = setup().await;
        let svc = CartService::new(db.clone());
        let product_id = seed_product(&db, "Hojicha", 350, None).await;

        let bad_qty = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 0 })
            .await;
        assert!(matches!(bad_qty, Err(AppError::ValidationError(_))));

        let missing = svc
            .add_item(1, AddCartItemRequest { product_id: 9999, quantity: 1 })
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_empties_cart_but_keeps_cart_row() {
        let db = setup().await;
        let product_id = seed_product(&db, "Genmaicha", 300, None).await;
        let svc = CartService::new(db.clone());

        let before = svc
            .add_item(1, AddCartItemRequest { product_id, quantity: 2 })
            .await
            .unwrap();
        svc.clear(1).await.unwrap();

        let after = svc.get_cart(1).await.unwrap();
        assert!(after.items.is_empty());
        assert_eq!(after.cart_id, before.cart_id);
    }

    #[tokio::test]
    async fn test_snapshot_lines_resolve_names_and_prices() {
        let db = setup().await;
        let product_id = seed_product(&db, "Jasmine", 500, Some(420)).await;
        let svc = CartService::new(db);

        svc.add_item(1, AddCartItemRequest { product_id, quantity: 3 })
            .await
            .unwrap();

        let lines = svc.snapshot_lines(1).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_name, "Jasmine");
        assert_eq!(lines[0].effective_unit_price(), 420);
        assert_eq!(lines[0].line_total(), 1260);
    }
}
