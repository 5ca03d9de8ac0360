use crate::models::pagination::PaginationParams;
use crate::services::ProductService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/products",
    tag = "product",
    params(
        ("page" = Option<i64>, Query, description = "页码"),
        ("page_size" = Option<i64>, Query, description = "每页数量")
    ),
    responses(
        (status = 200, description = "获取商品列表成功")
    )
)]
pub async fn list_products(
    product_service: web::Data<ProductService>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match product_service.list_active(&query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/{product_id}",
    tag = "product",
    params(
        ("product_id" = i64, Path, description = "商品ID")
    ),
    responses(
        (status = 200, description = "获取商品成功", body = ProductResponse),
        (status = 404, description = "商品不存在或已下架")
    )
)]
pub async fn get_product(
    product_service: web::Data<ProductService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match product_service.get(path.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn product_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("/{product_id}", web::get().to(get_product)),
    );
}
