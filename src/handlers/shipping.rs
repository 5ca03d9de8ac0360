use crate::services::ShippingService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/shipping-methods",
    tag = "shipping",
    responses(
        (status = 200, description = "获取可用配送方式成功")
    )
)]
pub async fn list_shipping_methods(
    shipping_service: web::Data<ShippingService>,
) -> Result<HttpResponse> {
    match shipping_service.list_active().await {
        Ok(methods) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": methods
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn shipping_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/shipping-methods").route("", web::get().to(list_shipping_methods)),
    );
}
