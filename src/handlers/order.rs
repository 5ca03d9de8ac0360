use crate::middlewares::current_user;
use crate::services::{OrderService, SyncService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取订单历史成功，新订单在前"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.list_for_user(user.user_id).await {
        Ok(orders) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": orders
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 实时视图走同步层的内存快照，管理端改状态后无需刷新库即可看到
#[utoipa::path(
    get,
    path = "/orders/live",
    tag = "order",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取实时订单视图成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_live_orders(
    order_service: web::Data<OrderService>,
    sync_service: web::Data<SyncService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    let rows = match sync_service.history_for(user.user_id).await {
        Ok(rows) => rows,
        Err(e) => return Ok(e.error_response()),
    };

    match order_service.attach_items(rows).await {
        Ok(orders) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": orders
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    tag = "order",
    params(
        ("order_id" = i64, Path, description = "订单ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取订单详情成功", body = OrderResponse),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.get_for_user(user.user_id, path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(get_orders))
            .route("/live", web::get().to(get_live_orders))
            .route("/{order_id}", web::get().to(get_order)),
    );
}
