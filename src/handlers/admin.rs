use crate::middlewares::require_admin;
use crate::models::*;
use crate::services::{OrderService, ShippingService, SyncService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/admin/orders/queue",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取行动队列成功，不含已送达订单"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn get_order_queue(
    sync_service: web::Data<SyncService>,
    order_service: web::Data<OrderService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    let rows = match sync_service.admin_queue().await {
        Ok(rows) => rows,
        Err(e) => return Ok(e.error_response()),
    };

    match order_service.enrich_for_admin(rows).await {
        Ok(orders) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": orders
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/orders/alerts",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "取走累计的队列告警，读取即消费"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn get_order_alerts(
    sync_service: web::Data<SyncService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    let alerts = sync_service.take_alerts().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": alerts
    })))
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    tag = "admin",
    params(
        ("page" = Option<i64>, Query, description = "页码"),
        ("page_size" = Option<i64>, Query, description = "每页数量")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取全量订单成功，含已送达"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn list_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match order_service.list_all(&query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/status",
    tag = "admin",
    params(
        ("order_id" = i64, Path, description = "订单ID")
    ),
    request_body = UpdateOrderStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新订单状态成功", body = OrderResponse),
        (status = 400, description = "状态机不允许该跳转"),
        (status = 403, description = "需要管理员角色"),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn update_order_status(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match order_service
        .update_status(path.into_inner(), &request.status)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/orders/{order_id}/payments",
    tag = "admin",
    params(
        ("order_id" = i64, Path, description = "订单ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取订单支付记录成功"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn list_order_payments(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match order_service.list_payments_for_order(path.into_inner()).await {
        Ok(payments) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": payments
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/payments/{payment_id}/status",
    tag = "admin",
    params(
        ("payment_id" = i64, Path, description = "支付记录ID")
    ),
    request_body = UpdatePaymentStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新支付状态成功", body = PaymentResponse),
        (status = 400, description = "未知的支付状态"),
        (status = 403, description = "需要管理员角色"),
        (status = 404, description = "支付记录不存在")
    )
)]
pub async fn update_payment_status(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdatePaymentStatusRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match order_service
        .update_payment_status(path.into_inner(), &request.status)
        .await
    {
        Ok(payment) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": payment
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/sync/poll",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "手动触发订单轮询对账成功"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn trigger_poll(
    sync_service: web::Data<SyncService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match sync_service.poll_once().await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "reconciled_count": count
            },
            "message": "订单对账完成"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/shipping-methods",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取全部配送方式成功，含已下架"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn list_shipping_methods(
    shipping_service: web::Data<ShippingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match shipping_service.list_all().await {
        Ok(methods) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": methods
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/shipping-methods",
    tag = "admin",
    request_body = CreateShippingMethodRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建配送方式成功", body = ShippingMethodResponse),
        (status = 400, description = "运费不能为负"),
        (status = 403, description = "需要管理员角色")
    )
)]
pub async fn create_shipping_method(
    shipping_service: web::Data<ShippingService>,
    req: HttpRequest,
    request: web::Json<CreateShippingMethodRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match shipping_service.create(request.into_inner()).await {
        Ok(method) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": method
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/shipping-methods/{method_id}",
    tag = "admin",
    params(
        ("method_id" = i64, Path, description = "配送方式ID")
    ),
    request_body = UpdateShippingMethodRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新配送方式成功", body = ShippingMethodResponse),
        (status = 403, description = "需要管理员角色"),
        (status = 404, description = "配送方式不存在")
    )
)]
pub async fn update_shipping_method(
    shipping_service: web::Data<ShippingService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateShippingMethodRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match shipping_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(method) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": method
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/shipping-methods/{method_id}",
    tag = "admin",
    params(
        ("method_id" = i64, Path, description = "配送方式ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "下架配送方式成功，历史订单不受影响"),
        (status = 403, description = "需要管理员角色"),
        (status = 404, description = "配送方式不存在")
    )
)]
pub async fn delete_shipping_method(
    shipping_service: web::Data<ShippingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match shipping_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "配送方式已下架"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/orders", web::get().to(list_orders))
            .route("/orders/queue", web::get().to(get_order_queue))
            .route("/orders/alerts", web::get().to(get_order_alerts))
            .route("/orders/{order_id}/status", web::post().to(update_order_status))
            .route(
                "/orders/{order_id}/payments",
                web::get().to(list_order_payments),
            )
            .route(
                "/payments/{payment_id}/status",
                web::post().to(update_payment_status),
            )
            .route("/sync/poll", web::post().to(trigger_poll))
            .route("/shipping-methods", web::get().to(list_shipping_methods))
            .route("/shipping-methods", web::post().to(create_shipping_method))
            .route(
                "/shipping-methods/{method_id}",
                web::put().to(update_shipping_method),
            )
            .route(
                "/shipping-methods/{method_id}",
                web::delete().to(delete_shipping_method),
            ),
    );
}
