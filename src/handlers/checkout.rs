use crate::middlewares::current_user;
use crate::models::*;
use crate::services::CheckoutService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/checkout/start",
    tag = "checkout",
    request_body = StartCheckoutRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "开始结算成功，返回地址选择步骤", body = CheckoutSessionResponse),
        (status = 400, description = "购物车为空")
    )
)]
pub async fn start_checkout(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    request: web::Json<StartCheckoutRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service.start(user.user_id, request.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/checkout",
    tag = "checkout",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取当前结算会话成功", body = CheckoutSessionResponse),
        (status = 404, description = "没有进行中的结算会话")
    )
)]
pub async fn get_session(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service.session(user.user_id).await {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/checkout/address",
    tag = "checkout",
    request_body = SelectAddressRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "选择地址成功，进入配送方式步骤", body = CheckoutSessionResponse),
        (status = 400, description = "当前步骤不允许选择地址"),
        (status = 404, description = "地址不存在")
    )
)]
pub async fn select_address(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    request: web::Json<SelectAddressRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service
        .select_address(user.user_id, request.into_inner())
        .await
    {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/checkout/address/new",
    tag = "checkout",
    request_body = CreateAddressRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "新建地址并选中成功", body = CheckoutSessionResponse),
        (status = 400, description = "电话格式无效或步骤不允许")
    )
)]
pub async fn create_address(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    request: web::Json<CreateAddressRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service
        .create_address(user.user_id, request.into_inner())
        .await
    {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/checkout/shipping",
    tag = "checkout",
    request_body = SelectShippingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "选择配送方式成功，进入确认步骤", body = CheckoutSessionResponse),
        (status = 404, description = "配送方式不存在或已下架")
    )
)]
pub async fn select_shipping(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    request: web::Json<SelectShippingRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service
        .select_shipping(user.user_id, request.into_inner())
        .await
    {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/checkout/place",
    tag = "checkout",
    request_body = PlaceOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "提交订单，成功或失败都在会话里体现", body = CheckoutSessionResponse),
        (status = 400, description = "当前步骤不允许提交")
    )
)]
pub async fn place_order(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
    request: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service.place(user.user_id, request.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/checkout/retry",
    tag = "checkout",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "重试成功，回到确认步骤", body = CheckoutSessionResponse),
        (status = 400, description = "只有失败状态可以重试")
    )
)]
pub async fn retry_checkout(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match checkout_service.retry(user.user_id).await {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/checkout",
    tag = "checkout",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "关闭结算会话，重复关闭不报错")
    )
)]
pub async fn close_checkout(
    checkout_service: web::Data<CheckoutService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    checkout_service.close(user.user_id).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "结算会话已关闭"
    })))
}

pub fn checkout_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/checkout")
            .route("", web::get().to(get_session))
            .route("", web::delete().to(close_checkout))
            .route("/start", web::post().to(start_checkout))
            .route("/address", web::post().to(select_address))
            .route("/address/new", web::post().to(create_address))
            .route("/shipping", web::post().to(select_shipping))
            .route("/place", web::post().to(place_order))
            .route("/retry", web::post().to(retry_checkout)),
    );
}
