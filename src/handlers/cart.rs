use crate::middlewares::current_user;
use crate::models::*;
use crate::services::CartService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取购物车成功", body = CartResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_cart(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.get_cart(user.user_id).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "cart",
    request_body = AddCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "加入购物车成功，同商品自动合并数量", body = CartResponse),
        (status = 400, description = "数量无效"),
        (status = 404, description = "商品不存在或已下架")
    )
)]
pub async fn add_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    request: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.add_item(user.user_id, request.into_inner()).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/cart/items/{item_id}",
    tag = "cart",
    params(
        ("item_id" = i64, Path, description = "购物车行ID")
    ),
    request_body = UpdateCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新数量成功，数量为0时删除该行", body = CartResponse),
        (status = 404, description = "购物车行不存在")
    )
)]
pub async fn update_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service
        .set_quantity(user.user_id, path.into_inner(), request.quantity)
        .await
    {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart/items/{item_id}",
    tag = "cart",
    params(
        ("item_id" = i64, Path, description = "购物车行ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "移除购物车行成功", body = CartResponse),
        (status = 404, description = "购物车行不存在")
    )
)]
pub async fn remove_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.remove_item(user.user_id, path.into_inner()).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "清空购物车成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn clear_cart(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.clear(user.user_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "购物车已清空"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cart_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("", web::get().to(get_cart))
            .route("", web::delete().to(clear_cart))
            .route("/items", web::post().to(add_item))
            .route("/items/{item_id}", web::put().to(update_item))
            .route("/items/{item_id}", web::delete().to(remove_item)),
    );
}
