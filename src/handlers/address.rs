use crate::middlewares::current_user;
use crate::models::*;
use crate::services::AddressService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/addresses",
    tag = "address",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取地址列表成功，默认地址在前"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_addresses(
    address_service: web::Data<AddressService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match address_service.list(user.user_id).await {
        Ok(addresses) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": addresses
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/addresses",
    tag = "address",
    request_body = CreateAddressRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建地址成功，首个地址自动设为默认", body = AddressResponse),
        (status = 400, description = "电话格式无效")
    )
)]
pub async fn create_address(
    address_service: web::Data<AddressService>,
    req: HttpRequest,
    request: web::Json<CreateAddressRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match address_service.create(user.user_id, request.into_inner()).await {
        Ok(address) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": address
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/addresses/{address_id}",
    tag = "address",
    params(
        ("address_id" = i64, Path, description = "地址ID")
    ),
    request_body = UpdateAddressRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新地址成功", body = AddressResponse),
        (status = 404, description = "地址不存在")
    )
)]
pub async fn update_address(
    address_service: web::Data<AddressService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAddressRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match address_service
        .update(user.user_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(address) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": address
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/addresses/{address_id}",
    tag = "address",
    params(
        ("address_id" = i64, Path, description = "地址ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除地址成功"),
        (status = 404, description = "地址不存在")
    )
)]
pub async fn delete_address(
    address_service: web::Data<AddressService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match address_service.delete(user.user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "地址已删除"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/addresses/{address_id}/default",
    tag = "address",
    params(
        ("address_id" = i64, Path, description = "地址ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "设置默认地址成功", body = AddressResponse),
        (status = 404, description = "地址不存在")
    )
)]
pub async fn set_default_address(
    address_service: web::Data<AddressService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match address_service
        .set_default(user.user_id, path.into_inner())
        .await
    {
        Ok(address) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": address
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn address_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/addresses")
            .route("", web::get().to(list_addresses))
            .route("", web::post().to(create_address))
            .route("/{address_id}", web::put().to(update_address))
            .route("/{address_id}", web::delete().to(delete_address))
            .route("/{address_id}/default", web::post().to(set_default_address)),
    );
}
