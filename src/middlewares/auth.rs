use crate::error::{AppError, AppResult};
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// 鉴权通过后写入请求扩展的身份
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // 仅 GET 放行的前缀，商品与运费浏览不需要登录
    read_only_prefixes: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/"],
            read_only_prefixes: vec!["/api/v1/products", "/api/v1/shipping-methods"],
        }
    }

    fn is_public(&self, method: &Method, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }
        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }
        *method == Method::GET
            && self
                .read_only_prefixes
                .iter()
                .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        if self.public_paths.is_public(req.method(), req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        // 提取Authorization header
        let auth_header = req.headers().get("Authorization");

        let token = if let Some(auth_value) = auth_header {
            if let Ok(auth_str) = auth_value.to_str() {
                auth_str.strip_prefix("Bearer ")
            } else {
                None
            }
        } else {
            None
        };

        let jwt_service = self.jwt_service.clone();

        if let Some(token) = token {
            match jwt_service.verify_access_token(token) {
                Ok(claims) => match claims.sub.parse::<i64>() {
                    Ok(user_id) => {
                        req.extensions_mut().insert(AuthContext {
                            user_id,
                            role: claims.role,
                        });
                        let fut = self.service.call(req);
                        Box::pin(fut)
                    }
                    Err(_) => {
                        let error = AppError::AuthError("Invalid token subject".to_string());
                        Box::pin(async move { Err(error.into()) })
                    }
                },
                Err(_) => {
                    let error = AppError::AuthError("Invalid access token".to_string());
                    Box::pin(async move { Err(error.into()) })
                }
            }
        } else {
            let error = AppError::AuthError("Missing access token".to_string());
            Box::pin(async move { Err(error.into()) })
        }
    }
}

/// 从请求扩展里取当前登录身份
pub fn current_user(req: &HttpRequest) -> AppResult<AuthContext> {
    req.extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// 管理端接口的角色门槛
pub fn require_admin(req: &HttpRequest) -> AppResult<AuthContext> {
    let ctx = current_user(req)?;
    if !ctx.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swagger_and_docs_are_public() {
        let paths = PublicPaths::new();
        assert!(paths.is_public(&Method::GET, "/swagger-ui"));
        assert!(paths.is_public(&Method::GET, "/swagger-ui/index.html"));
        assert!(paths.is_public(&Method::GET, "/api-docs/openapi.json"));
    }

    #[test]
    fn test_catalog_is_public_for_get_only() {
        let paths = PublicPaths::new();
        assert!(paths.is_public(&Method::GET, "/api/v1/products"));
        assert!(paths.is_public(&Method::GET, "/api/v1/products/3"));
        assert!(paths.is_public(&Method::GET, "/api/v1/shipping-methods"));
        assert!(!paths.is_public(&Method::POST, "/api/v1/products"));
    }

    #[test]
    fn test_everything_else_requires_auth() {
        let paths = PublicPaths::new();
        assert!(!paths.is_public(&Method::GET, "/api/v1/cart"));
        assert!(!paths.is_public(&Method::GET, "/api/v1/orders"));
        assert!(!paths.is_public(&Method::POST, "/api/v1/admin/orders/1/status"));
    }
}
