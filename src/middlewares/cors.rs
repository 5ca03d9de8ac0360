use actix_cors::Cors;
use actix_web::http::header;

/// 店面用 Bearer 头认证，不带 Cookie，来源可以放开。
/// 生产环境如需收紧，在这里换成白名单。
pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .max_age(3600)
}
