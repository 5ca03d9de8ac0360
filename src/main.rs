use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use teashop_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    events::ChangeFeed,
    external::TelegramService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 创建JWT服务
    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // 创建外部服务
    let telegram_service = TelegramService::new(config.telegram.clone());

    // 订单变更总线，本地写入与轮询兜底都发布到这里
    let feed = ChangeFeed::default();

    // 创建服务
    let product_service = ProductService::new(pool.clone());
    let cart_service = CartService::new(pool.clone());
    let address_service = AddressService::new(pool.clone());
    let shipping_service = ShippingService::new(pool.clone());
    let (notification_service, notification_worker) = NotificationService::new(
        telegram_service,
        config.sync.notify_max_attempts,
        config.sync.notify_backoff_secs,
    );
    let order_service = OrderService::new(
        pool.clone(),
        feed.clone(),
        cart_service.clone(),
        notification_service.clone(),
    );
    let checkout_service = CheckoutService::new(
        pool.clone(),
        cart_service.clone(),
        address_service.clone(),
        shipping_service.clone(),
        order_service.clone(),
    );
    let sync_service = SyncService::new(pool.clone(), feed.clone());

    // 启动后台任务：变更监听、轮询对账、通知投递
    tasks::spawn_all(
        sync_service.clone(),
        notification_worker,
        config.sync.poll_interval_secs,
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(product_service.clone()))
            .app_data(web::Data::new(cart_service.clone()))
            .app_data(web::Data::new(address_service.clone()))
            .app_data(web::Data::new(shipping_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(checkout_service.clone()))
            .app_data(web::Data::new(sync_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::product_config)
                    .configure(handlers::cart_config)
                    .configure(handlers::address_config)
                    .configure(handlers::shipping_config)
                    .configure(handlers::checkout_config)
                    .configure(handlers::order_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
