use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::time::Duration;

use ticketing_engine::{
    config::Config,
    database::{create_pool, run_migrations},
    external::NotificationService,
    handlers,
    services::{ExpiryService, SettlementService},
    tasks,
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
    let config = Config::from_toml().map_err(|e| {
        log::error!("Failed to load configuration: {e}");
        std::io::Error::other(e.to_string())
    })?;

    // 创建数据库连接池
    let pool = create_pool(&config.database).await.map_err(|e| {
        log::error!("Failed to create database connection pool: {e}");
        std::io::Error::other(e.to_string())
    })?;

    // 运行数据库迁移
    run_migrations(&pool).await.map_err(|e| {
        log::error!("Failed to run database migrations: {e}");
        std::io::Error::other(e.to_string())
    })?;

    if config.payments.webhook_secret.is_empty() {
        log::warn!("payments.webhook_secret is empty, all payment webhooks will be rejected");
    }

    // 创建服务
    let notifier = NotificationService::new(config.notifications.clone());

    let settlement_service = SettlementService::new(pool.clone(), notifier);
    let expiry_service = ExpiryService::new(pool.clone(), &config.reservation);

    // 启动后台任务 (预留过期回收)
    let background = tasks::spawn_all(
        expiry_service,
        Duration::from_secs(config.reservation.sweep_interval_secs),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let payments_config = config.payments.clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(payments_config.clone()))
            .app_data(web::Data::new(settlement_service.clone()))
            .configure(handlers::health_config)
            .configure(handlers::webhook_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await;

    background.shutdown().await;
    server
}
