use crate::database::DbPool;
use actix_web::{HttpResponse, Result, web};
use sea_orm::ConnectionTrait;

pub async fn health(pool: web::Data<DbPool>) -> Result<HttpResponse> {
    let database = match pool.execute_unprepared("SELECT 1").await {
        Ok(_) => "ok",
        Err(e) => {
            log::error!("Health check database ping failed: {e}");
            "unavailable"
        }
    };
    let status = if database == "ok" { "ok" } else { "degraded" };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "database": database,
    })))
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
