use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use serde::Serialize;
use ts_rs::TS;

use crate::models::{ApiResponse, AppStartTime};

/// 运行状态响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/system.ts")]
pub struct SystemStatusResponse {
    pub name: String,
    pub version: String,
    pub uptime_secs: i64,
}

// 运行状态（存活探针）
pub async fn system_status(req: HttpRequest) -> ActixResult<HttpResponse> {
    let uptime_secs = req
        .app_data::<web::Data<AppStartTime>>()
        .map(|start| {
            chrono::Utc::now()
                .signed_duration_since(start.start_datetime)
                .num_seconds()
        })
        .unwrap_or(0);

    let response = SystemStatusResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response, "ok")))
}

// 配置路由
pub fn configure_system_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/system").route("/status", web::get().to(system_status)),
    );
}
