use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use once_cell::sync::Lazy;

use crate::middlewares::{self, RequireJWT};
use crate::models::{ApiResponse, ErrorCode};
use crate::services::FileService;

// 懒加载的全局 FileService 实例
static FILE_SERVICE: Lazy<FileService> = Lazy::new(FileService::new_lazy);

// 下载付款凭证附件
pub async fn download_file(req: HttpRequest, path: web::Path<String>) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    FILE_SERVICE.download(&req, user, path.into_inner()).await
}

// 配置路由
pub fn configure_file_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/files")
            .wrap(middlewares::RequireJWT)
            .route("/{token}", web::get().to(download_file)),
    );
}
