use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use once_cell::sync::Lazy;

use crate::middlewares;
use crate::services::InstanceService;

// 懒加载的全局 InstanceService 实例
static INSTANCE_SERVICE: Lazy<InstanceService> = Lazy::new(InstanceService::new_lazy);

// 上传页付款信息（任何已认证用户）
pub async fn get_payment_info(
    req: HttpRequest,
    path: web::Path<i64>, // course_id
) -> ActixResult<HttpResponse> {
    INSTANCE_SERVICE
        .get_payment_info(&req, path.into_inner())
        .await
}

// 完整实例配置（课程管理员）
pub async fn get_instance_detail(
    req: HttpRequest,
    path: web::Path<i64>, // course_id
) -> ActixResult<HttpResponse> {
    INSTANCE_SERVICE
        .get_instance_detail(&req, path.into_inner())
        .await
}

// 配置路由
pub fn configure_instance_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/courses/{course_id}/payment-info")
            .wrap(middlewares::RequireJWT)
            .route("", web::get().to(get_payment_info)),
    );

    cfg.service(
        web::scope("/api/v1/courses/{course_id}/instance")
            .wrap(middlewares::RequireCourseManager)
            .wrap(middlewares::RequireJWT)
            .route("", web::get().to(get_instance_detail)),
    );
}
