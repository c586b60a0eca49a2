use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use once_cell::sync::Lazy;

use crate::middlewares::{self, RateLimit, RequireJWT};
use crate::models::submissions::requests::{
    BulkSubmissionRequest, ReviewSubmissionRequest, SubmissionListQuery,
};
use crate::models::{ApiResponse, ErrorCode};
use crate::services::SubmissionService;

// 懒加载的全局 SubmissionService 实例
static SUBMISSION_SERVICE: Lazy<SubmissionService> = Lazy::new(SubmissionService::new_lazy);

// 上传付款凭证
pub async fn create_submission(req: HttpRequest, payload: Multipart) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    SUBMISSION_SERVICE
        .create_submission(&req, user, payload)
        .await
}

// 获取提交详情
pub async fn get_submission(req: HttpRequest, path: web::Path<i64>) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    SUBMISSION_SERVICE
        .get_submission(&req, user, path.into_inner())
        .await
}

// 审核提交
pub async fn review_submission(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ReviewSubmissionRequest>,
) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    SUBMISSION_SERVICE
        .review_submission(&req, user, path.into_inner(), body.into_inner())
        .await
}

// 批量操作
pub async fn bulk_action(
    req: HttpRequest,
    body: web::Json<BulkSubmissionRequest>,
) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    SUBMISSION_SERVICE.bulk_action(&req, user, body.into_inner()).await
}

// 删除提交
pub async fn delete_submission(
    req: HttpRequest,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let user = match RequireJWT::extract_user_claims(&req) {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::Unauthorized().json(ApiResponse::error_empty(
                ErrorCode::Unauthorized,
                "无法获取用户信息",
            )));
        }
    };

    SUBMISSION_SERVICE
        .delete_submission(&req, user, path.into_inner())
        .await
}

// 管理端：列出课程下的提交
pub async fn list_course_submissions(
    req: HttpRequest,
    path: web::Path<i64>, // course_id
    query: web::Query<SubmissionListQuery>,
) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE
        .list_submissions(&req, path.into_inner(), query.into_inner())
        .await
}

// 配置路由
pub fn configure_submission_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/submissions")
            .wrap(middlewares::RequireJWT)
            .route(
                "",
                web::post()
                    .to(create_submission)
                    .wrap(RateLimit::upload()),
            )
            .route("/bulk", web::post().to(bulk_action))
            .route("/{id}", web::get().to(get_submission))
            .route("/{id}", web::delete().to(delete_submission))
            .route("/{id}/review", web::post().to(review_submission)),
    );

    // 课程维度的管理端列表
    cfg.service(
        web::scope("/api/v1/courses/{course_id}/submissions")
            .wrap(middlewares::RequireCourseManager)
            .wrap(middlewares::RequireJWT)
            .route("", web::get().to(list_course_submissions)),
    );
}
