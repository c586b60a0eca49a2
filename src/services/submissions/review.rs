use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};

use super::{SubmissionService, can_manage_course};
use crate::models::submissions::requests::ReviewSubmissionRequest;
use crate::models::submissions::responses::ReviewOutcomeResponse;
use crate::models::users::entities::User;
use crate::models::{ApiResponse, ErrorCode};

/// 审核提交（通过 / 驳回）
///
/// 仅站点管理员或提交所属课程的管理员可操作；驳回必须附反馈。
pub async fn review_submission(
    service: &SubmissionService,
    request: &HttpRequest,
    user: User,
    submission_id: i64,
    req: ReviewSubmissionRequest,
) -> ActixResult<HttpResponse> {
    let storage = service.get_storage(request);

    // 权限：提交所属课程的管理员
    let submission = match storage.get_submission_by_id(submission_id).await {
        Ok(Some(submission)) => submission,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ApiResponse::error_empty(
                ErrorCode::SubmissionNotFound,
                "提交不存在",
            )));
        }
        Err(e) => {
            return Ok(
                HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                    ErrorCode::InternalServerError,
                    format!("查询提交失败: {e}"),
                )),
            );
        }
    };

    if !can_manage_course(&storage, &user, submission.course_id).await {
        return Ok(HttpResponse::Forbidden().json(ApiResponse::error_empty(
            ErrorCode::CoursePermissionDenied,
            "没有审核该提交的权限",
        )));
    }

    let engine = service.get_engine(request);
    match engine
        .review(submission_id, req.decision, user.id, req.feedback)
        .await
    {
        Ok(outcome) => {
            let submission = outcome.submission;
            Ok(HttpResponse::Ok().json(ApiResponse::success(
                ReviewOutcomeResponse {
                    id: submission.id,
                    status: submission.status,
                    reviewer_id: submission.reviewer_id,
                    feedback: submission.feedback,
                    time_reviewed: submission.time_reviewed.map(|dt| dt.to_rfc3339()),
                    warnings: outcome.warnings,
                },
                "审核完成",
            )))
        }
        Err(e) => {
            let response = match e.code() {
                // Validation（驳回缺反馈）
                "E007" => HttpResponse::BadRequest().json(ApiResponse::error_empty(
                    ErrorCode::FeedbackRequired,
                    e.message(),
                )),
                // NotFound
                "E008" => HttpResponse::NotFound().json(ApiResponse::error_empty(
                    ErrorCode::SubmissionNotFound,
                    e.message(),
                )),
                // InvalidTransition（已定稿）
                "E015" => HttpResponse::Conflict().json(ApiResponse::error_empty(
                    ErrorCode::InvalidTransition,
                    e.message(),
                )),
                _ => HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                    ErrorCode::InternalServerError,
                    format!("审核失败: {e}"),
                )),
            };
            Ok(response)
        }
    }
}
