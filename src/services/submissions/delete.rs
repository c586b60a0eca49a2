use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};

use super::{SubmissionService, can_manage_course};
use crate::config::AppConfig;
use crate::models::users::entities::User;
use crate::models::{ApiResponse, ErrorCode};

/// 删除提交（管理清理，任何状态均可；无通知副作用）
pub async fn delete_submission(
    service: &SubmissionService,
    request: &HttpRequest,
    user: User,
    submission_id: i64,
) -> ActixResult<HttpResponse> {
    let storage = service.get_storage(request);

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
            "没有删除该提交的权限",
        )));
    }

    let engine = service.get_engine(request);
    match engine.delete(submission_id).await {
        Ok(deleted) => {
            // 清理磁盘上的附件内容
            if let Some(stored_name) = deleted.stored_name {
                let path = format!("{}/{}", AppConfig::get().upload.dir, stored_name);
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("删除附件文件失败 ({}): {}", path, e);
                }
            }
            Ok(HttpResponse::Ok().json(ApiResponse::success_empty("提交已删除")))
        }
        Err(e) => Ok(
            HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                ErrorCode::InternalServerError,
                format!("删除提交失败: {e}"),
            )),
        ),
    }
}
