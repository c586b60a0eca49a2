use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};

use super::{SubmissionService, can_manage_course};
use crate::models::submissions::entities::{SYSTEM_REVIEWER_ID, Submission};
use crate::models::submissions::responses::{
    ReviewerInfo, SubmissionDetailResponse, SubmitterInfo,
};
use crate::models::users::entities::User;
use crate::models::{ApiResponse, ErrorCode};
use crate::storage::Storage;
use std::sync::Arc;

/// 获取提交详情
///
/// 提交者本人或课程管理员可见。
pub async fn get_submission(
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

    if submission.user_id != user.id
        && !can_manage_course(&storage, &user, submission.course_id).await
    {
        return Ok(HttpResponse::Forbidden().json(ApiResponse::error_empty(
            ErrorCode::Forbidden,
            "没有查看该提交的权限",
        )));
    }

    let response = build_detail(&storage, submission).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response, "查询成功")))
}

/// 组装提交详情（联提交者、审核人与附件信息）
pub(crate) async fn build_detail(
    storage: &Arc<dyn Storage>,
    submission: Submission,
) -> SubmissionDetailResponse {
    let submitter = storage
        .get_user_by_id(submission.user_id)
        .await
        .ok()
        .flatten();

    let reviewer = match submission.reviewer_id {
        Some(SYSTEM_REVIEWER_ID) => Some(ReviewerInfo {
            id: SYSTEM_REVIEWER_ID,
            username: "system".to_string(),
            display_name: Some("系统".to_string()),
            is_system: true,
        }),
        Some(reviewer_id) => storage
            .get_user_by_id(reviewer_id)
            .await
            .ok()
            .flatten()
            .map(|u| ReviewerInfo {
                id: u.id,
                username: u.username,
                display_name: u.display_name,
                is_system: false,
            }),
        None => None,
    };

    let file = storage
        .get_file_by_token(&submission.file_token)
        .await
        .ok()
        .flatten()
        .map(Into::into);

    SubmissionDetailResponse {
        id: submission.id,
        course_id: submission.course_id,
        instance_id: submission.instance_id,
        submitter: SubmitterInfo {
            id: submission.user_id,
            username: submitter
                .as_ref()
                .map(|u| u.username.clone())
                .unwrap_or_else(|| "未知用户".to_string()),
            display_name: submitter.as_ref().and_then(|u| u.display_name.clone()),
            email: submitter.map(|u| u.email).unwrap_or_default(),
        },
        payment_method: submission.payment_method,
        payment_amount: submission.payment_amount,
        payment_date: submission.payment_date.to_rfc3339(),
        payment_ref: submission.payment_ref,
        notes: submission.notes,
        file,
        status: submission.status,
        reviewer,
        feedback: submission.feedback,
        time_reviewed: submission.time_reviewed.map(|dt| dt.to_rfc3339()),
        created_at: submission.created_at.to_rfc3339(),
    }
}
