use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};

use super::{SubmissionService, can_manage_course};
use crate::config::AppConfig;
use crate::models::submissions::entities::ReviewDecision;
use crate::models::submissions::requests::{BulkAction, BulkSubmissionRequest};
use crate::models::submissions::responses::{BulkActionResponse, BulkItemResult};
use crate::models::users::entities::User;
use crate::models::{ApiResponse, ErrorCode};

/// 批量操作（approve / reject / delete）
///
/// 逐项独立执行并逐项报告结果，单项失败不中断批次。
/// 权限按每个提交所属课程单独校验。
pub async fn bulk_action(
    service: &SubmissionService,
    request: &HttpRequest,
    user: User,
    req: BulkSubmissionRequest,
) -> ActixResult<HttpResponse> {
    if req.submission_ids.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
            ErrorCode::ValidationFailed,
            "submission_ids 不能为空",
        )));
    }

    // 批量驳回必须附反馈
    if req.action == BulkAction::Reject
        && req.feedback.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
            ErrorCode::FeedbackRequired,
            "批量驳回必须填写审核反馈",
        )));
    }

    let storage = service.get_storage(request);
    let engine = service.get_engine(request);
    let mut results = Vec::with_capacity(req.submission_ids.len());

    for &id in &req.submission_ids {
        // 逐项权限校验（提交可能分属不同课程）
        let submission = match storage.get_submission_by_id(id).await {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                results.push(BulkItemResult {
                    id,
                    ok: false,
                    message: "提交不存在".to_string(),
                });
                continue;
            }
            Err(e) => {
                results.push(BulkItemResult {
                    id,
                    ok: false,
                    message: format!("查询提交失败: {e}"),
                });
                continue;
            }
        };

        if !can_manage_course(&storage, &user, submission.course_id).await {
            results.push(BulkItemResult {
                id,
                ok: false,
                message: "没有操作该提交的权限".to_string(),
            });
            continue;
        }

        let result = match req.action {
            BulkAction::Approve => engine
                .review(id, ReviewDecision::Approved, user.id, req.feedback.clone())
                .await
                .map(|outcome| {
                    if outcome.warnings.is_empty() {
                        "已通过".to_string()
                    } else {
                        format!("已通过（告警: {}）", outcome.warnings.join("; "))
                    }
                }),
            BulkAction::Reject => engine
                .review(id, ReviewDecision::Rejected, user.id, req.feedback.clone())
                .await
                .map(|outcome| {
                    if outcome.warnings.is_empty() {
                        "已驳回".to_string()
                    } else {
                        format!("已驳回（告警: {}）", outcome.warnings.join("; "))
                    }
                }),
            BulkAction::Delete => engine.delete(id).await.map(|deleted| {
                // 清理磁盘上的附件内容
                if let Some(stored_name) = deleted.stored_name {
                    let path = format!("{}/{}", AppConfig::get().upload.dir, stored_name);
                    let _ = std::fs::remove_file(path);
                }
                "已删除".to_string()
            }),
        };

        match result {
            Ok(message) => results.push(BulkItemResult {
                id,
                ok: true,
                message,
            }),
            Err(e) => results.push(BulkItemResult {
                id,
                ok: false,
                message: e.format_simple(),
            }),
        }
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    let failed = results.len() - succeeded;

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        BulkActionResponse {
            results,
            succeeded,
            failed,
        },
        format!("批量操作完成: {succeeded} 成功, {failed} 失败"),
    )))
}
