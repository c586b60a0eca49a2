use serde::Serialize;
use ts_rs::TS;

use crate::models::PaginationInfo;
use crate::models::files::responses::FileInfo;
use crate::models::submissions::entities::{PaymentMethod, SubmissionStatus};

/// 提交者信息
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmitterInfo {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
}

/// 审核人信息（自动转换时 id 为保留的系统审核人）
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct ReviewerInfo {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub is_system: bool,
}

/// 提交列表项（含提交者信息）
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionListItem {
    pub id: i64,
    pub course_id: i64,
    pub instance_id: i64,
    pub submitter: SubmitterInfo,
    pub payment_method: PaymentMethod,
    pub payment_amount: f64,
    pub payment_date: String,
    pub payment_ref: Option<String>,
    pub status: SubmissionStatus,
    pub created_at: String,
    pub time_reviewed: Option<String>,
}

/// 课程内各状态提交数量
#[derive(Debug, Clone, Default, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionStatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

/// 提交列表响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionListResponse {
    pub items: Vec<SubmissionListItem>,
    pub pagination: PaginationInfo,
    pub counts: SubmissionStatusCounts,
}

/// 提交详情响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionDetailResponse {
    pub id: i64,
    pub course_id: i64,
    pub instance_id: i64,
    pub submitter: SubmitterInfo,
    pub payment_method: PaymentMethod,
    pub payment_amount: f64,
    pub payment_date: String,
    pub payment_ref: Option<String>,
    pub notes: Option<String>,
    pub file: Option<FileInfo>,
    pub status: SubmissionStatus,
    pub reviewer: Option<ReviewerInfo>,
    pub feedback: Option<String>,
    pub time_reviewed: Option<String>,
    pub created_at: String,
}

/// 创建提交响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct CreateSubmissionResponse {
    pub id: i64,
    pub course_id: i64,
    pub status: SubmissionStatus,
    pub file: FileInfo,
    pub warnings: Vec<String>,
}

/// 审核结果响应
///
/// warnings 携带已提交状态变更之外的网关告警（选课/通知失败），
/// 状态变更本身不会因网关失败回滚。
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct ReviewOutcomeResponse {
    pub id: i64,
    pub status: SubmissionStatus,
    pub reviewer_id: Option<i64>,
    pub feedback: Option<String>,
    pub time_reviewed: Option<String>,
    pub warnings: Vec<String>,
}

/// 批量操作单项结果
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct BulkItemResult {
    pub id: i64,
    pub ok: bool,
    pub message: String,
}

/// 批量操作响应（逐项报告，部分失败不影响其余项）
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct BulkActionResponse {
    pub results: Vec<BulkItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}
