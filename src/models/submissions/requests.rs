use serde::Deserialize;
use ts_rs::TS;

use crate::models::submissions::entities::{ReviewDecision, SubmissionStatus};

/// 审核请求
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct ReviewSubmissionRequest {
    pub decision: ReviewDecision,
    /// 驳回时必填
    pub feedback: Option<String>,
}

/// 批量操作动作
#[derive(Debug, Clone, Copy, PartialEq, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub enum BulkAction {
    Approve,
    Reject,
    Delete,
}

impl<'de> Deserialize<'de> for BulkAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "approve" => Ok(BulkAction::Approve),
            "reject" => Ok(BulkAction::Reject),
            "delete" => Ok(BulkAction::Delete),
            _ => Err(serde::de::Error::custom(format!(
                "无效的批量动作: '{s}'. 支持: approve, reject, delete"
            ))),
        }
    }
}

/// 批量操作请求
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct BulkSubmissionRequest {
    pub submission_ids: Vec<i64>,
    pub action: BulkAction,
    /// 批量驳回时必填
    pub feedback: Option<String>,
}

/// 提交列表查询参数
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    /// 状态筛选
    pub status: Option<SubmissionStatus>,
    /// 在付款参考号 / 备注中模糊搜索
    pub search: Option<String>,
}
