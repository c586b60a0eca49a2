use serde::{Deserialize, Serialize};
use ts_rs::TS;

// 通知类型
#[derive(Debug, Clone, Copy, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/notification.ts")]
pub enum NotificationKind {
    SubmissionReceived, // 收到新提交（发给审核人）
    SubmissionApproved, // 审核通过（发给提交者）
    SubmissionRejected, // 审核驳回（发给提交者）
    PendingReminder,    // 待审提醒（按课程聚合，发给审核人）
}

impl NotificationKind {
    pub const SUBMISSION_RECEIVED: &'static str = "submission_received";
    pub const SUBMISSION_APPROVED: &'static str = "submission_approved";
    pub const SUBMISSION_REJECTED: &'static str = "submission_rejected";
    pub const PENDING_REMINDER: &'static str = "pending_reminder";
}

impl<'de> Deserialize<'de> for NotificationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            serde::de::Error::custom(format!("无效的通知类型: '{s}'"))
        })
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::SubmissionReceived => Self::SUBMISSION_RECEIVED,
            NotificationKind::SubmissionApproved => Self::SUBMISSION_APPROVED,
            NotificationKind::SubmissionRejected => Self::SUBMISSION_REJECTED,
            NotificationKind::PendingReminder => Self::PENDING_REMINDER,
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::SUBMISSION_RECEIVED => Ok(NotificationKind::SubmissionReceived),
            Self::SUBMISSION_APPROVED => Ok(NotificationKind::SubmissionApproved),
            Self::SUBMISSION_REJECTED => Ok(NotificationKind::SubmissionRejected),
            Self::PENDING_REMINDER => Ok(NotificationKind::PendingReminder),
            _ => Err(format!("Invalid notification kind: {s}")),
        }
    }
}

// 通知记录（出站信箱；实际邮件投递由外部系统消费）
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/notification.ts")]
pub struct Notification {
    pub id: i64,
    // 接收人
    pub user_id: i64,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub course_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 新通知写入参数
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub course_id: i64,
}
