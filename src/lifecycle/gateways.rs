//! 选课与通知网关
//!
//! 生命周期引擎只依赖这两个 trait；默认实现经由 Storage 落库。
//! 通知为尽力而为：失败由调用方记为告警，绝不回滚已提交的状态变更。

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{PayProofError, Result};
use crate::models::{
    enrolments::entities::{EnrolmentRole, EnrolmentStatus},
    instances::entities::{EnrolInstance, ReminderRecipients},
    notifications::entities::{NewNotification, NotificationKind},
};
use crate::storage::Storage;

/// 选课网关
///
/// `enrol` 必须幂等：用户已在课程中时为空操作而非错误。
#[async_trait]
pub trait EnrolmentGateway: Send + Sync {
    async fn enrol(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool>;
}

/// 通知消息（模板渲染结果）
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    pub course_id: i64,
    pub subject: String,
    pub body: String,
}

impl NotificationMessage {
    /// 新提交通知（发给审核人）
    pub fn submission_received(course_id: i64, course_name: &str, submitter_name: &str) -> Self {
        Self {
            kind: NotificationKind::SubmissionReceived,
            course_id,
            subject: format!("课程 {course_name} 收到新的付款凭证"),
            body: format!(
                "{submitter_name} 为课程 {course_name} 上传了付款凭证，请尽快审核。"
            ),
        }
    }

    /// 审核通过通知（发给提交者）
    pub fn submission_approved(
        course_id: i64,
        course_name: &str,
        feedback: Option<&str>,
    ) -> Self {
        let mut body = format!("你提交的课程 {course_name} 付款凭证已通过审核，选课已生效。");
        if let Some(feedback) = feedback.filter(|f| !f.is_empty()) {
            body.push_str(&format!("\n审核意见: {feedback}"));
        }
        Self {
            kind: NotificationKind::SubmissionApproved,
            course_id,
            subject: format!("课程 {course_name} 付款凭证审核通过"),
            body,
        }
    }

    /// 审核驳回通知（发给提交者，附驳回理由）
    pub fn submission_rejected(course_id: i64, course_name: &str, feedback: &str) -> Self {
        Self {
            kind: NotificationKind::SubmissionRejected,
            course_id,
            subject: format!("课程 {course_name} 付款凭证被驳回"),
            body: format!(
                "你提交的课程 {course_name} 付款凭证未通过审核。\n驳回理由: {feedback}\n可修正后重新提交。"
            ),
        }
    }

    /// 待审提醒（按课程聚合，每门课程一条）
    pub fn pending_reminder(
        course_id: i64,
        course_name: &str,
        pending_lines: &[String],
    ) -> Self {
        Self {
            kind: NotificationKind::PendingReminder,
            course_id,
            subject: format!(
                "课程 {course_name} 有 {} 份付款凭证待审核",
                pending_lines.len()
            ),
            body: format!(
                "以下付款凭证等待审核:\n{}",
                pending_lines.join("\n")
            ),
        }
    }
}

/// 通知网关
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, recipients: &[i64], message: &NotificationMessage) -> Result<()>;
}

/// 基于 Storage 的选课网关实现
pub struct StorageEnrolmentGateway {
    storage: Arc<dyn Storage>,
}

impl StorageEnrolmentGateway {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EnrolmentGateway for StorageEnrolmentGateway {
    async fn enrol(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        // upsert 语义：已存在的选课记录原样保留
        self.storage
            .upsert_enrolment(course_id, user_id, role, time_start, time_end)
            .await
            .map_err(|e| PayProofError::gateway_failure(format!("写入选课记录失败: {e}")))?;
        Ok(())
    }

    async fn is_enrolled(&self, course_id: i64, user_id: i64) -> Result<bool> {
        let enrolment = self.storage.get_enrolment(course_id, user_id).await?;
        Ok(enrolment.is_some_and(|e| {
            e.status == EnrolmentStatus::Active
                && e.time_end.is_none_or(|end| end > Utc::now())
        }))
    }
}

/// 出站信箱通知网关实现
///
/// 每个接收人落一条通知行；实际邮件投递由外部系统消费信箱完成。
pub struct OutboxNotificationGateway {
    storage: Arc<dyn Storage>,
}

impl OutboxNotificationGateway {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl NotificationGateway for OutboxNotificationGateway {
    async fn notify(&self, recipients: &[i64], message: &NotificationMessage) -> Result<()> {
        for &user_id in recipients {
            self.storage
                .create_notification(NewNotification {
                    user_id,
                    kind: message.kind,
                    subject: message.subject.clone(),
                    body: message.body.clone(),
                    course_id: message.course_id,
                })
                .await
                .map_err(|e| {
                    PayProofError::gateway_failure(format!(
                        "写入通知失败 (user {user_id}): {e}"
                    ))
                })?;
        }

        debug!(
            "Queued {} notification(s) for course {}: {}",
            recipients.len(),
            message.course_id,
            message.subject
        );
        Ok(())
    }
}

/// 按实例策略解析通知接收人集合（去重、保序）
pub(crate) async fn resolve_recipients(
    storage: &Arc<dyn Storage>,
    instance: &EnrolInstance,
) -> Result<Vec<i64>> {
    let mut recipients = BTreeSet::new();

    if matches!(
        instance.reminder_recipients,
        ReminderRecipients::Managers | ReminderRecipients::Both
    ) {
        for manager in storage.list_course_managers(instance.course_id).await? {
            recipients.insert(manager.id);
        }
    }

    if matches!(
        instance.reminder_recipients,
        ReminderRecipients::Specific | ReminderRecipients::Both
    ) {
        for user_id in instance.parse_specific_recipients() {
            recipients.insert(user_id);
        }
    }

    Ok(recipients.into_iter().collect())
}
