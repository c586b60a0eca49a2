//! 提交生命周期引擎
//!
//! 裁决状态转换合法性并按固定顺序执行副作用：
//! 状态落库 → 选课 → 通知。网关失败降级为告警随结果返回，
//! 已提交的状态变更不回滚。

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::errors::{PayProofError, Result};
use crate::models::{
    files::entities::NewFile,
    submissions::entities::{NewSubmission, PaymentDetails, ReviewDecision, Submission},
};
use crate::storage::Storage;

use super::gateways::{
    EnrolmentGateway, NotificationGateway, NotificationMessage, resolve_recipients,
};

/// 提交结果
#[derive(Debug)]
pub struct SubmitOutcome {
    pub submission: Submission,
    /// 网关告警（通知失败等），不影响已创建的提交
    pub warnings: Vec<String>,
}

/// 审核结果
#[derive(Debug)]
pub struct ReviewOutcome {
    pub submission: Submission,
    /// 网关告警（选课/通知失败），状态变更已提交不回滚
    pub warnings: Vec<String>,
}

/// 删除结果
#[derive(Debug)]
pub struct DeleteOutcome {
    pub submission: Submission,
    /// 附件磁盘文件名，调用方据此清理二进制内容
    pub stored_name: Option<String>,
}

pub struct LifecycleEngine {
    storage: Arc<dyn Storage>,
    enrolment: Arc<dyn EnrolmentGateway>,
    notifier: Arc<dyn NotificationGateway>,
}

impl LifecycleEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        enrolment: Arc<dyn EnrolmentGateway>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            storage,
            enrolment,
            notifier,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// 创建提交（pending）
    ///
    /// 前置条件：用户未选课、且同一 (user, course, instance) 下无待审提交。
    /// 附件元数据随提交一并落库；配置允许时通知审核人。
    pub async fn submit(
        &self,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
        details: PaymentDetails,
        attachment: NewFile,
    ) -> Result<SubmitOutcome> {
        let instance = self
            .storage
            .get_instance_by_id(instance_id)
            .await?
            .ok_or_else(|| {
                PayProofError::not_found(format!("报名实例 {instance_id} 不存在"))
            })?;

        if instance.course_id != course_id {
            return Err(PayProofError::validation(format!(
                "报名实例 {instance_id} 不属于课程 {course_id}"
            )));
        }

        if !instance.enabled {
            return Err(PayProofError::validation(format!(
                "课程 {course_id} 的付款凭证报名未启用"
            )));
        }

        if self.enrolment.is_enrolled(course_id, user_id).await? {
            return Err(PayProofError::already_enrolled(format!(
                "用户 {user_id} 已加入课程 {course_id}"
            )));
        }

        let file_token = attachment.token.clone();
        let submission = self
            .storage
            .insert_submission_if_absent(NewSubmission {
                course_id,
                instance_id,
                user_id,
                details,
                file_token,
            })
            .await?
            .ok_or_else(|| {
                PayProofError::duplicate_submission(format!(
                    "用户 {user_id} 在课程 {course_id} 已有待审提交"
                ))
            })?;

        self.storage.create_file(attachment).await?;

        let mut warnings = Vec::new();

        // 提交已落库，此后的通知失败只记告警
        if instance.notify_on_submission {
            let submitter_name = self.user_display_name(user_id).await;
            let course_name = self.course_name(course_id).await;
            let message = NotificationMessage::submission_received(
                course_id,
                &course_name,
                &submitter_name,
            );

            match resolve_recipients(&self.storage, &instance).await {
                Ok(recipients) if !recipients.is_empty() => {
                    if let Err(e) = self.notifier.notify(&recipients, &message).await {
                        warn!("提交通知发送失败 (submission {}): {}", submission.id, e);
                        warnings.push(format!("提交通知发送失败: {e}"));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("解析通知接收人失败 (submission {}): {}", submission.id, e);
                    warnings.push(format!("解析通知接收人失败: {e}"));
                }
            }
        }

        Ok(SubmitOutcome {
            submission,
            warnings,
        })
    }

    /// 审核提交：pending → approved / rejected
    ///
    /// 条件更新保证并发定稿恰好一方成功；失败方收到 InvalidTransition，
    /// 不会重复选课或重复通知。通过时先选课后通知。
    pub async fn review(
        &self,
        submission_id: i64,
        decision: ReviewDecision,
        reviewer_id: i64,
        feedback: Option<String>,
    ) -> Result<ReviewOutcome> {
        let mut submission = self
            .storage
            .get_submission_by_id(submission_id)
            .await?
            .ok_or_else(|| PayProofError::not_found(format!("提交 {submission_id} 不存在")))?;

        // 驳回必须附反馈
        if decision == ReviewDecision::Rejected
            && feedback.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(PayProofError::validation("驳回提交时必须填写审核反馈"));
        }

        let target = decision.target_status();
        let now = Utc::now();

        let updated = self
            .storage
            .finalize_submission_status(
                submission_id,
                target,
                reviewer_id,
                feedback.clone(),
                now,
            )
            .await?;

        if !updated {
            return Err(PayProofError::invalid_transition(format!(
                "提交 {submission_id} 已定稿（当前状态 {}），不可重复审核",
                submission.status
            )));
        }

        submission.status = target;
        submission.reviewer_id = Some(reviewer_id);
        submission.feedback = feedback.clone();
        submission.time_reviewed = Some(now);
        submission.updated_at = now;

        let mut warnings = Vec::new();
        let course_name = self.course_name(submission.course_id).await;

        match decision {
            ReviewDecision::Approved => {
                // 状态已提交：选课先于通过通知，通知永远不会先于选课发出
                match self.storage.get_instance_by_id(submission.instance_id).await {
                    Ok(Some(instance)) => {
                        let time_end = (instance.enrol_period_secs > 0).then(|| {
                            now + chrono::Duration::seconds(instance.enrol_period_secs)
                        });

                        if let Err(e) = self
                            .enrolment
                            .enrol(
                                submission.course_id,
                                submission.user_id,
                                instance.role.clone(),
                                now,
                                time_end,
                            )
                            .await
                        {
                            warn!("选课失败 (submission {}): {}", submission_id, e);
                            warnings.push(format!("选课失败: {e}"));
                        }

                        if instance.notify_on_submission {
                            let message = NotificationMessage::submission_approved(
                                submission.course_id,
                                &course_name,
                                feedback.as_deref(),
                            );
                            if let Err(e) =
                                self.notifier.notify(&[submission.user_id], &message).await
                            {
                                warn!("通过通知发送失败 (submission {}): {}", submission_id, e);
                                warnings.push(format!("通过通知发送失败: {e}"));
                            }
                        }
                    }
                    Ok(None) => {
                        warn!(
                            "报名实例 {} 缺失，提交 {} 已通过但未选课",
                            submission.instance_id, submission_id
                        );
                        warnings.push(format!(
                            "报名实例 {} 缺失，未执行选课",
                            submission.instance_id
                        ));
                    }
                    Err(e) => {
                        warn!("查询报名实例失败 (submission {}): {}", submission_id, e);
                        warnings.push(format!("查询报名实例失败: {e}"));
                    }
                }
            }
            ReviewDecision::Rejected => {
                let notify = match self
                    .storage
                    .get_instance_by_id(submission.instance_id)
                    .await
                {
                    Ok(Some(instance)) => instance.notify_on_submission,
                    _ => true,
                };

                if notify {
                    let message = NotificationMessage::submission_rejected(
                        submission.course_id,
                        &course_name,
                        feedback.as_deref().unwrap_or(""),
                    );
                    if let Err(e) = self.notifier.notify(&[submission.user_id], &message).await {
                        warn!("驳回通知发送失败 (submission {}): {}", submission_id, e);
                        warnings.push(format!("驳回通知发送失败: {e}"));
                    }
                }
            }
        }

        Ok(ReviewOutcome {
            submission,
            warnings,
        })
    }

    /// 批量审核：逐项独立应用 review，单项失败不影响其余项
    pub async fn bulk_review(
        &self,
        submission_ids: &[i64],
        decision: ReviewDecision,
        reviewer_id: i64,
        feedback: Option<String>,
    ) -> Vec<(i64, Result<ReviewOutcome>)> {
        let mut results = Vec::with_capacity(submission_ids.len());
        for &id in submission_ids {
            let result = self
                .review(id, decision, reviewer_id, feedback.clone())
                .await;
            results.push((id, result));
        }
        results
    }

    /// 删除提交及其附件元数据（任何状态均可，管理清理用；无通知副作用）
    pub async fn delete(&self, submission_id: i64) -> Result<DeleteOutcome> {
        let submission = self
            .storage
            .get_submission_by_id(submission_id)
            .await?
            .ok_or_else(|| PayProofError::not_found(format!("提交 {submission_id} 不存在")))?;

        let stored_name = self
            .storage
            .get_file_by_token(&submission.file_token)
            .await?
            .map(|f| f.stored_name);

        self.storage.delete_submission(submission_id).await?;
        self.storage.delete_file(&submission.file_token).await?;

        Ok(DeleteOutcome {
            submission,
            stored_name,
        })
    }

    async fn course_name(&self, course_id: i64) -> String {
        match self.storage.get_course_by_id(course_id).await {
            Ok(Some(course)) => course.full_name,
            _ => format!("#{course_id}"),
        }
    }

    async fn user_display_name(&self, user_id: i64) -> String {
        match self.storage.get_user_by_id(user_id).await {
            Ok(Some(user)) => user.display_name.unwrap_or(user.username),
            _ => format!("用户 {user_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::lifecycle::SYSTEM_REVIEWER_ID;
    use crate::lifecycle::gateways::{OutboxNotificationGateway, StorageEnrolmentGateway};
    use crate::models::enrolments::entities::EnrolmentRole;
    use crate::models::instances::entities::{
        EnrolInstance, ExpiryAction, ReminderRecipients,
    };
    use crate::models::notifications::entities::NotificationKind;
    use crate::models::submissions::entities::{PaymentMethod, SubmissionStatus};
    use crate::models::users::entities::UserRole;
    use crate::storage::memory::MemoryStorage;

    /// 统计调用次数的选课网关包装
    struct CountingEnrolmentGateway {
        inner: StorageEnrolmentGateway,
        enrol_calls: AtomicUsize,
    }

    impl CountingEnrolmentGateway {
        fn new(storage: Arc<dyn crate::storage::Storage>) -> Self {
            Self {
                inner: StorageEnrolmentGateway::new(storage),
                enrol_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EnrolmentGateway for CountingEnrolmentGateway {
        async fn enrol(
            &self,
            course_id: i64,
            user_id: i64,
            role: EnrolmentRole,
            time_start: DateTime<Utc>,
            time_end: Option<DateTime<Utc>>,
        ) -> crate::errors::Result<()> {
            self.enrol_calls.fetch_add(1, Ordering::SeqCst);
            self.inner
                .enrol(course_id, user_id, role, time_start, time_end)
                .await
        }

        async fn is_enrolled(
            &self,
            course_id: i64,
            user_id: i64,
        ) -> crate::errors::Result<bool> {
            self.inner.is_enrolled(course_id, user_id).await
        }
    }

    /// 永远失败的通知网关
    struct FailingNotificationGateway;

    #[async_trait]
    impl NotificationGateway for FailingNotificationGateway {
        async fn notify(
            &self,
            _recipients: &[i64],
            _message: &NotificationMessage,
        ) -> crate::errors::Result<()> {
            Err(crate::errors::PayProofError::gateway_failure(
                "邮件服务不可用",
            ))
        }
    }

    fn test_instance(id: i64, course_id: i64) -> EnrolInstance {
        EnrolInstance {
            id,
            course_id,
            enabled: true,
            role: EnrolmentRole::Student,
            enrol_period_secs: 0,
            expiry_threshold_days: 0,
            expiry_action: ExpiryAction::None,
            auto_approve_all: false,
            notify_on_submission: true,
            reminder_enabled: false,
            reminder_threshold_hours: 24,
            reminder_recipients: ReminderRecipients::Managers,
            specific_recipient_ids: None,
            payment_instructions: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_details(amount: f64) -> PaymentDetails {
        PaymentDetails {
            method: PaymentMethod::Bank,
            amount,
            date: Utc::now(),
            reference: Some("TXN-001".to_string()),
            notes: None,
        }
    }

    fn test_attachment(token: &str, user_id: i64) -> NewFile {
        NewFile {
            token: token.to_string(),
            original_name: "receipt.pdf".to_string(),
            stored_name: format!("{token}.bin"),
            file_size: 1024,
            file_type: "application/pdf".to_string(),
            user_id,
        }
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        gateway: Arc<CountingEnrolmentGateway>,
        engine: LifecycleEngine,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let dyn_storage: Arc<dyn crate::storage::Storage> = storage.clone();
        let gateway = Arc::new(CountingEnrolmentGateway::new(dyn_storage.clone()));
        let notifier = Arc::new(OutboxNotificationGateway::new(dyn_storage.clone()));
        let engine = LifecycleEngine::new(dyn_storage, gateway.clone(), notifier);
        Fixture {
            storage,
            gateway,
            engine,
        }
    }

    #[tokio::test]
    async fn test_submit_then_approve_enrols_user() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(9, "reviewer9", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let outcome = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap();
        let submission = outcome.submission;
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert!(submission.reviewer_id.is_none());

        let reviewed = f
            .engine
            .review(submission.id, ReviewDecision::Approved, 9, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(reviewed.submission.status, SubmissionStatus::Approved);
        assert_eq!(reviewed.submission.reviewer_id, Some(9));
        assert!(reviewed.submission.time_reviewed.is_some());
        assert!(reviewed.warnings.is_empty());

        assert!(f.gateway.is_enrolled(7, 42).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_pending_submission_rejected() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        f.engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap();

        let err = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-2", 42))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E013");
    }

    #[tokio::test]
    async fn test_concurrent_submits_exactly_one_wins() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let (a, b) = tokio::join!(
            f.engine
                .submit(42, 7, 3, test_details(100.0), test_attachment("tok-a", 42)),
            f.engine
                .submit(42, 7, 3, test_details(100.0), test_attachment("tok-b", 42)),
        );

        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);

        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert_eq!(loser.code(), "E013");

        let pending = f
            .storage
            .find_pending_submission(42, 7, 3)
            .await
            .unwrap();
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn test_submit_rejected_when_already_enrolled() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));
        f.storage.put_enrolment(7, 42, EnrolmentRole::Student);

        let err = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E014");
    }

    #[tokio::test]
    async fn test_review_finalized_submission_never_reenrols() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let submission = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap()
            .submission;

        f.engine
            .review(submission.id, ReviewDecision::Approved, 9, None)
            .await
            .unwrap();
        assert_eq!(f.gateway.enrol_calls.load(Ordering::SeqCst), 1);

        let err = f
            .engine
            .review(submission.id, ReviewDecision::Approved, 9, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E015");
        // 选课网关没有被再次调用
        assert_eq!(f.gateway.enrol_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reject_requires_feedback() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let submission = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap()
            .submission;

        let err = f
            .engine
            .review(submission.id, ReviewDecision::Rejected, 9, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E007");

        let err = f
            .engine
            .review(submission.id, ReviewDecision::Rejected, 9, Some("  ".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E007");

        let reviewed = f
            .engine
            .review(
                submission.id,
                ReviewDecision::Rejected,
                9,
                Some("凭证金额与课程费用不符".into()),
            )
            .await
            .unwrap();
        assert_eq!(reviewed.submission.status, SubmissionStatus::Rejected);
        assert_eq!(
            reviewed.submission.feedback.as_deref(),
            Some("凭证金额与课程费用不符")
        );
        // 驳回没有选课副作用
        assert_eq!(f.gateway.enrol_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enrol_gateway_is_idempotent() {
        let f = fixture();
        let now = Utc::now();

        f.gateway
            .enrol(7, 42, EnrolmentRole::Student, now, None)
            .await
            .unwrap();
        f.gateway
            .enrol(7, 42, EnrolmentRole::Student, now, None)
            .await
            .unwrap();

        assert_eq!(f.storage.enrolments.len(), 1);
        assert!(f.gateway.is_enrolled(7, 42).await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_review_partial_failure() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(43, "student43", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let s1 = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap()
            .submission;
        let s2 = f
            .engine
            .submit(43, 7, 3, test_details(80.0), test_attachment("tok-2", 43))
            .await
            .unwrap()
            .submission;

        // S2 预先定稿
        f.engine
            .review(s2.id, ReviewDecision::Approved, 9, None)
            .await
            .unwrap();

        let results = f
            .engine
            .bulk_review(&[s1.id, s2.id], ReviewDecision::Approved, 9, None)
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        let err = results[1].1.as_ref().unwrap_err();
        assert_eq!(err.code(), "E015");

        // S2 审核元数据未被改写
        let s2_after = f
            .storage
            .get_submission_by_id(s2.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s2_after.reviewer_id, Some(9));
    }

    #[tokio::test]
    async fn test_submit_notifies_course_managers() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(9, "manager9", UserRole::User);
        f.storage.put_enrolment(7, 9, EnrolmentRole::Manager);
        f.storage.put_instance(test_instance(3, 7));

        f.engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap();

        let received: Vec<_> = f
            .storage
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::SubmissionReceived)
            .map(|n| n.user_id)
            .collect();
        assert_eq!(received, vec![9]);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_warning_not_rollback() {
        let storage = Arc::new(MemoryStorage::new());
        let dyn_storage: Arc<dyn crate::storage::Storage> = storage.clone();
        let gateway = Arc::new(CountingEnrolmentGateway::new(dyn_storage.clone()));
        let engine = LifecycleEngine::new(
            dyn_storage,
            gateway,
            Arc::new(FailingNotificationGateway),
        );

        storage.put_user(42, "student42", UserRole::User);
        storage.put_user(9, "manager9", UserRole::User);
        storage.put_enrolment(7, 9, EnrolmentRole::Manager);
        storage.put_instance(test_instance(3, 7));

        let outcome = engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap();
        assert!(!outcome.warnings.is_empty());

        let reviewed = engine
            .review(
                outcome.submission.id,
                ReviewDecision::Approved,
                SYSTEM_REVIEWER_ID,
                None,
            )
            .await
            .unwrap();
        // 通知失败：状态与选课仍然生效
        assert!(!reviewed.warnings.is_empty());
        assert_eq!(reviewed.submission.status, SubmissionStatus::Approved);
        assert!(reviewed.submission.is_system_reviewed());
        assert!(storage.enrolments.contains_key(&(7, 42)));
    }

    #[tokio::test]
    async fn test_delete_removes_submission_and_file() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_instance(test_instance(3, 7));

        let submission = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-1", 42))
            .await
            .unwrap()
            .submission;

        let deleted = f.engine.delete(submission.id).await.unwrap();
        assert_eq!(deleted.stored_name.as_deref(), Some("tok-1.bin"));

        assert!(
            f.storage
                .get_submission_by_id(submission.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(f.storage.get_file_by_token("tok-1").await.unwrap().is_none());

        // 删除后可以重新提交
        let again = f
            .engine
            .submit(42, 7, 3, test_details(100.0), test_attachment("tok-2", 42))
            .await;
        assert!(again.is_ok());
    }
}
