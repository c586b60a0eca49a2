//! 周期性对账任务
//!
//! 每次调用按固定顺序执行三个独立阶段：
//! 1. 过期处理 — 超过实例阈值的待审提交按实例配置自动通过/驳回；
//! 2. 全量自动批准 — 开启 auto_approve_all 的实例批准剩余待审提交；
//! 3. 聚合提醒 — 按课程聚合待审清单，24 小时窗口内每门课程至多一批。
//!
//! 所有定稿都复用引擎的条件更新路径：扫描期间被人工审核的提交
//! 在定稿时拿到 InvalidTransition，记为跳过而非错误。单项失败
//! 不中断扫描，三个阶段每次调用都完整执行。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::errors::PayProofError;
use crate::models::{
    instances::entities::{EnrolInstance, ExpiryAction},
    submissions::entities::{ReviewDecision, Submission},
};
use crate::storage::Storage;

use super::engine::LifecycleEngine;
use super::gateways::{NotificationGateway, NotificationMessage, resolve_recipients};
use super::SYSTEM_REVIEWER_ID;

/// 单次扫描的逐项统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub expired_approved: u64,
    pub expired_rejected: u64,
    pub expired_skipped: u64,
    pub expired_failed: u64,
    pub auto_approved: u64,
    pub auto_skipped: u64,
    pub auto_failed: u64,
    pub reminded_courses: u64,
    pub reminded_submissions: u64,
    pub reminder_failed: u64,
}

pub struct ReconcileJob {
    storage: Arc<dyn Storage>,
    engine: Arc<LifecycleEngine>,
    notifier: Arc<dyn NotificationGateway>,
}

impl ReconcileJob {
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<LifecycleEngine>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            storage,
            engine,
            notifier,
        }
    }

    /// 执行一轮扫描
    ///
    /// 调度方保证同一时刻至多一次调用在执行；本方法对调用间隔不做假设。
    pub async fn run(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        info!("开始付款凭证对账扫描");

        self.process_expired(&mut report).await;
        self.process_auto_approve(&mut report).await;
        self.send_reminders(&mut report).await;

        info!(
            "对账扫描完成: 过期 {}通过/{}驳回/{}跳过/{}失败, 自动批准 {}/{}跳过/{}失败, 提醒 {} 门课程 {} 份提交",
            report.expired_approved,
            report.expired_rejected,
            report.expired_skipped,
            report.expired_failed,
            report.auto_approved,
            report.auto_skipped,
            report.auto_failed,
            report.reminded_courses,
            report.reminded_submissions,
        );

        report
    }

    /// 阶段 1：过期处理
    async fn process_expired(&self, report: &mut ReconcileReport) {
        let now = Utc::now();
        let expired = match self.storage.list_expired_pending(now).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("查询过期待审提交失败: {}", e);
                report.expired_failed += 1;
                return;
            }
        };

        for (submission, instance) in expired {
            let (decision, feedback) = match instance.expiry_action {
                ExpiryAction::Approve => (
                    ReviewDecision::Approved,
                    "付款凭证超过审核期限，系统自动通过",
                ),
                ExpiryAction::Reject => (
                    ReviewDecision::Rejected,
                    "付款凭证超过审核期限未获人工审核，系统自动驳回",
                ),
                // 查询已排除 none，防御性跳过
                ExpiryAction::None => continue,
            };

            match self
                .engine
                .review(
                    submission.id,
                    decision,
                    SYSTEM_REVIEWER_ID,
                    Some(feedback.to_string()),
                )
                .await
            {
                Ok(outcome) => {
                    for warning in &outcome.warnings {
                        warn!("过期处理告警 (submission {}): {}", submission.id, warning);
                    }
                    match decision {
                        ReviewDecision::Approved => report.expired_approved += 1,
                        ReviewDecision::Rejected => report.expired_rejected += 1,
                    }
                }
                Err(e) if Self::is_skip(&e) => {
                    // 扫描期间已被其他执行者定稿
                    report.expired_skipped += 1;
                }
                Err(e) => {
                    warn!("过期处理失败 (submission {}): {}", submission.id, e);
                    report.expired_failed += 1;
                }
            }
        }
    }

    /// 阶段 2：全量自动批准
    ///
    /// 在阶段 1 之后运行：阶段 1 已定稿的提交不再处于待审，
    /// 不会被同一实例重复处理。
    async fn process_auto_approve(&self, report: &mut ReconcileReport) {
        let pending = match self.storage.list_auto_approve_pending().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("查询自动批准提交失败: {}", e);
                report.auto_failed += 1;
                return;
            }
        };

        for (submission, _) in pending {
            match self
                .engine
                .review(
                    submission.id,
                    ReviewDecision::Approved,
                    SYSTEM_REVIEWER_ID,
                    Some("实例配置为自动批准，系统自动通过".to_string()),
                )
                .await
            {
                Ok(outcome) => {
                    for warning in &outcome.warnings {
                        warn!("自动批准告警 (submission {}): {}", submission.id, warning);
                    }
                    report.auto_approved += 1;
                }
                Err(e) if Self::is_skip(&e) => {
                    report.auto_skipped += 1;
                }
                Err(e) => {
                    warn!("自动批准失败 (submission {}): {}", submission.id, e);
                    report.auto_failed += 1;
                }
            }
        }
    }

    /// 阶段 3：聚合提醒
    ///
    /// 每门课程一条聚合消息（非逐提交），发送成功后给所有入选
    /// 提交盖 time_reminder 戳，保证 24 小时内不重复提醒。
    async fn send_reminders(&self, report: &mut ReconcileReport) {
        let now = Utc::now();
        let candidates = match self.storage.list_reminder_candidates(now).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("查询提醒候选失败: {}", e);
                report.reminder_failed += 1;
                return;
            }
        };

        // 按课程聚合
        let mut by_course: HashMap<i64, (EnrolInstance, Vec<Submission>)> = HashMap::new();
        for (submission, instance) in candidates {
            by_course
                .entry(submission.course_id)
                .or_insert_with(|| (instance, Vec::new()))
                .1
                .push(submission);
        }

        for (course_id, (instance, submissions)) in by_course {
            if let Err(e) = self
                .remind_course(course_id, &instance, &submissions, report)
                .await
            {
                warn!("课程 {} 提醒失败: {}", course_id, e);
                report.reminder_failed += 1;
            }
        }
    }

    async fn remind_course(
        &self,
        course_id: i64,
        instance: &EnrolInstance,
        submissions: &[Submission],
        report: &mut ReconcileReport,
    ) -> crate::errors::Result<()> {
        let recipients = resolve_recipients(&self.storage, instance).await?;
        if recipients.is_empty() {
            // 没有接收人就不盖戳，配置修复后下一轮仍会提醒
            return Ok(());
        }

        let course_name = match self.storage.get_course_by_id(course_id).await? {
            Some(course) => course.full_name,
            None => format!("#{course_id}"),
        };

        // 待审清单：提交者 + 提交日期
        let submitter_ids: Vec<i64> = submissions.iter().map(|s| s.user_id).collect();
        let users = self.storage.get_users_by_ids(&submitter_ids).await?;
        let name_map: HashMap<i64, String> = users
            .into_iter()
            .map(|u| (u.id, u.display_name.unwrap_or(u.username)))
            .collect();

        let lines: Vec<String> = submissions
            .iter()
            .map(|s| {
                let name = name_map
                    .get(&s.user_id)
                    .cloned()
                    .unwrap_or_else(|| format!("用户 {}", s.user_id));
                format!("- {name}（{}）", s.created_at.format("%Y-%m-%d %H:%M"))
            })
            .collect();

        let message = NotificationMessage::pending_reminder(course_id, &course_name, &lines);
        self.notifier.notify(&recipients, &message).await?;

        // 发送成功后盖戳
        let ids: Vec<i64> = submissions.iter().map(|s| s.id).collect();
        let stamped = self.storage.stamp_reminders(&ids, Utc::now()).await?;

        report.reminded_courses += 1;
        report.reminded_submissions += stamped;
        Ok(())
    }

    /// 是否为"已被其他执行者定稿"类错误
    fn is_skip(err: &PayProofError) -> bool {
        matches!(err, PayProofError::InvalidTransition(_))
            || matches!(err, PayProofError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::lifecycle::gateways::{OutboxNotificationGateway, StorageEnrolmentGateway};
    use crate::models::enrolments::entities::EnrolmentRole;
    use crate::models::instances::entities::ReminderRecipients;
    use crate::models::notifications::entities::NotificationKind;
    use crate::models::submissions::entities::{
        NewSubmission, PaymentDetails, PaymentMethod, SubmissionStatus,
    };
    use crate::models::users::entities::UserRole;
    use crate::storage::memory::MemoryStorage;

    struct Fixture {
        storage: Arc<MemoryStorage>,
        job: ReconcileJob,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let dyn_storage: Arc<dyn crate::storage::Storage> = storage.clone();
        let gateway = Arc::new(StorageEnrolmentGateway::new(dyn_storage.clone()));
        let notifier = Arc::new(OutboxNotificationGateway::new(dyn_storage.clone()));
        let engine = Arc::new(LifecycleEngine::new(
            dyn_storage.clone(),
            gateway,
            notifier.clone(),
        ));
        let job = ReconcileJob::new(dyn_storage, engine, notifier);
        Fixture { storage, job }
    }

    fn base_instance(id: i64, course_id: i64) -> crate::models::instances::entities::EnrolInstance {
        crate::models::instances::entities::EnrolInstance {
            id,
            course_id,
            enabled: true,
            role: EnrolmentRole::Student,
            enrol_period_secs: 0,
            expiry_threshold_days: 0,
            expiry_action: ExpiryAction::None,
            auto_approve_all: false,
            notify_on_submission: false,
            reminder_enabled: false,
            reminder_threshold_hours: 24,
            reminder_recipients: ReminderRecipients::Managers,
            specific_recipient_ids: None,
            payment_instructions: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn seed_pending(
        storage: &MemoryStorage,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
        age_days: i64,
    ) -> i64 {
        let submission = storage
            .insert_submission_if_absent(NewSubmission {
                course_id,
                instance_id,
                user_id,
                details: PaymentDetails {
                    method: PaymentMethod::Bank,
                    amount: 50.0,
                    date: Utc::now(),
                    reference: None,
                    notes: None,
                },
                file_token: format!("tok-{user_id}-{course_id}"),
            })
            .await
            .unwrap()
            .unwrap();
        storage.backdate_submission(submission.id, Utc::now() - Duration::days(age_days));
        submission.id
    }

    #[tokio::test]
    async fn test_expired_submission_auto_approved_once() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);

        // 过期自动通过 + 全量自动批准同时开启：阶段 1 定稿后阶段 2 不得重复处理
        let mut instance = base_instance(3, 7);
        instance.expiry_threshold_days = 5;
        instance.expiry_action = ExpiryAction::Approve;
        instance.auto_approve_all = true;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 10).await;

        let report = f.job.run().await;
        assert_eq!(report.expired_approved, 1);
        assert_eq!(report.auto_approved, 0);
        assert_eq!(report.auto_skipped, 0);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Approved);
        assert!(submission.is_system_reviewed());
        assert!(f.storage.enrolments.contains_key(&(7, 42)));
    }

    #[tokio::test]
    async fn test_expired_submission_auto_rejected_with_feedback() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);

        let mut instance = base_instance(3, 7);
        instance.expiry_threshold_days = 3;
        instance.expiry_action = ExpiryAction::Reject;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 4).await;

        let report = f.job.run().await;
        assert_eq!(report.expired_rejected, 1);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Rejected);
        assert!(submission.feedback.is_some());
        // 驳回不产生选课
        assert!(!f.storage.enrolments.contains_key(&(7, 42)));
    }

    #[tokio::test]
    async fn test_expiry_action_none_leaves_submission_pending() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);

        let mut instance = base_instance(3, 7);
        instance.expiry_threshold_days = 3;
        instance.expiry_action = ExpiryAction::None;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 30).await;

        let report = f.job.run().await;
        assert_eq!(report.expired_approved + report.expired_rejected, 0);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_fresh_submission_not_expired() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);

        let mut instance = base_instance(3, 7);
        instance.expiry_threshold_days = 5;
        instance.expiry_action = ExpiryAction::Approve;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 1).await;

        let report = f.job.run().await;
        assert_eq!(report.expired_approved, 0);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_auto_approve_all_processes_remaining_pending() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(43, "student43", UserRole::User);

        let mut instance = base_instance(3, 7);
        instance.auto_approve_all = true;
        f.storage.put_instance(instance);

        let a = seed_pending(&f.storage, 42, 7, 3, 0).await;
        let b = seed_pending(&f.storage, 43, 7, 3, 0).await;

        let report = f.job.run().await;
        assert_eq!(report.auto_approved, 2);

        for id in [a, b] {
            let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
            assert_eq!(submission.status, SubmissionStatus::Approved);
            assert!(submission.is_system_reviewed());
        }
    }

    #[tokio::test]
    async fn test_reminder_sent_once_per_24h_window() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(9, "manager9", UserRole::User);
        f.storage.put_enrolment(7, 9, EnrolmentRole::Manager);

        let mut instance = base_instance(3, 7);
        instance.reminder_enabled = true;
        instance.reminder_threshold_hours = 24;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 2).await;

        let report = f.job.run().await;
        assert_eq!(report.reminded_courses, 1);
        assert_eq!(report.reminded_submissions, 1);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert!(submission.time_reminder.is_some());

        let reminder_count = |storage: &MemoryStorage| {
            storage
                .notifications
                .iter()
                .filter(|n| n.kind == NotificationKind::PendingReminder)
                .count()
        };
        assert_eq!(reminder_count(&f.storage), 1);

        // 24 小时窗口内的第二轮扫描不再提醒
        let report = f.job.run().await;
        assert_eq!(report.reminded_courses, 0);
        assert_eq!(reminder_count(&f.storage), 1);
    }

    #[tokio::test]
    async fn test_reminder_aggregates_per_course() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);
        f.storage.put_user(43, "student43", UserRole::User);
        f.storage.put_user(9, "manager9", UserRole::User);
        f.storage.put_enrolment(7, 9, EnrolmentRole::Manager);

        let mut instance = base_instance(3, 7);
        instance.reminder_enabled = true;
        instance.reminder_threshold_hours = 24;
        f.storage.put_instance(instance);

        seed_pending(&f.storage, 42, 7, 3, 2).await;
        seed_pending(&f.storage, 43, 7, 3, 3).await;

        let report = f.job.run().await;
        // 一门课程两份提交 → 一条聚合消息
        assert_eq!(report.reminded_courses, 1);
        assert_eq!(report.reminded_submissions, 2);

        let reminders: Vec<_> = f
            .storage
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::PendingReminder)
            .map(|n| n.body.clone())
            .collect();
        assert_eq!(reminders.len(), 1);
        assert!(reminders[0].contains("student42"));
        assert!(reminders[0].contains("student43"));
    }

    #[tokio::test]
    async fn test_human_finalized_submission_not_touched_by_sweep() {
        let f = fixture();
        f.storage.put_user(42, "student42", UserRole::User);

        let mut instance = base_instance(3, 7);
        instance.expiry_threshold_days = 1;
        instance.expiry_action = ExpiryAction::Approve;
        f.storage.put_instance(instance);

        let id = seed_pending(&f.storage, 42, 7, 3, 5).await;

        // 扫描前被人工驳回
        f.storage
            .finalize_submission_status(
                id,
                SubmissionStatus::Rejected,
                9,
                Some("凭证无效".into()),
                Utc::now(),
            )
            .await
            .unwrap();

        let report = f.job.run().await;
        assert_eq!(report.expired_approved, 0);

        let submission = f.storage.get_submission_by_id(id).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Rejected);
        assert_eq!(submission.reviewer_id, Some(9));
    }
}
