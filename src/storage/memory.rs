//! 测试用内存存储
//!
//! 生命周期引擎与对账任务的单元测试使用本实现，行为语义与
//! SeaORM 实现一致：待审唯一性通过 entry 原子判定，状态定稿
//! 通过持锁条件更新，两个并发执行者恰好一方成功。

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::errors::Result;
use crate::models::{
    PaginationInfo,
    courses::entities::Course,
    enrolments::entities::{Enrolment, EnrolmentRole, EnrolmentStatus},
    files::entities::{File, NewFile},
    instances::entities::{EnrolInstance, ExpiryAction},
    notifications::entities::{NewNotification, Notification},
    submissions::{
        entities::{NewSubmission, Submission, SubmissionStatus},
        requests::SubmissionListQuery,
        responses::{
            SubmissionListItem, SubmissionListResponse, SubmissionStatusCounts, SubmitterInfo,
        },
    },
    users::{entities::User, requests::CreateUserRequest},
};
use crate::storage::Storage;

#[derive(Default)]
pub struct MemoryStorage {
    next_id: AtomicI64,
    pub users: DashMap<i64, User>,
    pub courses: DashMap<i64, Course>,
    pub instances: DashMap<i64, EnrolInstance>,
    pub submissions: DashMap<i64, Submission>,
    // (user_id, course_id, instance_id) -> 待审提交 ID，entry 原子性保证唯一
    pending_index: DashMap<(i64, i64, i64), i64>,
    pub enrolments: DashMap<(i64, i64), Enrolment>,
    pub files: DashMap<String, File>,
    pub notifications: DashMap<i64, Notification>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 测试夹具：插入用户
    pub fn put_user(&self, id: i64, username: &str, role: crate::models::users::entities::UserRole) {
        use crate::models::users::entities::UserStatus;
        self.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role,
                status: UserStatus::Active,
                display_name: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
    }

    /// 测试夹具：插入实例配置
    pub fn put_instance(&self, instance: EnrolInstance) {
        self.instances.insert(instance.id, instance);
    }

    /// 测试夹具：直接写入选课记录（模拟外部途径的既有选课）
    pub fn put_enrolment(&self, course_id: i64, user_id: i64, role: EnrolmentRole) {
        self.enrolments.insert(
            (course_id, user_id),
            Enrolment {
                id: self.alloc_id(),
                course_id,
                user_id,
                role,
                status: EnrolmentStatus::Active,
                time_start: Utc::now(),
                time_end: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
    }

    /// 测试夹具：回拨提交创建时间（构造过期/提醒场景）
    pub fn backdate_submission(&self, submission_id: i64, created_at: DateTime<Utc>) {
        if let Some(mut submission) = self.submissions.get_mut(&submission_id) {
            submission.created_at = created_at;
        }
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: CreateUserRequest) -> Result<User> {
        let id = self.alloc_id();
        let now = Utc::now();
        let user = User {
            id,
            username: user.username,
            email: user.email,
            role: user.role,
            status: user.status,
            display_name: user.display_name,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.users.len() as u64)
    }

    async fn get_course_by_id(&self, course_id: i64) -> Result<Option<Course>> {
        Ok(self.courses.get(&course_id).map(|c| c.clone()))
    }

    async fn get_instance_by_id(&self, instance_id: i64) -> Result<Option<EnrolInstance>> {
        Ok(self.instances.get(&instance_id).map(|i| i.clone()))
    }

    async fn get_instance_by_course_id(&self, course_id: i64) -> Result<Option<EnrolInstance>> {
        Ok(self
            .instances
            .iter()
            .find(|entry| entry.course_id == course_id)
            .map(|entry| entry.clone()))
    }

    async fn insert_submission_if_absent(
        &self,
        new: NewSubmission,
    ) -> Result<Option<Submission>> {
        use dashmap::mapref::entry::Entry;

        let key = (new.user_id, new.course_id, new.instance_id);
        match self.pending_index.entry(key) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let id = self.alloc_id();
                let now = Utc::now();
                let submission = Submission {
                    id,
                    course_id: new.course_id,
                    instance_id: new.instance_id,
                    user_id: new.user_id,
                    payment_method: new.details.method,
                    payment_amount: new.details.amount,
                    payment_date: new.details.date,
                    payment_ref: new.details.reference,
                    notes: new.details.notes,
                    file_token: new.file_token,
                    status: SubmissionStatus::Pending,
                    reviewer_id: None,
                    feedback: None,
                    time_reviewed: None,
                    time_reminder: None,
                    created_at: now,
                    updated_at: now,
                };
                self.submissions.insert(id, submission.clone());
                slot.insert(id);
                Ok(Some(submission))
            }
        }
    }

    async fn get_submission_by_id(&self, submission_id: i64) -> Result<Option<Submission>> {
        Ok(self.submissions.get(&submission_id).map(|s| s.clone()))
    }

    async fn get_submission_by_file_token(&self, token: &str) -> Result<Option<Submission>> {
        Ok(self
            .submissions
            .iter()
            .find(|s| s.file_token == token)
            .map(|s| s.clone()))
    }

    async fn finalize_submission_status(
        &self,
        submission_id: i64,
        to: SubmissionStatus,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // get_mut 持有分片锁，条件判定与更新对并发定稿原子
        let Some(mut submission) = self.submissions.get_mut(&submission_id) else {
            return Ok(false);
        };

        if submission.status != SubmissionStatus::Pending {
            return Ok(false);
        }

        submission.status = to;
        submission.reviewer_id = Some(reviewer_id);
        submission.feedback = feedback;
        submission.time_reviewed = Some(now);
        submission.updated_at = now;

        let key = (
            submission.user_id,
            submission.course_id,
            submission.instance_id,
        );
        drop(submission);
        self.pending_index.remove(&key);
        Ok(true)
    }

    async fn find_pending_submission(
        &self,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
    ) -> Result<Option<Submission>> {
        Ok(self
            .pending_index
            .get(&(user_id, course_id, instance_id))
            .and_then(|id| self.submissions.get(&*id).map(|s| s.clone())))
    }

    async fn list_submissions_with_pagination(
        &self,
        course_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        let page = query.page.unwrap_or(1).max(1);
        let size = query.size.unwrap_or(10).clamp(1, 100);

        let mut matched: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|s| s.course_id == course_id)
            .filter(|s| query.status.is_none_or(|status| s.status == status))
            .filter(|s| {
                query.search.as_deref().is_none_or(|needle| {
                    s.payment_ref
                        .as_deref()
                        .is_some_and(|r| r.contains(needle))
                        || s.notes.as_deref().is_some_and(|n| n.contains(needle))
                })
            })
            .map(|s| s.clone())
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        let total_pages = (total + size - 1) / size;
        let items = matched
            .into_iter()
            .skip(((page - 1) * size) as usize)
            .take(size as usize)
            .map(|s| {
                let submitter = self.users.get(&s.user_id);
                SubmissionListItem {
                    id: s.id,
                    course_id: s.course_id,
                    instance_id: s.instance_id,
                    submitter: SubmitterInfo {
                        id: s.user_id,
                        username: submitter
                            .as_ref()
                            .map(|u| u.username.clone())
                            .unwrap_or_else(|| "未知用户".to_string()),
                        display_name: submitter.as_ref().and_then(|u| u.display_name.clone()),
                        email: submitter.map(|u| u.email.clone()).unwrap_or_default(),
                    },
                    payment_method: s.payment_method,
                    payment_amount: s.payment_amount,
                    payment_date: s.payment_date.to_rfc3339(),
                    payment_ref: s.payment_ref,
                    status: s.status,
                    created_at: s.created_at.to_rfc3339(),
                    time_reviewed: s.time_reviewed.map(|dt| dt.to_rfc3339()),
                }
            })
            .collect();

        let counts = self.count_submissions_by_status(course_id).await?;

        Ok(SubmissionListResponse {
            items,
            pagination: PaginationInfo {
                page,
                page_size: size,
                total,
                total_pages,
            },
            counts,
        })
    }

    async fn count_submissions_by_status(
        &self,
        course_id: i64,
    ) -> Result<SubmissionStatusCounts> {
        let mut counts = SubmissionStatusCounts::default();
        for submission in self.submissions.iter() {
            if submission.course_id != course_id {
                continue;
            }
            match submission.status {
                SubmissionStatus::Pending => counts.pending += 1,
                SubmissionStatus::Approved => counts.approved += 1,
                SubmissionStatus::Rejected => counts.rejected += 1,
            }
            counts.total += 1;
        }
        Ok(counts)
    }

    async fn delete_submission(&self, submission_id: i64) -> Result<bool> {
        let Some((_, submission)) = self.submissions.remove(&submission_id) else {
            return Ok(false);
        };
        if submission.status == SubmissionStatus::Pending {
            self.pending_index.remove(&(
                submission.user_id,
                submission.course_id,
                submission.instance_id,
            ));
        }
        Ok(true)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        Ok(self
            .pending_with_instances()
            .into_iter()
            .filter(|(submission, instance)| {
                instance.enabled
                    && instance.expiry_threshold_days > 0
                    && instance.expiry_action != ExpiryAction::None
                    && submission.created_at
                        < now - chrono::Duration::days(instance.expiry_threshold_days)
            })
            .collect())
    }

    async fn list_auto_approve_pending(&self) -> Result<Vec<(Submission, EnrolInstance)>> {
        Ok(self
            .pending_with_instances()
            .into_iter()
            .filter(|(_, instance)| instance.enabled && instance.auto_approve_all)
            .collect())
    }

    async fn list_reminder_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        let reminder_cutoff = now - chrono::Duration::hours(24);
        Ok(self
            .pending_with_instances()
            .into_iter()
            .filter(|(submission, instance)| {
                instance.enabled
                    && instance.reminder_enabled
                    && submission.created_at
                        < now - chrono::Duration::hours(instance.reminder_threshold_hours)
                    && submission
                        .time_reminder
                        .is_none_or(|stamped| stamped < reminder_cutoff)
            })
            .collect())
    }

    async fn stamp_reminders(&self, submission_ids: &[i64], now: DateTime<Utc>) -> Result<u64> {
        let mut stamped = 0;
        for id in submission_ids {
            if let Some(mut submission) = self.submissions.get_mut(id) {
                submission.time_reminder = Some(now);
                submission.updated_at = now;
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    async fn upsert_enrolment(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<Enrolment> {
        use dashmap::mapref::entry::Entry;

        let enrolment = match self.enrolments.entry((course_id, user_id)) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let enrolment = Enrolment {
                    id: self.alloc_id(),
                    course_id,
                    user_id,
                    role,
                    status: EnrolmentStatus::Active,
                    time_start,
                    time_end,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(enrolment.clone());
                enrolment
            }
        };
        Ok(enrolment)
    }

    async fn get_enrolment(&self, course_id: i64, user_id: i64) -> Result<Option<Enrolment>> {
        Ok(self
            .enrolments
            .get(&(course_id, user_id))
            .map(|e| e.clone()))
    }

    async fn list_course_managers(&self, course_id: i64) -> Result<Vec<User>> {
        let manager_ids: Vec<i64> = self
            .enrolments
            .iter()
            .filter(|e| {
                e.course_id == course_id
                    && e.role == EnrolmentRole::Manager
                    && e.status == EnrolmentStatus::Active
            })
            .map(|e| e.user_id)
            .collect();

        self.get_users_by_ids(&manager_ids).await
    }

    async fn create_file(&self, file: NewFile) -> Result<File> {
        let file = File {
            token: file.token,
            original_name: file.original_name,
            stored_name: file.stored_name,
            file_size: file.file_size,
            file_type: file.file_type,
            user_id: file.user_id,
            created_at: Utc::now(),
        };
        self.files.insert(file.token.clone(), file.clone());
        Ok(file)
    }

    async fn get_file_by_token(&self, token: &str) -> Result<Option<File>> {
        Ok(self.files.get(token).map(|f| f.clone()))
    }

    async fn delete_file(&self, token: &str) -> Result<bool> {
        Ok(self.files.remove(token).is_some())
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        let id = self.alloc_id();
        let notification = Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind,
            subject: notification.subject,
            body: notification.body,
            course_id: notification.course_id,
            created_at: Utc::now(),
        };
        self.notifications.insert(id, notification.clone());
        Ok(notification)
    }
}

impl MemoryStorage {
    fn pending_with_instances(&self) -> Vec<(Submission, EnrolInstance)> {
        self.submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .filter_map(|s| {
                self.instances
                    .get(&s.instance_id)
                    .map(|i| (s.clone(), i.clone()))
            })
            .collect()
    }
}
