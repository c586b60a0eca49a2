use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{
    courses::entities::Course,
    enrolments::entities::{Enrolment, EnrolmentRole},
    files::entities::{File, NewFile},
    instances::entities::EnrolInstance,
    notifications::entities::{NewNotification, Notification},
    submissions::{
        entities::{NewSubmission, Submission, SubmissionStatus},
        requests::SubmissionListQuery,
        responses::{SubmissionListResponse, SubmissionStatusCounts},
    },
    users::{entities::User, requests::CreateUserRequest},
};

use crate::errors::Result;

pub mod sea_orm_storage;

#[cfg(test)]
pub mod memory;

/// 持久层接口
///
/// 只承担存取与筛选查询，业务规则（状态机合法性、通知、选课）
/// 全部位于 lifecycle 模块。提交状态只能经由
/// `finalize_submission_status` 的条件更新变更，且该方法仅由
/// 生命周期引擎调用。
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// 用户方法
    // 创建用户（用于初始化，用户通常由外部身份系统同步）
    async fn create_user(&self, user: CreateUserRequest) -> Result<User>;
    // 通过ID获取用户信息
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>>;
    // 批量获取用户信息
    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;
    // 统计用户总数
    async fn count_users(&self) -> Result<u64>;

    /// 课程方法
    // 通过ID获取课程信息
    async fn get_course_by_id(&self, course_id: i64) -> Result<Option<Course>>;

    /// 报名实例方法
    // 通过ID获取实例配置
    async fn get_instance_by_id(&self, instance_id: i64) -> Result<Option<EnrolInstance>>;
    // 通过课程ID获取实例配置（每门课程至多一条）
    async fn get_instance_by_course_id(&self, course_id: i64) -> Result<Option<EnrolInstance>>;

    /// 提交方法
    // 条件创建：同一 (user, course, instance) 已存在待审提交时返回 None，
    // 由存储层保证判定与写入的原子性
    async fn insert_submission_if_absent(
        &self,
        new: NewSubmission,
    ) -> Result<Option<Submission>>;
    // 通过ID获取提交
    async fn get_submission_by_id(&self, submission_id: i64) -> Result<Option<Submission>>;
    // 通过附件令牌获取所属提交（附件访问控制用）
    async fn get_submission_by_file_token(&self, token: &str) -> Result<Option<Submission>>;
    // 条件定稿：仅当当前状态为 pending 时写入终态与审核元数据，
    // 返回是否有行被更新（false = 已被其他执行者定稿）
    async fn finalize_submission_status(
        &self,
        submission_id: i64,
        to: SubmissionStatus,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    // 查找某用户在某课程/实例下的待审提交
    async fn find_pending_submission(
        &self,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
    ) -> Result<Option<Submission>>;
    // 列出课程下的提交（分页，联提交者信息）
    async fn list_submissions_with_pagination(
        &self,
        course_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse>;
    // 统计课程下各状态提交数量
    async fn count_submissions_by_status(
        &self,
        course_id: i64,
    ) -> Result<SubmissionStatusCounts>;
    // 删除提交记录
    async fn delete_submission(&self, submission_id: i64) -> Result<bool>;

    /// 对账查询方法
    // 超过实例过期阈值、且实例配置了过期动作的待审提交
    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>>;
    // 实例开启了全量自动批准的待审提交
    async fn list_auto_approve_pending(&self) -> Result<Vec<(Submission, EnrolInstance)>>;
    // 满足提醒条件的待审提交：开启提醒、超过提醒阈值、
    // 且 24 小时内未被提醒批次覆盖
    async fn list_reminder_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>>;
    // 给一批提交盖提醒时间戳
    async fn stamp_reminders(&self, submission_ids: &[i64], now: DateTime<Utc>) -> Result<u64>;

    /// 选课方法
    // 幂等写入选课记录：已存在 (course, user) 行时不做任何修改
    async fn upsert_enrolment(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<Enrolment>;
    // 获取选课记录
    async fn get_enrolment(&self, course_id: i64, user_id: i64) -> Result<Option<Enrolment>>;
    // 列出课程管理员（可审核付款凭证的用户）
    async fn list_course_managers(&self, course_id: i64) -> Result<Vec<User>>;

    /// 文件方法
    // 写入附件元数据
    async fn create_file(&self, file: NewFile) -> Result<File>;
    // 通过令牌获取附件
    async fn get_file_by_token(&self, token: &str) -> Result<Option<File>>;
    // 删除附件元数据
    async fn delete_file(&self, token: &str) -> Result<bool>;

    /// 通知方法
    // 追加出站通知
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification>;
}

pub async fn create_storage() -> Result<Arc<dyn Storage>> {
    let storage = sea_orm_storage::SeaOrmStorage::new_async().await?;
    Ok(Arc::new(storage))
}
