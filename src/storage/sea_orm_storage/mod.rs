//! SeaORM 存储实现
//!
//! 统一的数据库存储层，支持 SQLite、PostgreSQL 和 MySQL。

mod courses;
mod enrolments;
mod files;
mod instances;
mod notifications;
mod submissions;
mod users;

use crate::config::AppConfig;
use crate::errors::{PayProofError, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// SeaORM 存储实现
#[derive(Clone)]
pub struct SeaOrmStorage {
    pub(crate) db: DatabaseConnection,
}

impl SeaOrmStorage {
    /// 创建新的 SeaORM 存储实例
    pub async fn new_async() -> Result<Self> {
        let config = AppConfig::get();
        let db_url = Self::build_database_url(&config.database.url)?;

        // 根据数据库类型选择连接方式
        let db = if db_url.starts_with("sqlite://") {
            Self::connect_sqlite(&db_url, config).await?
        } else {
            Self::connect_generic(&db_url, config).await?
        };

        // 运行迁移
        Migrator::up(&db, None)
            .await
            .map_err(|e| PayProofError::database_operation(format!("数据库迁移失败: {e}")))?;

        info!("SeaORM 存储初始化完成，数据库: {}", db_url);

        Ok(Self { db })
    }

    /// SQLite 专用连接（WAL + pragma 优化）
    async fn connect_sqlite(url: &str, config: &AppConfig) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
        };
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str(url)
            .map_err(|e| PayProofError::database_config(format!("SQLite URL 解析失败: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("cache_size", "-64000")
            .pragma("temp_store", "memory")
            .pragma("mmap_size", "536870912")
            .pragma("wal_autocheckpoint", "1000");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.pool_size)
            .min_connections(1)
            .test_before_acquire(true)
            .acquire_timeout(Duration::from_secs(config.database.timeout))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(opt)
            .await
            .map_err(|e| PayProofError::database_connection(format!("SQLite 连接失败: {e}")))?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    /// 通用连接（PostgreSQL、MySQL 等）
    async fn connect_generic(url: &str, config: &AppConfig) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(config.database.pool_size)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(config.database.timeout))
            .acquire_timeout(Duration::from_secs(config.database.timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging(false)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        Database::connect(opt)
            .await
            .map_err(|e| PayProofError::database_connection(format!("无法连接到数据库: {e}")))
    }

    /// 从 URL 自动推断数据库类型并构建连接 URL
    fn build_database_url(url: &str) -> Result<String> {
        if url.starts_with("sqlite://") {
            Ok(url.to_string())
        } else if url.ends_with(".db") || url.ends_with(".sqlite") || url == ":memory:" {
            Ok(format!("sqlite://{}?mode=rwc", url))
        } else if url.starts_with("postgres://")
            || url.starts_with("postgresql://")
            || url.starts_with("mysql://")
            || url.starts_with("mariadb://")
        {
            Ok(url.to_string())
        } else {
            Err(PayProofError::database_config(format!(
                "无法从 URL 推断数据库类型: {url}. 支持: sqlite://, postgres://, mysql://, 或 .db/.sqlite 文件路径"
            )))
        }
    }
}

// Storage trait 实现
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
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
impl Storage for SeaOrmStorage {
    // 用户模块
    async fn create_user(&self, user: CreateUserRequest) -> Result<User> {
        self.create_user_impl(user).await
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.get_user_by_id_impl(id).await
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        self.get_users_by_ids_impl(ids).await
    }

    async fn count_users(&self) -> Result<u64> {
        self.count_users_impl().await
    }

    // 课程模块
    async fn get_course_by_id(&self, course_id: i64) -> Result<Option<Course>> {
        self.get_course_by_id_impl(course_id).await
    }

    // 报名实例模块
    async fn get_instance_by_id(&self, instance_id: i64) -> Result<Option<EnrolInstance>> {
        self.get_instance_by_id_impl(instance_id).await
    }

    async fn get_instance_by_course_id(&self, course_id: i64) -> Result<Option<EnrolInstance>> {
        self.get_instance_by_course_id_impl(course_id).await
    }

    // 提交模块
    async fn insert_submission_if_absent(
        &self,
        new: NewSubmission,
    ) -> Result<Option<Submission>> {
        self.insert_submission_if_absent_impl(new).await
    }

    async fn get_submission_by_id(&self, submission_id: i64) -> Result<Option<Submission>> {
        self.get_submission_by_id_impl(submission_id).await
    }

    async fn get_submission_by_file_token(&self, token: &str) -> Result<Option<Submission>> {
        self.get_submission_by_file_token_impl(token).await
    }

    async fn finalize_submission_status(
        &self,
        submission_id: i64,
        to: SubmissionStatus,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.finalize_submission_status_impl(submission_id, to, reviewer_id, feedback, now)
            .await
    }

    async fn find_pending_submission(
        &self,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
    ) -> Result<Option<Submission>> {
        self.find_pending_submission_impl(user_id, course_id, instance_id)
            .await
    }

    async fn list_submissions_with_pagination(
        &self,
        course_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        self.list_submissions_with_pagination_impl(course_id, query)
            .await
    }

    async fn count_submissions_by_status(
        &self,
        course_id: i64,
    ) -> Result<SubmissionStatusCounts> {
        self.count_submissions_by_status_impl(course_id).await
    }

    async fn delete_submission(&self, submission_id: i64) -> Result<bool> {
        self.delete_submission_impl(submission_id).await
    }

    // 对账模块
    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        self.list_expired_pending_impl(now).await
    }

    async fn list_auto_approve_pending(&self) -> Result<Vec<(Submission, EnrolInstance)>> {
        self.list_auto_approve_pending_impl().await
    }

    async fn list_reminder_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        self.list_reminder_candidates_impl(now).await
    }

    async fn stamp_reminders(&self, submission_ids: &[i64], now: DateTime<Utc>) -> Result<u64> {
        self.stamp_reminders_impl(submission_ids, now).await
    }

    // 选课模块
    async fn upsert_enrolment(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<Enrolment> {
        self.upsert_enrolment_impl(course_id, user_id, role, time_start, time_end)
            .await
    }

    async fn get_enrolment(&self, course_id: i64, user_id: i64) -> Result<Option<Enrolment>> {
        self.get_enrolment_impl(course_id, user_id).await
    }

    async fn list_course_managers(&self, course_id: i64) -> Result<Vec<User>> {
        self.list_course_managers_impl(course_id).await
    }

    // 文件模块
    async fn create_file(&self, file: NewFile) -> Result<File> {
        self.create_file_impl(file).await
    }

    async fn get_file_by_token(&self, token: &str) -> Result<Option<File>> {
        self.get_file_by_token_impl(token).await
    }

    async fn delete_file(&self, token: &str) -> Result<bool> {
        self.delete_file_impl(token).await
    }

    // 通知模块
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        self.create_notification_impl(notification).await
    }
}
