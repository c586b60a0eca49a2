//! 提交存储操作
//!
//! 状态变更全部走条件更新（compare-and-set），并发定稿同一提交时
//! 恰好一方成功；待审唯一性在事务内判定。

use std::collections::HashMap;

use super::SeaOrmStorage;
use crate::entity::enrol_instances::Entity as EnrolInstances;
use crate::entity::submissions::{ActiveModel, Column, Entity as Submissions, Model};
use crate::entity::users::{Column as UserColumn, Entity as Users};
use crate::errors::{PayProofError, Result};
use crate::models::{
    PaginationInfo,
    instances::entities::{EnrolInstance, ExpiryAction},
    submissions::{
        entities::{NewSubmission, Submission, SubmissionStatus},
        requests::SubmissionListQuery,
        responses::{
            SubmissionListItem, SubmissionListResponse, SubmissionStatusCounts, SubmitterInfo,
        },
    },
};
use crate::utils::escape_like_pattern;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};

impl SeaOrmStorage {
    /// 条件创建提交：同一 (user, course, instance) 已有待审提交时返回 None
    ///
    /// 判定与写入在同一事务内完成。
    pub async fn insert_submission_if_absent_impl(
        &self,
        new: NewSubmission,
    ) -> Result<Option<Submission>> {
        let now = chrono::Utc::now().timestamp();

        let result = self
            .db
            .transaction::<_, Option<Model>, PayProofError>(|txn| {
                Box::pin(async move {
                    let existing = Submissions::find()
                        .filter(Column::UserId.eq(new.user_id))
                        .filter(Column::CourseId.eq(new.course_id))
                        .filter(Column::InstanceId.eq(new.instance_id))
                        .filter(Column::Status.eq(SubmissionStatus::PENDING))
                        .one(txn)
                        .await
                        .map_err(|e| {
                            PayProofError::database_operation(format!("查询待审提交失败: {e}"))
                        })?;

                    if existing.is_some() {
                        return Ok(None);
                    }

                    let model = ActiveModel {
                        course_id: Set(new.course_id),
                        instance_id: Set(new.instance_id),
                        user_id: Set(new.user_id),
                        payment_method: Set(new.details.method.to_string()),
                        payment_amount: Set(new.details.amount),
                        payment_date: Set(new.details.date.timestamp()),
                        payment_ref: Set(new.details.reference),
                        notes: Set(new.details.notes),
                        file_token: Set(new.file_token),
                        status: Set(SubmissionStatus::PENDING.to_string()),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    };

                    let inserted = model.insert(txn).await.map_err(|e| {
                        PayProofError::database_operation(format!("创建提交失败: {e}"))
                    })?;

                    Ok(Some(inserted))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db) => PayProofError::from(db),
                TransactionError::Transaction(err) => err,
            })?;

        Ok(result.map(|m| m.into_submission()))
    }

    /// 通过 ID 获取提交
    pub async fn get_submission_by_id_impl(
        &self,
        submission_id: i64,
    ) -> Result<Option<Submission>> {
        let result = Submissions::find_by_id(submission_id)
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询提交失败: {e}")))?;

        Ok(result.map(|m| m.into_submission()))
    }

    /// 通过附件令牌获取所属提交
    pub async fn get_submission_by_file_token_impl(
        &self,
        token: &str,
    ) -> Result<Option<Submission>> {
        let result = Submissions::find()
            .filter(Column::FileToken.eq(token))
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询提交失败: {e}")))?;

        Ok(result.map(|m| m.into_submission()))
    }

    /// 条件定稿：仅当当前状态仍为 pending 时写入终态与审核元数据
    ///
    /// 返回 false 表示该提交已被其他执行者（人工审核或对账任务）定稿。
    pub async fn finalize_submission_status_impl(
        &self,
        submission_id: i64,
        to: SubmissionStatus,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        use sea_orm::sea_query::Expr;

        let result = Submissions::update_many()
            .col_expr(Column::Status, Expr::value(to.to_string()))
            .col_expr(Column::ReviewerId, Expr::value(Some(reviewer_id)))
            .col_expr(Column::Feedback, Expr::value(feedback))
            .col_expr(Column::TimeReviewed, Expr::value(Some(now.timestamp())))
            .col_expr(Column::UpdatedAt, Expr::value(now.timestamp()))
            .filter(Column::Id.eq(submission_id))
            .filter(Column::Status.eq(SubmissionStatus::PENDING))
            .exec(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("更新提交状态失败: {e}")))?;

        Ok(result.rows_affected > 0)
    }

    /// 查找某用户在某课程/实例下的待审提交
    pub async fn find_pending_submission_impl(
        &self,
        user_id: i64,
        course_id: i64,
        instance_id: i64,
    ) -> Result<Option<Submission>> {
        let result = Submissions::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::InstanceId.eq(instance_id))
            .filter(Column::Status.eq(SubmissionStatus::PENDING))
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询待审提交失败: {e}")))?;

        Ok(result.map(|m| m.into_submission()))
    }

    /// 列出课程下的提交（分页，联提交者信息）
    pub async fn list_submissions_with_pagination_impl(
        &self,
        course_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        let page = query.page.unwrap_or(1).max(1) as u64;
        let size = query.size.unwrap_or(10).clamp(1, 100) as u64;

        let mut select = Submissions::find().filter(Column::CourseId.eq(course_id));

        // 状态筛选
        if let Some(status) = query.status {
            select = select.filter(Column::Status.eq(status.to_string()));
        }

        // 付款参考号 / 备注搜索
        if let Some(ref search) = query.search
            && !search.trim().is_empty()
        {
            let pattern = format!("%{}%", escape_like_pattern(search.trim()));
            select = select.filter(
                Condition::any()
                    .add(Column::PaymentRef.like(&pattern))
                    .add(Column::Notes.like(&pattern)),
            );
        }

        // 排序
        select = select.order_by_desc(Column::CreatedAt);

        // 分页查询
        let paginator = select.paginate(&self.db, size);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询提交总数失败: {e}")))?;

        let pages = paginator
            .num_pages()
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询提交页数失败: {e}")))?;

        let submissions = paginator
            .fetch_page(page - 1)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询提交列表失败: {e}")))?;

        // 批量查询提交者信息
        let user_ids: Vec<i64> = submissions
            .iter()
            .map(|s| s.user_id)
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        let users = Users::find()
            .filter(UserColumn::Id.is_in(user_ids))
            .all(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询用户信息失败: {e}")))?;

        let user_map: HashMap<i64, _> = users.into_iter().map(|u| (u.id, u)).collect();

        // 组装 SubmissionListItem
        let items = submissions
            .into_iter()
            .map(|s| {
                let submitter = user_map.get(&s.user_id);
                let model = s.into_submission();
                SubmissionListItem {
                    id: model.id,
                    course_id: model.course_id,
                    instance_id: model.instance_id,
                    submitter: SubmitterInfo {
                        id: model.user_id,
                        username: submitter
                            .map(|u| u.username.clone())
                            .unwrap_or_else(|| "未知用户".to_string()),
                        display_name: submitter.and_then(|u| u.display_name.clone()),
                        email: submitter.map(|u| u.email.clone()).unwrap_or_default(),
                    },
                    payment_method: model.payment_method,
                    payment_amount: model.payment_amount,
                    payment_date: model.payment_date.to_rfc3339(),
                    payment_ref: model.payment_ref,
                    status: model.status,
                    created_at: model.created_at.to_rfc3339(),
                    time_reviewed: model.time_reviewed.map(|dt| dt.to_rfc3339()),
                }
            })
            .collect();

        let counts = self.count_submissions_by_status_impl(course_id).await?;

        Ok(SubmissionListResponse {
            items,
            pagination: PaginationInfo {
                page: page as i64,
                page_size: size as i64,
                total: total as i64,
                total_pages: pages as i64,
            },
            counts,
        })
    }

    /// 统计课程下各状态提交数量
    pub async fn count_submissions_by_status_impl(
        &self,
        course_id: i64,
    ) -> Result<SubmissionStatusCounts> {
        let rows: Vec<(String, i64)> = Submissions::find()
            .select_only()
            .column(Column::Status)
            .column_as(Column::Id.count(), "count")
            .filter(Column::CourseId.eq(course_id))
            .group_by(Column::Status)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("统计提交数量失败: {e}")))?;

        let mut counts = SubmissionStatusCounts::default();
        for (status, count) in rows {
            match status.as_str() {
                SubmissionStatus::PENDING => counts.pending = count,
                SubmissionStatus::APPROVED => counts.approved = count,
                SubmissionStatus::REJECTED => counts.rejected = count,
                _ => {}
            }
            counts.total += count;
        }

        Ok(counts)
    }

    /// 删除提交记录
    pub async fn delete_submission_impl(&self, submission_id: i64) -> Result<bool> {
        let result = Submissions::delete_by_id(submission_id)
            .exec(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("删除提交失败: {e}")))?;

        Ok(result.rows_affected > 0)
    }

    /// 超过实例过期阈值、且实例配置了过期动作的待审提交
    pub async fn list_expired_pending_impl(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        let rows = self.pending_with_instances().await?;

        Ok(rows
            .into_iter()
            .filter(|(submission, instance)| {
                instance.enabled
                    && instance.expiry_threshold_days > 0
                    && instance.expiry_action != ExpiryAction::None
                    && submission.created_at
                        < now - Duration::days(instance.expiry_threshold_days)
            })
            .collect())
    }

    /// 实例开启了全量自动批准的待审提交
    pub async fn list_auto_approve_pending_impl(
        &self,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        let rows = self.pending_with_instances().await?;

        Ok(rows
            .into_iter()
            .filter(|(_, instance)| instance.enabled && instance.auto_approve_all)
            .collect())
    }

    /// 满足提醒条件的待审提交
    ///
    /// 开启提醒、超过提醒阈值、且 24 小时内未被提醒批次覆盖。
    pub async fn list_reminder_candidates_impl(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Submission, EnrolInstance)>> {
        let reminder_cutoff = now - Duration::hours(24);
        let rows = self.pending_with_instances().await?;

        Ok(rows
            .into_iter()
            .filter(|(submission, instance)| {
                instance.enabled
                    && instance.reminder_enabled
                    && submission.created_at
                        < now - Duration::hours(instance.reminder_threshold_hours)
                    && submission
                        .time_reminder
                        .is_none_or(|stamped| stamped < reminder_cutoff)
            })
            .collect())
    }

    /// 给一批提交盖提醒时间戳
    pub async fn stamp_reminders_impl(
        &self,
        submission_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        use sea_orm::sea_query::Expr;

        if submission_ids.is_empty() {
            return Ok(0);
        }

        let result = Submissions::update_many()
            .col_expr(Column::TimeReminder, Expr::value(Some(now.timestamp())))
            .col_expr(Column::UpdatedAt, Expr::value(now.timestamp()))
            .filter(Column::Id.is_in(submission_ids.to_vec()))
            .exec(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("更新提醒时间失败: {e}")))?;

        Ok(result.rows_affected)
    }

    /// 待审提交联实例配置（对账三阶段共用的基础查询）
    async fn pending_with_instances(&self) -> Result<Vec<(Submission, EnrolInstance)>> {
        let rows = Submissions::find()
            .filter(Column::Status.eq(SubmissionStatus::PENDING))
            .find_also_related(EnrolInstances)
            .all(&self.db)
            .await
            .map_err(|e| {
                PayProofError::database_operation(format!("查询待审提交与实例失败: {e}"))
            })?;

        Ok(rows
            .into_iter()
            .filter_map(|(submission, instance)| {
                instance.map(|i| (submission.into_submission(), i.into_instance()))
            })
            .collect())
    }
}
