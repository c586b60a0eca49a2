//! 选课记录存储操作

use super::SeaOrmStorage;
use crate::entity::enrolments::{ActiveModel, Column, Entity as Enrolments, Model};
use crate::entity::users::{Column as UserColumn, Entity as Users};
use crate::errors::{PayProofError, Result};
use crate::models::enrolments::entities::{Enrolment, EnrolmentRole, EnrolmentStatus};
use crate::models::users::entities::User;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionError,
    TransactionTrait,
};

impl SeaOrmStorage {
    /// 幂等写入选课记录
    ///
    /// (course, user) 已存在时原样返回既有记录，不做任何修改；
    /// 唯一索引兜底并发下的重复插入。
    pub async fn upsert_enrolment_impl(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrolmentRole,
        time_start: DateTime<Utc>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<Enrolment> {
        let now = chrono::Utc::now().timestamp();

        let result = self
            .db
            .transaction::<_, Model, PayProofError>(|txn| {
                Box::pin(async move {
                    let existing = Enrolments::find()
                        .filter(Column::CourseId.eq(course_id))
                        .filter(Column::UserId.eq(user_id))
                        .one(txn)
                        .await
                        .map_err(|e| {
                            PayProofError::database_operation(format!("查询选课记录失败: {e}"))
                        })?;

                    if let Some(model) = existing {
                        return Ok(model);
                    }

                    let model = ActiveModel {
                        course_id: Set(course_id),
                        user_id: Set(user_id),
                        role: Set(role.to_string()),
                        status: Set(EnrolmentStatus::Active.to_string()),
                        time_start: Set(time_start.timestamp()),
                        time_end: Set(time_end.map(|dt| dt.timestamp()).unwrap_or(0)),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    };

                    model.insert(txn).await.map_err(|e| {
                        PayProofError::database_operation(format!("创建选课记录失败: {e}"))
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db) => PayProofError::from(db),
                TransactionError::Transaction(err) => err,
            })?;

        Ok(result.into_enrolment())
    }

    /// 获取选课记录
    pub async fn get_enrolment_impl(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<Enrolment>> {
        let result = Enrolments::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询选课记录失败: {e}")))?;

        Ok(result.map(|m| m.into_enrolment()))
    }

    /// 列出课程管理员
    pub async fn list_course_managers_impl(&self, course_id: i64) -> Result<Vec<User>> {
        let manager_ids: Vec<i64> = Enrolments::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Role.eq(EnrolmentRole::MANAGER))
            .filter(Column::Status.eq(EnrolmentStatus::Active.to_string()))
            .all(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询课程管理员失败: {e}")))?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        if manager_ids.is_empty() {
            return Ok(vec![]);
        }

        let users = Users::find()
            .filter(UserColumn::Id.is_in(manager_ids))
            .all(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询用户信息失败: {e}")))?;

        Ok(users.into_iter().map(|m| m.into_user()).collect())
    }
}
