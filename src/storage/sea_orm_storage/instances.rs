//! 报名实例存储操作

use super::SeaOrmStorage;
use crate::entity::enrol_instances::{Column, Entity as EnrolInstances};
use crate::errors::{PayProofError, Result};
use crate::models::instances::entities::EnrolInstance;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

impl SeaOrmStorage {
    /// 通过 ID 获取实例配置
    pub async fn get_instance_by_id_impl(
        &self,
        instance_id: i64,
    ) -> Result<Option<EnrolInstance>> {
        let result = EnrolInstances::find_by_id(instance_id)
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询报名实例失败: {e}")))?;

        Ok(result.map(|m| m.into_instance()))
    }

    /// 通过课程 ID 获取实例配置（每门课程至多一条）
    pub async fn get_instance_by_course_id_impl(
        &self,
        course_id: i64,
    ) -> Result<Option<EnrolInstance>> {
        let result = EnrolInstances::find()
            .filter(Column::CourseId.eq(course_id))
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询报名实例失败: {e}")))?;

        Ok(result.map(|m| m.into_instance()))
    }
}
