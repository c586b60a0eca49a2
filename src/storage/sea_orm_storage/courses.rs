//! 课程存储操作

use super::SeaOrmStorage;
use crate::entity::courses::Entity as Courses;
use crate::errors::{PayProofError, Result};
use crate::models::courses::entities::Course;
use sea_orm::EntityTrait;

impl SeaOrmStorage {
    /// 通过 ID 获取课程
    pub async fn get_course_by_id_impl(&self, course_id: i64) -> Result<Option<Course>> {
        let result = Courses::find_by_id(course_id)
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询课程失败: {e}")))?;

        Ok(result.map(|m| m.into_course()))
    }
}
