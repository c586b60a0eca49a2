//! 选课记录实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrolments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub role: String,
    pub status: String,
    pub time_start: i64,
    // 0 = 不限期
    pub time_end: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// 从数据库模型转换为业务模型
impl Model {
    pub fn into_enrolment(self) -> crate::models::enrolments::entities::Enrolment {
        use crate::models::enrolments::entities::{Enrolment, EnrolmentRole, EnrolmentStatus};
        use chrono::{DateTime, Utc};

        Enrolment {
            id: self.id,
            course_id: self.course_id,
            user_id: self.user_id,
            role: self
                .role
                .parse::<EnrolmentRole>()
                .unwrap_or(EnrolmentRole::Student),
            status: self
                .status
                .parse::<EnrolmentStatus>()
                .unwrap_or(EnrolmentStatus::Active),
            time_start: DateTime::<Utc>::from_timestamp(self.time_start, 0).unwrap_or_default(),
            time_end: (self.time_end > 0)
                .then(|| DateTime::<Utc>::from_timestamp(self.time_end, 0).unwrap_or_default()),
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
            updated_at: DateTime::<Utc>::from_timestamp(self.updated_at, 0).unwrap_or_default(),
        }
    }
}
