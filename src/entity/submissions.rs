//! 付款凭证提交实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    pub instance_id: i64,
    pub user_id: i64,
    pub payment_method: String,
    pub payment_amount: f64,
    pub payment_date: i64,
    pub payment_ref: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub file_token: String,
    pub status: String,
    pub reviewer_id: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub feedback: Option<String>,
    pub time_reviewed: Option<i64>,
    pub time_reminder: Option<i64>,
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
        belongs_to = "super::enrol_instances::Entity",
        from = "Column::InstanceId",
        to = "super::enrol_instances::Column::Id"
    )]
    Instance,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Submitter,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::enrol_instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instance.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// 从数据库模型转换为业务模型
impl Model {
    pub fn into_submission(self) -> crate::models::submissions::entities::Submission {
        use crate::models::submissions::entities::{PaymentMethod, Submission, SubmissionStatus};
        use chrono::{DateTime, Utc};

        Submission {
            id: self.id,
            course_id: self.course_id,
            instance_id: self.instance_id,
            user_id: self.user_id,
            payment_method: self
                .payment_method
                .parse::<PaymentMethod>()
                .unwrap_or(PaymentMethod::Other),
            payment_amount: self.payment_amount,
            payment_date: DateTime::<Utc>::from_timestamp(self.payment_date, 0).unwrap_or_default(),
            payment_ref: self.payment_ref,
            notes: self.notes,
            file_token: self.file_token,
            status: self
                .status
                .parse::<SubmissionStatus>()
                .unwrap_or(SubmissionStatus::Pending),
            reviewer_id: self.reviewer_id,
            feedback: self.feedback,
            time_reviewed: self
                .time_reviewed
                .map(|ts| DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default()),
            time_reminder: self
                .time_reminder
                .map(|ts| DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default()),
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
            updated_at: DateTime::<Utc>::from_timestamp(self.updated_at, 0).unwrap_or_default(),
        }
    }
}
