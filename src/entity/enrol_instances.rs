//! 报名实例实体（每门课程的付款凭证策略配置）

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "enrol_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub course_id: i64,
    pub enabled: bool,
    pub role: String,
    pub enrol_period_secs: i64,
    pub expiry_threshold_days: i64,
    pub expiry_action: String,
    pub auto_approve_all: bool,
    pub notify_on_submission: bool,
    pub reminder_enabled: bool,
    pub reminder_threshold_hours: i64,
    pub reminder_recipients: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub specific_recipient_ids: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub payment_instructions: Option<String>,
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
    #[sea_orm(has_many = "super::submissions::Entity")]
    Submissions,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::submissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// 从数据库模型转换为业务模型
impl Model {
    pub fn into_instance(self) -> crate::models::instances::entities::EnrolInstance {
        use crate::models::enrolments::entities::EnrolmentRole;
        use crate::models::instances::entities::{EnrolInstance, ExpiryAction, ReminderRecipients};
        use chrono::{DateTime, Utc};

        EnrolInstance {
            id: self.id,
            course_id: self.course_id,
            enabled: self.enabled,
            role: self
                .role
                .parse::<EnrolmentRole>()
                .unwrap_or(EnrolmentRole::Student),
            enrol_period_secs: self.enrol_period_secs,
            expiry_threshold_days: self.expiry_threshold_days,
            expiry_action: self
                .expiry_action
                .parse::<ExpiryAction>()
                .unwrap_or(ExpiryAction::None),
            auto_approve_all: self.auto_approve_all,
            notify_on_submission: self.notify_on_submission,
            reminder_enabled: self.reminder_enabled,
            reminder_threshold_hours: self.reminder_threshold_hours,
            reminder_recipients: self
                .reminder_recipients
                .parse::<ReminderRecipients>()
                .unwrap_or(ReminderRecipients::Managers),
            specific_recipient_ids: self.specific_recipient_ids,
            payment_instructions: self.payment_instructions,
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
            updated_at: DateTime::<Utc>::from_timestamp(self.updated_at, 0).unwrap_or_default(),
        }
    }
}
