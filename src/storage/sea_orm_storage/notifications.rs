//! 通知存储操作（出站信箱）

use super::SeaOrmStorage;
use crate::entity::notifications::ActiveModel;
use crate::errors::{PayProofError, Result};
use crate::models::notifications::entities::{NewNotification, Notification};
use sea_orm::{ActiveModelTrait, Set};

impl SeaOrmStorage {
    /// 追加出站通知
    pub async fn create_notification_impl(
        &self,
        notification: NewNotification,
    ) -> Result<Notification> {
        let now = chrono::Utc::now().timestamp();

        let model = ActiveModel {
            user_id: Set(notification.user_id),
            kind: Set(notification.kind.to_string()),
            subject: Set(notification.subject),
            body: Set(notification.body),
            course_id: Set(notification.course_id),
            created_at: Set(now),
            ..Default::default()
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("写入通知失败: {e}")))?;

        Ok(result.into_notification())
    }
}
