//! 附件存储操作

use super::SeaOrmStorage;
use crate::entity::files::{ActiveModel, Entity as Files};
use crate::errors::{PayProofError, Result};
use crate::models::files::entities::{File, NewFile};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

impl SeaOrmStorage {
    /// 写入附件元数据
    pub async fn create_file_impl(&self, file: NewFile) -> Result<File> {
        let now = chrono::Utc::now().timestamp();

        let model = ActiveModel {
            token: Set(file.token),
            original_name: Set(file.original_name),
            stored_name: Set(file.stored_name),
            file_size: Set(file.file_size),
            file_type: Set(file.file_type),
            user_id: Set(file.user_id),
            created_at: Set(now),
        };

        let result = model
            .insert(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("写入附件元数据失败: {e}")))?;

        Ok(result.into_file())
    }

    /// 通过令牌获取附件
    pub async fn get_file_by_token_impl(&self, token: &str) -> Result<Option<File>> {
        let result = Files::find_by_id(token.to_string())
            .one(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("查询附件失败: {e}")))?;

        Ok(result.map(|m| m.into_file()))
    }

    /// 删除附件元数据
    pub async fn delete_file_impl(&self, token: &str) -> Result<bool> {
        let result = Files::delete_by_id(token.to_string())
            .exec(&self.db)
            .await
            .map_err(|e| PayProofError::database_operation(format!("删除附件失败: {e}")))?;

        Ok(result.rows_affected > 0)
    }
}
