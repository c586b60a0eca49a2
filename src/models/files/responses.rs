use serde::Serialize;
use ts_rs::TS;

/// 附件信息（对外展示）
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct FileInfo {
    pub token: String,
    pub file_name: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::models::files::entities::File> for FileInfo {
    fn from(file: crate::models::files::entities::File) -> Self {
        Self {
            token: file.token,
            file_name: file.original_name,
            size: file.file_size,
            content_type: file.file_type,
            created_at: file.created_at,
        }
    }
}
