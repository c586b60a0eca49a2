use serde::{Deserialize, Serialize};
use ts_rs::TS;

// 附件元数据
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct File {
    // 文件的唯一标识符（下载令牌）
    pub token: String,
    // 原始文件名
    pub original_name: String,
    // 磁盘存储名
    pub stored_name: String,
    // 文件大小（以字节为单位）
    pub file_size: i64,
    // 声明的 MIME 类型
    pub file_type: String,
    // 上传者 ID
    pub user_id: i64,
    // 上传时间
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 新附件写入参数（上传服务落盘后由引擎持久化）
#[derive(Debug, Clone)]
pub struct NewFile {
    pub token: String,
    pub original_name: String,
    pub stored_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub user_id: i64,
}
