use serde::Deserialize;
use ts_rs::TS;

use crate::models::users::entities::{UserRole, UserStatus};

/// 创建用户请求（用户通常由外部身份系统同步，本接口主要用于初始化）
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/user.ts")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub display_name: Option<String>,
}
