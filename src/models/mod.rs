//! 数据模型定义
//!
//! 业务实体与请求/响应 DTO，与 entity 模块中的数据库实体分离。

pub mod common;
pub mod courses;
pub mod enrolments;
pub mod files;
pub mod instances;
pub mod notifications;
pub mod submissions;
pub mod users;

pub use common::error_code::ErrorCode;
pub use common::pagination::PaginationInfo;
pub use common::response::ApiResponse;

/// 程序启动时间（用于运行状态接口）
#[derive(Debug, Clone)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}
