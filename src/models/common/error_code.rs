use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// 业务错误码（随 ApiResponse.code 返回）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/api.ts")]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,

    // 通用错误
    BadRequest = 4000,
    ValidationFailed = 4001,
    Unauthorized = 4010,
    Forbidden = 4030,
    CoursePermissionDenied = 4031,
    NotFound = 4040,
    RateLimitExceeded = 4290,
    InternalServerError = 5000,

    // 资源错误
    CourseNotFound = 4101,
    InstanceNotFound = 4102,
    SubmissionNotFound = 4103,
    UserNotFound = 4104,
    FileNotFound = 4105,

    // 提交生命周期错误
    DuplicateSubmission = 4201,
    AlreadyEnrolled = 4202,
    InvalidTransition = 4203,
    FeedbackRequired = 4204,

    // 文件上传错误
    FileTypeNotAllowed = 4301,
    FileSizeExceeded = 4302,
    MultifileUploadNotAllowed = 4303,
    FileUploadFailed = 5001,
}
