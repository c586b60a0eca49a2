use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use futures_util::TryStreamExt;
use futures_util::stream::StreamExt;
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use super::SubmissionService;
use crate::config::AppConfig;
use crate::errors::PayProofError;
use crate::models::files::entities::NewFile;
use crate::models::files::responses::FileInfo;
use crate::models::submissions::entities::{PaymentDetails, PaymentMethod};
use crate::models::submissions::responses::CreateSubmissionResponse;
use crate::models::users::entities::User;
use crate::models::{ApiResponse, ErrorCode};
use crate::utils::validate::{file_extension, parse_payment_date, validate_payment_amount,
    validate_payment_ref};
use crate::utils::validate_magic_bytes;

/// 已落盘的附件（表单校验失败时负责清理）
struct StagedFile {
    original_name: String,
    stored_name: String,
    file_type: String,
    file_size: i64,
    path: String,
}

impl StagedFile {
    fn discard(self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// 上传付款凭证
///
/// multipart 表单：course_id、payment_method、payment_amount、
/// payment_date、payment_ref（可选）、notes（可选）+ 恰好一个 file 部分。
/// 所有约束校验都发生在提交持久化之前。
pub async fn create_submission(
    service: &SubmissionService,
    request: &HttpRequest,
    user: User,
    mut payload: Multipart,
) -> ActixResult<HttpResponse> {
    let config = AppConfig::get();
    let upload_dir = &config.upload.dir;
    let max_size = config.upload.max_size;
    let allowed_types = &config.upload.allowed_types;

    // 确保上传目录存在
    if !Path::new(upload_dir).exists()
        && let Err(e) = fs::create_dir_all(upload_dir)
    {
        tracing::error!("{}", PayProofError::file_operation(format!("{e}")));
        return Ok(
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error_empty(
                ErrorCode::FileUploadFailed,
                "创建上传目录失败",
            )),
        );
    }

    // 表单字段
    let mut course_id: Option<i64> = None;
    let mut payment_method: Option<PaymentMethod> = None;
    let mut payment_amount: Option<f64> = None;
    let mut payment_date_raw: Option<String> = None;
    let mut payment_ref: Option<String> = None;
    let mut notes: Option<String> = None;
    let mut staged: Option<StagedFile> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();

        if name == "file" {
            if staged.is_some() {
                if let Some(staged) = staged.take() {
                    staged.discard();
                }
                return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
                    ErrorCode::MultifileUploadNotAllowed,
                    "一次只能上传一个付款凭证文件",
                )));
            }

            let original_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(|s| s.to_string())
                .unwrap_or_default();

            // 扩展名校验（允许列表来自配置）
            let extension = file_extension(&original_name);
            if !allowed_types.iter().any(|t| t.to_lowercase() == extension) {
                return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
                    ErrorCode::FileTypeNotAllowed,
                    format!("不支持的文件类型，允许: {}", allowed_types.join(", ")),
                )));
            }

            let file_type = field
                .content_type()
                .map(|ct| ct.to_string())
                .unwrap_or_default();

            let stored_name = format!("{}-{}.bin", chrono::Utc::now().timestamp(), Uuid::new_v4());
            let file_path = format!("{upload_dir}/{stored_name}");
            let mut f = match fs::File::create(&file_path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::error!("{}", PayProofError::file_operation(format!("{e}")));
                    return Ok(HttpResponse::InternalServerError().json(
                        ApiResponse::<()>::error_empty(ErrorCode::FileUploadFailed, "文件创建失败"),
                    ));
                }
            };

            let mut total_size: usize = 0;
            let mut first_chunk = true;
            while let Some(chunk) = field.next().await {
                let data = chunk?;

                // 第一个 chunk 时验证魔术字节
                if first_chunk {
                    first_chunk = false;
                    if !validate_magic_bytes(&data, &extension) {
                        let _ = fs::remove_file(&file_path);
                        return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
                            ErrorCode::FileTypeNotAllowed,
                            "文件内容与扩展名不匹配",
                        )));
                    }
                }

                total_size += data.len();
                // 校验大小
                if total_size > max_size {
                    let _ = fs::remove_file(&file_path);
                    return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
                        ErrorCode::FileSizeExceeded,
                        "文件大小超出限制",
                    )));
                }
                f.write_all(&data)?;
            }

            staged = Some(StagedFile {
                original_name,
                stored_name,
                file_type,
                file_size: total_size as i64,
                path: file_path,
            });
        } else {
            let value = read_text_field(&mut field).await?;
            match name.as_str() {
                "course_id" => course_id = value.parse().ok(),
                "payment_method" => payment_method = value.parse().ok(),
                "payment_amount" => payment_amount = value.parse().ok(),
                "payment_date" => payment_date_raw = Some(value),
                "payment_ref" => payment_ref = Some(value).filter(|v| !v.is_empty()),
                "notes" => notes = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }
    }

    // 字段校验：失败时丢弃已落盘的附件
    let Some(staged_file) = staged else {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::error_empty(
            ErrorCode::FileNotFound,
            "缺少付款凭证文件",
        )));
    };

    macro_rules! reject {
        ($code:expr, $message:expr) => {{
            staged_file.discard();
            return Ok(HttpResponse::BadRequest()
                .json(ApiResponse::error_empty($code, $message)));
        }};
    }

    let Some(course_id) = course_id else {
        reject!(ErrorCode::ValidationFailed, "缺少或无效的 course_id");
    };
    let Some(method) = payment_method else {
        reject!(
            ErrorCode::ValidationFailed,
            "缺少或无效的付款方式（bank/cash/check/credit/other）"
        );
    };
    let Some(amount) = payment_amount else {
        reject!(ErrorCode::ValidationFailed, "缺少或无效的付款金额");
    };
    if let Err(e) = validate_payment_amount(amount) {
        reject!(ErrorCode::ValidationFailed, e);
    }
    let date = match payment_date_raw.as_deref() {
        Some(raw) => match parse_payment_date(raw, chrono::Utc::now()) {
            Ok(date) => date,
            Err(e) => reject!(ErrorCode::ValidationFailed, e),
        },
        None => reject!(ErrorCode::ValidationFailed, "缺少付款日期（YYYY-MM-DD）"),
    };
    if let Some(ref reference) = payment_ref
        && let Err(e) = validate_payment_ref(reference)
    {
        reject!(ErrorCode::ValidationFailed, e);
    }

    // 解析课程对应的报名实例
    let storage = service.get_storage(request);
    let instance = match storage.get_instance_by_course_id(course_id).await {
        Ok(Some(instance)) => instance,
        Ok(None) => reject!(
            ErrorCode::InstanceNotFound,
            format!("课程 {course_id} 未配置付款凭证报名")
        ),
        Err(e) => {
            staged_file.discard();
            return Ok(
                HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                    ErrorCode::InternalServerError,
                    format!("查询报名实例失败: {e}"),
                )),
            );
        }
    };

    let attachment = NewFile {
        token: Uuid::new_v4().to_string(),
        original_name: staged_file.original_name.clone(),
        stored_name: staged_file.stored_name.clone(),
        file_size: staged_file.file_size,
        file_type: staged_file.file_type.clone(),
        user_id: user.id,
    };
    let file_info = FileInfo {
        token: attachment.token.clone(),
        file_name: attachment.original_name.clone(),
        size: attachment.file_size,
        content_type: attachment.file_type.clone(),
        created_at: chrono::Utc::now(),
    };

    let engine = service.get_engine(request);
    let details = PaymentDetails {
        method,
        amount,
        date,
        reference: payment_ref,
        notes,
    };

    match engine
        .submit(user.id, course_id, instance.id, details, attachment)
        .await
    {
        Ok(outcome) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            CreateSubmissionResponse {
                id: outcome.submission.id,
                course_id,
                status: outcome.submission.status,
                file: file_info,
                warnings: outcome.warnings,
            },
            "付款凭证已提交，等待审核",
        ))),
        Err(e) => {
            staged_file.discard();
            let response = match e.code() {
                // DuplicateSubmission
                "E013" => HttpResponse::Conflict().json(ApiResponse::error_empty(
                    ErrorCode::DuplicateSubmission,
                    e.message(),
                )),
                // AlreadyEnrolled
                "E014" => HttpResponse::Conflict().json(ApiResponse::error_empty(
                    ErrorCode::AlreadyEnrolled,
                    e.message(),
                )),
                // Validation
                "E007" => HttpResponse::BadRequest().json(ApiResponse::error_empty(
                    ErrorCode::ValidationFailed,
                    e.message(),
                )),
                // NotFound
                "E008" => HttpResponse::NotFound().json(ApiResponse::error_empty(
                    ErrorCode::InstanceNotFound,
                    e.message(),
                )),
                _ => HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                    ErrorCode::InternalServerError,
                    format!("创建提交失败: {e}"),
                )),
            };
            Ok(response)
        }
    }
}

// 读取文本表单字段
async fn read_text_field(
    field: &mut actix_multipart::Field,
) -> Result<String, actix_web::Error> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        data.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&data).trim().to_string())
}
