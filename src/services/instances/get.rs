use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};

use super::InstanceService;
use crate::config::AppConfig;
use crate::models::instances::entities::EnrolInstance;
use crate::models::instances::responses::{InstanceDetailResponse, InstancePublicResponse};
use crate::models::{ApiResponse, ErrorCode};

async fn load_instance(
    service: &InstanceService,
    request: &HttpRequest,
    course_id: i64,
) -> Result<EnrolInstance, HttpResponse> {
    match service
        .get_storage(request)
        .get_instance_by_course_id(course_id)
        .await
    {
        Ok(Some(instance)) => Ok(instance),
        Ok(None) => Err(HttpResponse::NotFound().json(ApiResponse::error_empty(
            ErrorCode::InstanceNotFound,
            format!("课程 {course_id} 未配置付款凭证报名"),
        ))),
        Err(e) => Err(
            HttpResponse::InternalServerError().json(ApiResponse::error_empty(
                ErrorCode::InternalServerError,
                format!("查询报名实例失败: {e}"),
            )),
        ),
    }
}

/// 上传页所需的付款信息（隐藏策略细节）
pub async fn get_payment_info(
    service: &InstanceService,
    request: &HttpRequest,
    course_id: i64,
) -> ActixResult<HttpResponse> {
    let instance = match load_instance(service, request, course_id).await {
        Ok(instance) => instance,
        Err(response) => return Ok(response),
    };

    let config = AppConfig::get();
    let response = InstancePublicResponse {
        id: instance.id,
        course_id: instance.course_id,
        enabled: instance.enabled,
        payment_instructions: instance.payment_instructions,
        allowed_file_types: config.upload.allowed_types.clone(),
        max_file_size: config.upload.max_size,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response, "查询成功")))
}

/// 完整实例配置（管理端，权限由路由中间件保证）
pub async fn get_instance_detail(
    service: &InstanceService,
    request: &HttpRequest,
    course_id: i64,
) -> ActixResult<HttpResponse> {
    let instance = match load_instance(service, request, course_id).await {
        Ok(instance) => instance,
        Err(response) => return Ok(response),
    };

    let response = InstanceDetailResponse {
        id: instance.id,
        course_id: instance.course_id,
        enabled: instance.enabled,
        role: instance.role.to_string(),
        enrol_period_secs: instance.enrol_period_secs,
        expiry_threshold_days: instance.expiry_threshold_days,
        expiry_action: instance.expiry_action,
        auto_approve_all: instance.auto_approve_all,
        notify_on_submission: instance.notify_on_submission,
        reminder_enabled: instance.reminder_enabled,
        reminder_threshold_hours: instance.reminder_threshold_hours,
        reminder_recipients: instance.reminder_recipients,
        specific_recipient_ids: instance.specific_recipient_ids,
        payment_instructions: instance.payment_instructions,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response, "查询成功")))
}
