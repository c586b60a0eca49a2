pub mod bulk;
pub mod create;
pub mod delete;
pub mod detail;
pub mod list;
pub mod review;

use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use crate::lifecycle::LifecycleEngine;
use crate::models::submissions::requests::{
    BulkSubmissionRequest, ReviewSubmissionRequest, SubmissionListQuery,
};
use crate::models::users::entities::User;
use crate::storage::Storage;

pub struct SubmissionService {
    storage: Option<Arc<dyn Storage>>,
}

impl SubmissionService {
    pub fn new_lazy() -> Self {
        Self { storage: None }
    }

    pub(crate) fn get_storage(&self, request: &HttpRequest) -> Arc<dyn Storage> {
        if let Some(storage) = &self.storage {
            storage.clone()
        } else {
            request
                .app_data::<actix_web::web::Data<Arc<dyn Storage>>>()
                .expect("Storage not found in app data")
                .get_ref()
                .clone()
        }
    }

    pub(crate) fn get_engine(&self, request: &HttpRequest) -> Arc<LifecycleEngine> {
        request
            .app_data::<actix_web::web::Data<Arc<LifecycleEngine>>>()
            .expect("LifecycleEngine not found in app data")
            .get_ref()
            .clone()
    }

    /// 上传付款凭证（multipart：表单字段 + 单个文件）
    pub async fn create_submission(
        &self,
        request: &HttpRequest,
        user: User,
        payload: Multipart,
    ) -> ActixResult<HttpResponse> {
        create::create_submission(self, request, user, payload).await
    }

    /// 获取提交详情
    pub async fn get_submission(
        &self,
        request: &HttpRequest,
        user: User,
        submission_id: i64,
    ) -> ActixResult<HttpResponse> {
        detail::get_submission(self, request, user, submission_id).await
    }

    /// 列出课程下的提交（管理端）
    pub async fn list_submissions(
        &self,
        request: &HttpRequest,
        course_id: i64,
        query: SubmissionListQuery,
    ) -> ActixResult<HttpResponse> {
        list::list_submissions(self, request, course_id, query).await
    }

    /// 审核提交
    pub async fn review_submission(
        &self,
        request: &HttpRequest,
        user: User,
        submission_id: i64,
        req: ReviewSubmissionRequest,
    ) -> ActixResult<HttpResponse> {
        review::review_submission(self, request, user, submission_id, req).await
    }

    /// 批量操作
    pub async fn bulk_action(
        &self,
        request: &HttpRequest,
        user: User,
        req: BulkSubmissionRequest,
    ) -> ActixResult<HttpResponse> {
        bulk::bulk_action(self, request, user, req).await
    }

    /// 删除提交
    pub async fn delete_submission(
        &self,
        request: &HttpRequest,
        user: User,
        submission_id: i64,
    ) -> ActixResult<HttpResponse> {
        delete::delete_submission(self, request, user, submission_id).await
    }
}

/// 当前用户是否可管理该课程的提交（站点管理员或课程管理员）
pub(crate) async fn can_manage_course(
    storage: &Arc<dyn Storage>,
    user: &User,
    course_id: i64,
) -> bool {
    use crate::models::enrolments::entities::{EnrolmentRole, EnrolmentStatus};
    use crate::models::users::entities::UserRole;

    if user.role == UserRole::Admin {
        return true;
    }

    matches!(
        storage.get_enrolment(course_id, user.id).await,
        Ok(Some(enrolment))
            if enrolment.role == EnrolmentRole::Manager
                && enrolment.status == EnrolmentStatus::Active
    )
}
