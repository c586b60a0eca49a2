/*!
 * 课程管理权限中间件
 *
 * 必须在 RequireJWT 之后使用，且路由路径中包含 `{course_id}`。
 * 站点管理员直接放行；其他用户要求在该课程中持有 manager 角色
 * 的生效选课记录。
 *
 * ## 使用方法
 *
 * ```rust,ignore
 * web::scope("/api/v1/courses/{course_id}/submissions")
 *     .wrap(RequireCourseManager)
 *     .wrap(RequireJWT)  // actix 中间件后注册者先执行
 *     .route("", web::get().to(list_submissions))
 * ```
 */

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, web,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::{rc::Rc, sync::Arc};

use crate::{
    models::{
        ErrorCode,
        enrolments::entities::{EnrolmentRole, EnrolmentStatus},
        users::entities::{User, UserRole},
    },
    storage::Storage,
};

use super::create_error_response;

#[derive(Clone)]
pub struct RequireCourseManager;

impl<S, B> Transform<S, ServiceRequest> for RequireCourseManager
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireCourseManagerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireCourseManagerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireCourseManagerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireCourseManagerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        Box::pin(async move {
            // 1. 校验用户信息（RequireJWT 已写入扩展）
            let user_opt = req.extensions().get::<User>().cloned();
            let user = match user_opt {
                Some(user) => user,
                None => {
                    return Ok(req.into_response(
                        create_error_response(
                            StatusCode::UNAUTHORIZED,
                            ErrorCode::Unauthorized,
                            "Unauthorized: missing user claims",
                        )
                        .map_into_right_body(),
                    ));
                }
            };

            // 2. 站点管理员直接放行
            if user.role == UserRole::Admin {
                let res = srv.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            // 3. 校验 course_id 路径参数
            let course_id = match req
                .match_info()
                .get("course_id")
                .and_then(|s| s.parse::<i64>().ok())
            {
                Some(id) => id,
                None => {
                    return Ok(req.into_response(
                        create_error_response(
                            StatusCode::BAD_REQUEST,
                            ErrorCode::BadRequest,
                            "Missing or invalid course_id in path",
                        )
                        .map_into_right_body(),
                    ));
                }
            };

            // 4. 查询用户在课程中的角色
            let storage = match req.app_data::<web::Data<Arc<dyn Storage>>>() {
                Some(storage) => storage.get_ref().clone(),
                None => {
                    return Ok(req.into_response(
                        create_error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            ErrorCode::InternalServerError,
                            "Storage not configured",
                        )
                        .map_into_right_body(),
                    ));
                }
            };

            let is_manager = match storage.get_enrolment(course_id, user.id).await {
                Ok(Some(enrolment)) => {
                    enrolment.role == EnrolmentRole::Manager
                        && enrolment.status == EnrolmentStatus::Active
                }
                Ok(None) => false,
                Err(e) => {
                    return Ok(req.into_response(
                        create_error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            ErrorCode::InternalServerError,
                            &format!("查询选课记录失败: {e}"),
                        )
                        .map_into_right_body(),
                    ));
                }
            };

            if !is_manager {
                return Ok(req.into_response(
                    create_error_response(
                        StatusCode::FORBIDDEN,
                        ErrorCode::CoursePermissionDenied,
                        "您不是该课程的管理员",
                    )
                    .map_into_right_body(),
                ));
            }

            let res = srv.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
