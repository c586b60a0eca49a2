/*!
 * JWT 认证中间件
 *
 * 验证 Bearer 令牌并把用户信息写入请求扩展。令牌由外部身份系统
 * 签发（共享密钥），本中间件只做校验与用户行解析。
 *
 * ## 使用方法
 *
 * 1. 在路由上应用中间件：
 * ```rust,ignore
 * web::scope("/api/v1/submissions")
 *     .wrap(RequireJWT)
 *     .route("", web::post().to(create_submission))
 * ```
 *
 * 2. 在处理程序中提取用户信息：
 * ```rust,ignore
 * if let Some(user) = RequireJWT::extract_user_claims(&req) {
 *     // user.id / user.role 可用
 * }
 * ```
 *
 * ## 认证流程
 *
 * 1. 客户端在请求头中包含 `Authorization: Bearer <JWT_TOKEN>`
 * 2. 中间件验证令牌并解析出用户 ID
 * 3. 用户行优先从对象缓存读取，未命中回源数据库并回填
 * 4. 令牌无效、用户不存在或已停用时返回 401
 */

use crate::cache::{CacheResult, ObjectCache};
use crate::middlewares::create_error_response;
use crate::models::ErrorCode;
use crate::models::users::entities::{User, UserRole, UserStatus};
use crate::storage::Storage;
use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, HttpRequest, web,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::{rc::Rc, sync::Arc};
use tracing::info;

const BEARER_PREFIX: &str = "Bearer ";
const AUTHORIZATION_HEADER: &str = "Authorization";

#[derive(Clone)]
pub struct RequireJWT;

impl RequireJWT {
    /// 从请求扩展中提取完整用户信息（必须在本中间件之后调用）
    pub fn extract_user_claims(req: &HttpRequest) -> Option<User> {
        req.extensions().get::<User>().cloned()
    }

    /// 只提取用户 ID
    pub fn extract_user_id(req: &HttpRequest) -> Option<i64> {
        req.extensions().get::<User>().map(|u| u.id)
    }

    /// 当前用户是否为站点管理员
    pub fn is_admin(req: &HttpRequest) -> bool {
        req.extensions()
            .get::<User>()
            .is_some_and(|u| u.role == UserRole::Admin)
    }
}

// 辅助函数：提取并验证 JWT access token，解析出用户行
async fn extract_and_validate_jwt(req: &ServiceRequest) -> Result<User, String> {
    let token = req
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
        .ok_or_else(|| "Missing or invalid Authorization header".to_string())?;

    let claims = crate::utils::jwt::JwtUtils::verify_access_token(token).map_err(|err| {
        info!("JWT token validation failed: {}", err);
        "Invalid JWT token".to_string()
    })?;

    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| "Invalid JWT subject".to_string())?;

    let cache = req
        .app_data::<web::Data<Arc<dyn ObjectCache>>>()
        .map(|c| c.get_ref().clone());

    // 缓存命中直接返回
    let cache_key = format!("user:{user_id}");
    if let Some(ref cache) = cache
        && let CacheResult::Found(user) = cache.get_object::<User>(&cache_key).await
    {
        return validate_user_status(user);
    }

    let storage = req
        .app_data::<web::Data<Arc<dyn Storage>>>()
        .ok_or_else(|| "Storage not configured".to_string())?
        .get_ref()
        .clone();

    let user = storage
        .get_user_by_id(user_id)
        .await
        .map_err(|e| format!("Failed to load user: {e}"))?
        .ok_or_else(|| "User not found".to_string())?;

    if let Some(cache) = cache {
        cache.insert_object(cache_key, &user, 0).await;
    }

    validate_user_status(user)
}

fn validate_user_status(user: User) -> Result<User, String> {
    if user.status != UserStatus::Active {
        return Err("Account is suspended".to_string());
    }
    Ok(user)
}

impl<S, B> Transform<S, ServiceRequest> for RequireJWT
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireJWTMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireJWTMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireJWTMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireJWTMiddleware<S>
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
            match extract_and_validate_jwt(&req).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    let res = srv.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(message) => Ok(req.into_response(
                    create_error_response(
                        StatusCode::UNAUTHORIZED,
                        ErrorCode::Unauthorized,
                        &message,
                    )
                    .map_into_right_body(),
                )),
            }
        })
    }
}
