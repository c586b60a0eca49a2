/*!
 * 速率限制中间件
 *
 * 限制请求频率，防止凭证上传被刷。
 *
 * ## 使用方法
 *
 * ```rust,ignore
 * web::scope("/api/v1/submissions")
 *     .wrap(RateLimit::upload())
 *     .route("", web::post().to(create_submission))
 * ```
 *
 * ## 限制规则
 *
 * - 以客户端 IP 作为限制键
 * - 超过限制返回 429 Too Many Requests
 */

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::rc::Rc;
use std::time::Duration;
use tracing::warn;

use crate::middlewares::create_error_response;
use crate::models::ErrorCode;

/// 全局速率限制缓存
/// 键: 前缀:IP，值: 窗口内请求计数（随 TTL 过期清零）
static RATE_LIMIT_CACHE: Lazy<Cache<String, u32>> = Lazy::new(|| {
    Cache::builder()
        .time_to_live(Duration::from_secs(60)) // 1分钟窗口
        .max_capacity(100_000)
        .build()
});

/// 速率限制配置
#[derive(Clone)]
pub struct RateLimit {
    /// 时间窗口内允许的最大请求数
    max_requests: u32,
    /// 限制键前缀（用于区分不同端点）
    key_prefix: String,
}

impl RateLimit {
    /// 创建新的速率限制器（窗口固定为 1 分钟）
    pub fn new(max_requests: u32) -> Self {
        Self {
            max_requests,
            key_prefix: String::new(),
        }
    }

    /// 设置限制键前缀
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    /// 凭证上传限制：10次/分钟/IP
    pub fn upload() -> Self {
        Self::new(10).with_prefix("upload")
    }

    /// 通用 API 限制：100次/分钟/IP
    pub fn api() -> Self {
        Self::new(100).with_prefix("api")
    }
}

/// 从请求中提取客户端 IP
///
/// 部署在反向代理后面时需要在代理侧配置正确的转发头；
/// 无法取得有效 IP 时退回到 "unknown" 键（共享配额）。
fn extract_client_ip(req: &ServiceRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(|s| s.to_string())
        .filter(|ip| is_valid_ip(ip))
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_valid_ip(ip: &str) -> bool {
    // realip_remote_addr 可能带端口，剥掉再解析
    let host = ip.rsplit_once(':').map(|(h, _)| h).unwrap_or(ip);
    host.parse::<std::net::IpAddr>().is_ok() || ip.parse::<std::net::IpAddr>().is_ok()
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            max_requests: self.max_requests,
            key_prefix: self.key_prefix.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    max_requests: u32,
    key_prefix: String,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
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
        let max_requests = self.max_requests;
        let key = format!("{}:{}", self.key_prefix, extract_client_ip(&req));

        Box::pin(async move {
            let count = RATE_LIMIT_CACHE.get(&key).await.unwrap_or(0);

            if count >= max_requests {
                warn!("Rate limit exceeded for {}", key);
                return Ok(req.into_response(
                    create_error_response(
                        StatusCode::TOO_MANY_REQUESTS,
                        ErrorCode::RateLimitExceeded,
                        "请求过于频繁，请稍后再试",
                    )
                    .map_into_right_body(),
                ));
            }

            RATE_LIMIT_CACHE.insert(key, count + 1).await;

            let res = srv.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_presets() {
        let upload = RateLimit::upload();
        assert_eq!(upload.max_requests, 10);
        assert_eq!(upload.key_prefix, "upload");

        let api = RateLimit::api();
        assert_eq!(api.max_requests, 100);
        assert_eq!(api.key_prefix, "api");
    }

    #[test]
    fn test_is_valid_ip() {
        assert!(is_valid_ip("192.168.1.1"));
        assert!(is_valid_ip("192.168.1.1:8080"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("not-an-ip"));
    }
}
