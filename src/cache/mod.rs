//! 缓存层
//!
//! 可插拔的对象缓存（Moka 内存 / Redis），构造函数在进程启动时
//! 通过 `declare_object_cache_plugin!` 注册，按配置选择后端。
//! 目前用于 JWT 中间件的用户行缓存。

pub mod object_cache;
pub mod register;
pub mod traits;

pub use traits::{CacheResult, ObjectCache};

/// 注册缓存后端构造函数
///
/// 在后端实现文件顶部调用一次，进程启动时（ctor）写入注册表。
#[macro_export]
macro_rules! declare_object_cache_plugin {
    ($name:literal, $ty:ty) => {
        #[ctor::ctor]
        fn __register_object_cache_plugin() {
            $crate::cache::register::register_object_cache_plugin(
                $name,
                std::sync::Arc::new(|| {
                    Box::pin(async {
                        let cache = <$ty>::new()
                            .map_err($crate::errors::PayProofError::cache_connection)?;
                        Ok(Box::new(cache) as Box<dyn $crate::cache::ObjectCache>)
                    })
                }),
            );
        }
    };
}
