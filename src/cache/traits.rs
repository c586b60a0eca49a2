use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 缓存查询结果
pub enum CacheResult<T> {
    Found(T),
    NotFound,
    // 键存在但取值失败（连接错误、反序列化失败等），调用方应回源
    ExistsButNoValue,
}

/// 对象缓存接口
///
/// 后端只处理字符串，类型化存取经由下方的序列化辅助方法。
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get_raw(&self, key: &str) -> CacheResult<String>;
    // ttl 单位秒，0 = 使用后端默认 TTL
    async fn insert_raw(&self, key: String, value: String, ttl: u64);
    async fn remove(&self, key: &str);
    async fn invalidate_all(&self);
}

impl dyn ObjectCache {
    /// 类型化读取（JSON 反序列化失败视为取值失败）
    pub async fn get_object<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        match self.get_raw(key).await {
            CacheResult::Found(raw) => match serde_json::from_str(&raw) {
                Ok(value) => CacheResult::Found(value),
                Err(_) => CacheResult::ExistsButNoValue,
            },
            CacheResult::NotFound => CacheResult::NotFound,
            CacheResult::ExistsButNoValue => CacheResult::ExistsButNoValue,
        }
    }

    /// 类型化写入（序列化失败时静默放弃，缓存永远是尽力而为）
    pub async fn insert_object<T: Serialize>(&self, key: String, value: &T, ttl: u64) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.insert_raw(key, raw, ttl).await;
        }
    }
}
