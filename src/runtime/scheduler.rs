//! 对账任务调度
//!
//! 单个 tokio 任务驱动固定间隔的扫描循环：每轮 `run()` 完整结束后
//! 才等待下一个 tick，天然保证同一时刻至多一次扫描在执行。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::config::AppConfig;
use crate::lifecycle::ReconcileJob;

// 防止配置错误导致的忙循环
const MIN_INTERVAL_SECS: u64 = 60;

/// 启动对账循环（配置关闭时返回 None）
pub fn spawn_reconcile_loop(job: Arc<ReconcileJob>) -> Option<JoinHandle<()>> {
    let config = AppConfig::get();
    if !config.reconcile.enabled {
        warn!("Reconcile loop disabled by configuration");
        return None;
    }

    let interval_secs = config.reconcile.interval_secs.max(MIN_INTERVAL_SECS);
    warn!("Reconcile loop started, interval {}s", interval_secs);

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            job.run().await;
        }
    }))
}
