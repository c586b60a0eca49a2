//! 提交生命周期核心
//!
//! - `engine`: 状态机与副作用编排（提交 / 审核 / 批量 / 删除）
//! - `gateways`: 选课与通知边界
//! - `reconcile`: 周期性对账任务（过期处理、自动批准、聚合提醒）
//!
//! 所有操作都接收显式的执行者 ID，不依赖任何环境态身份；
//! 调用方负责权限校验，引擎只裁决状态转换的合法性。

pub mod engine;
pub mod gateways;
pub mod reconcile;

pub use engine::LifecycleEngine;
pub use gateways::{EnrolmentGateway, NotificationGateway};
pub use reconcile::ReconcileJob;

pub use crate::models::submissions::entities::SYSTEM_REVIEWER_ID;
