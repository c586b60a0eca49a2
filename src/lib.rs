//! PayProof - 付款凭证报名服务
//!
//! 基于 Actix Web 的付款凭证审核与选课服务：学员上传付款凭证，
//! 课程管理员审核，审核通过自动选课；后台对账任务处理过期提交、
//! 自动批准与聚合提醒。
//!
//! # 架构
//! - `cache`: 缓存层（Moka/Redis）
//! - `config`: 配置管理
//! - `entity`: SeaORM 数据库实体
//! - `errors`: 统一错误处理
//! - `lifecycle`: 提交生命周期引擎、网关与对账任务
//! - `middlewares`: 认证授权中间件
//! - `models`: 数据模型定义
//! - `routes`: API 路由层
//! - `runtime`: 运行时生命周期管理
//! - `services`: 业务逻辑层
//! - `storage`: 数据存储层（SeaORM）
//! - `utils`: 工具函数

pub mod cache;
pub mod config;
pub mod entity;
pub mod errors;
pub mod lifecycle;
pub mod middlewares;
pub mod models;
pub mod routes;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod utils;
