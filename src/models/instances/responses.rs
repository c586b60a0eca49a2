use serde::Serialize;
use ts_rs::TS;

use crate::models::instances::entities::{ExpiryAction, ReminderRecipients};

/// 面向上传页的实例信息（隐藏与上传者无关的策略细节）
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/instance.ts")]
pub struct InstancePublicResponse {
    pub id: i64,
    pub course_id: i64,
    pub enabled: bool,
    pub payment_instructions: Option<String>,
    pub allowed_file_types: Vec<String>,
    pub max_file_size: usize,
}

/// 面向管理端的完整实例配置
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/instance.ts")]
pub struct InstanceDetailResponse {
    pub id: i64,
    pub course_id: i64,
    pub enabled: bool,
    pub role: String,
    pub enrol_period_secs: i64,
    pub expiry_threshold_days: i64,
    pub expiry_action: ExpiryAction,
    pub auto_approve_all: bool,
    pub notify_on_submission: bool,
    pub reminder_enabled: bool,
    pub reminder_threshold_hours: i64,
    pub reminder_recipients: ReminderRecipients,
    pub specific_recipient_ids: Option<String>,
    pub payment_instructions: Option<String>,
}
