use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::enrolments::entities::EnrolmentRole;

// 过期处理动作
//
// 待审提交超过实例的 expiry_threshold_days 后，由对账任务执行的动作。
#[derive(Debug, Clone, Copy, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/instance.ts")]
pub enum ExpiryAction {
    None,    // 不处理
    Approve, // 自动通过
    Reject,  // 自动驳回
}

impl ExpiryAction {
    pub const NONE: &'static str = "none";
    pub const APPROVE: &'static str = "approve";
    pub const REJECT: &'static str = "reject";
}

impl<'de> Deserialize<'de> for ExpiryAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            ExpiryAction::NONE => Ok(ExpiryAction::None),
            ExpiryAction::APPROVE => Ok(ExpiryAction::Approve),
            ExpiryAction::REJECT => Ok(ExpiryAction::Reject),
            _ => Err(serde::de::Error::custom(format!(
                "无效的过期动作: '{s}'. 支持的动作: none, approve, reject"
            ))),
        }
    }
}

impl std::fmt::Display for ExpiryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryAction::None => write!(f, "{}", ExpiryAction::NONE),
            ExpiryAction::Approve => write!(f, "{}", ExpiryAction::APPROVE),
            ExpiryAction::Reject => write!(f, "{}", ExpiryAction::REJECT),
        }
    }
}

impl std::str::FromStr for ExpiryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ExpiryAction::None),
            "approve" => Ok(ExpiryAction::Approve),
            "reject" => Ok(ExpiryAction::Reject),
            _ => Err(format!("Invalid expiry action: {s}")),
        }
    }
}

// 提醒接收人策略
#[derive(Debug, Clone, Copy, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/instance.ts")]
pub enum ReminderRecipients {
    Managers, // 课程管理员
    Specific, // 实例配置的指定用户
    Both,     // 两者都发
}

impl ReminderRecipients {
    pub const MANAGERS: &'static str = "managers";
    pub const SPECIFIC: &'static str = "specific";
    pub const BOTH: &'static str = "both";
}

impl<'de> Deserialize<'de> for ReminderRecipients {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            ReminderRecipients::MANAGERS => Ok(ReminderRecipients::Managers),
            ReminderRecipients::SPECIFIC => Ok(ReminderRecipients::Specific),
            ReminderRecipients::BOTH => Ok(ReminderRecipients::Both),
            _ => Err(serde::de::Error::custom(format!(
                "无效的提醒接收人策略: '{s}'. 支持: managers, specific, both"
            ))),
        }
    }
}

impl std::fmt::Display for ReminderRecipients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderRecipients::Managers => write!(f, "{}", ReminderRecipients::MANAGERS),
            ReminderRecipients::Specific => write!(f, "{}", ReminderRecipients::SPECIFIC),
            ReminderRecipients::Both => write!(f, "{}", ReminderRecipients::BOTH),
        }
    }
}

impl std::str::FromStr for ReminderRecipients {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "managers" => Ok(ReminderRecipients::Managers),
            "specific" => Ok(ReminderRecipients::Specific),
            "both" => Ok(ReminderRecipients::Both),
            _ => Err(format!("Invalid reminder recipients: {s}")),
        }
    }
}

// 付款凭证报名实例（每门课程一条策略配置）
//
// 生命周期引擎与对账任务只读，不回写。
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/instance.ts")]
pub struct EnrolInstance {
    pub id: i64,
    pub course_id: i64,
    pub enabled: bool,
    // 审核通过后分配的角色
    pub role: EnrolmentRole,
    // 选课时长（秒，0 = 不限期）
    pub enrol_period_secs: i64,
    // 过期阈值（天，0 = 关闭过期处理）
    pub expiry_threshold_days: i64,
    pub expiry_action: ExpiryAction,
    // 对账任务无条件批准本实例下的全部待审提交
    pub auto_approve_all: bool,
    // 提交/审核结果是否发送通知
    pub notify_on_submission: bool,
    // 提醒配置
    pub reminder_enabled: bool,
    pub reminder_threshold_hours: i64,
    pub reminder_recipients: ReminderRecipients,
    // 指定接收人（逗号分隔的用户 ID）
    pub specific_recipient_ids: Option<String>,
    // 付款说明（展示给上传者）
    pub payment_instructions: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl EnrolInstance {
    /// 解析实例配置的指定接收人 ID 列表，忽略非数字片段
    pub fn parse_specific_recipients(&self) -> Vec<i64> {
        self.specific_recipient_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_with_recipients(ids: Option<&str>) -> EnrolInstance {
        EnrolInstance {
            id: 1,
            course_id: 1,
            enabled: true,
            role: EnrolmentRole::Student,
            enrol_period_secs: 0,
            expiry_threshold_days: 0,
            expiry_action: ExpiryAction::None,
            auto_approve_all: false,
            notify_on_submission: true,
            reminder_enabled: false,
            reminder_threshold_hours: 24,
            reminder_recipients: ReminderRecipients::Managers,
            specific_recipient_ids: ids.map(|s| s.to_string()),
            payment_instructions: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_parse_specific_recipients() {
        let instance = instance_with_recipients(Some("3, 7,abc, 12"));
        assert_eq!(instance.parse_specific_recipients(), vec![3, 7, 12]);
    }

    #[test]
    fn test_parse_specific_recipients_empty() {
        assert!(
            instance_with_recipients(None)
                .parse_specific_recipients()
                .is_empty()
        );
        assert!(
            instance_with_recipients(Some(""))
                .parse_specific_recipients()
                .is_empty()
        );
    }
}
