use serde::{Deserialize, Serialize};
use ts_rs::TS;

// 选课角色（课程内角色）
//
// 审核通过后按实例配置分配；manager 同时承担提交审核职责。
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/enrolment.ts")]
pub enum EnrolmentRole {
    Student, // 学员
    Manager, // 课程管理员（可审核付款凭证）
}

impl EnrolmentRole {
    pub const STUDENT: &'static str = "student";
    pub const MANAGER: &'static str = "manager";
}

impl<'de> Deserialize<'de> for EnrolmentRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            EnrolmentRole::STUDENT => Ok(EnrolmentRole::Student),
            EnrolmentRole::MANAGER => Ok(EnrolmentRole::Manager),
            _ => Err(serde::de::Error::custom(format!(
                "无效的选课角色: '{s}'. 支持的角色: student, manager"
            ))),
        }
    }
}

impl std::fmt::Display for EnrolmentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrolmentRole::Student => write!(f, "{}", EnrolmentRole::STUDENT),
            EnrolmentRole::Manager => write!(f, "{}", EnrolmentRole::MANAGER),
        }
    }
}

impl std::str::FromStr for EnrolmentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(EnrolmentRole::Student),
            "manager" => Ok(EnrolmentRole::Manager),
            _ => Err(format!("Invalid enrolment role: {s}")),
        }
    }
}

// 选课状态
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/enrolment.ts")]
pub enum EnrolmentStatus {
    Active,    // 生效
    Suspended, // 暂停
}

impl<'de> Deserialize<'de> for EnrolmentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "active" => Ok(EnrolmentStatus::Active),
            "suspended" => Ok(EnrolmentStatus::Suspended),
            _ => Err(serde::de::Error::custom(format!(
                "无效的选课状态: '{s}'. 支持的状态: active, suspended"
            ))),
        }
    }
}

impl std::fmt::Display for EnrolmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrolmentStatus::Active => write!(f, "active"),
            EnrolmentStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for EnrolmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrolmentStatus::Active),
            "suspended" => Ok(EnrolmentStatus::Suspended),
            _ => Err(format!("Invalid enrolment status: {s}")),
        }
    }
}

// 选课记录
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/enrolment.ts")]
pub struct Enrolment {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub role: EnrolmentRole,
    pub status: EnrolmentStatus,
    // 生效时间
    pub time_start: chrono::DateTime<chrono::Utc>,
    // 到期时间（None = 不限期）
    pub time_end: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
