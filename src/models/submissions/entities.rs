use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// 自动转换（过期处理、全量自动批准）使用的保留审核人 ID。
///
/// 人工审核永远携带真实用户 ID，导出数据中两者可区分。
pub const SYSTEM_REVIEWER_ID: i64 = 0;

// 提交状态
//
// pending 为初始态，approved / rejected 为终态，不允许回退。
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub enum SubmissionStatus {
    Pending,  // 待审核
    Approved, // 已通过
    Rejected, // 已驳回
}

impl SubmissionStatus {
    pub const PENDING: &'static str = "pending";
    pub const APPROVED: &'static str = "approved";
    pub const REJECTED: &'static str = "rejected";

    /// 是否为终态
    pub fn is_final(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

impl<'de> Deserialize<'de> for SubmissionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            SubmissionStatus::PENDING => Ok(SubmissionStatus::Pending),
            SubmissionStatus::APPROVED => Ok(SubmissionStatus::Approved),
            SubmissionStatus::REJECTED => Ok(SubmissionStatus::Rejected),
            _ => Err(serde::de::Error::custom(format!(
                "无效的提交状态: '{s}'. 支持的状态: pending, approved, rejected"
            ))),
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "{}", SubmissionStatus::PENDING),
            SubmissionStatus::Approved => write!(f, "{}", SubmissionStatus::APPROVED),
            SubmissionStatus::Rejected => write!(f, "{}", SubmissionStatus::REJECTED),
        }
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            _ => Err(format!("Invalid submission status: {s}")),
        }
    }
}

// 付款方式
#[derive(Debug, Clone, Copy, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub enum PaymentMethod {
    Bank,   // 银行转账
    Cash,   // 现金
    Check,  // 支票
    Credit, // 信用卡
    Other,  // 其他
}

impl PaymentMethod {
    pub const BANK: &'static str = "bank";
    pub const CASH: &'static str = "cash";
    pub const CHECK: &'static str = "check";
    pub const CREDIT: &'static str = "credit";
    pub const OTHER: &'static str = "other";
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| {
                serde::de::Error::custom(format!(
                    "无效的付款方式: '{s}'. 支持: bank, cash, check, credit, other"
                ))
            })
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Bank => write!(f, "{}", PaymentMethod::BANK),
            PaymentMethod::Cash => write!(f, "{}", PaymentMethod::CASH),
            PaymentMethod::Check => write!(f, "{}", PaymentMethod::CHECK),
            PaymentMethod::Credit => write!(f, "{}", PaymentMethod::CREDIT),
            PaymentMethod::Other => write!(f, "{}", PaymentMethod::OTHER),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(PaymentMethod::Bank),
            "cash" => Ok(PaymentMethod::Cash),
            "check" => Ok(PaymentMethod::Check),
            "credit" => Ok(PaymentMethod::Credit),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(format!("Invalid payment method: {s}")),
        }
    }
}

// 审核决定（pending → approved / rejected）
#[derive(Debug, Clone, Copy, Serialize, PartialEq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    /// 决定对应的终态
    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            ReviewDecision::Approved => SubmissionStatus::Approved,
            ReviewDecision::Rejected => SubmissionStatus::Rejected,
        }
    }
}

impl<'de> Deserialize<'de> for ReviewDecision {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "approved" => Ok(ReviewDecision::Approved),
            "rejected" => Ok(ReviewDecision::Rejected),
            _ => Err(serde::de::Error::custom(format!(
                "无效的审核决定: '{s}'. 支持: approved, rejected"
            ))),
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target_status())
    }
}

/// 上传时携带的付款元数据
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub amount: f64,
    pub date: chrono::DateTime<chrono::Utc>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// 新提交写入参数（由生命周期引擎组装）
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub course_id: i64,
    pub instance_id: i64,
    pub user_id: i64,
    pub details: PaymentDetails,
    pub file_token: String,
}

// 付款凭证提交
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct Submission {
    pub id: i64,
    pub course_id: i64,
    pub instance_id: i64,
    pub user_id: i64,
    pub payment_method: PaymentMethod,
    pub payment_amount: f64,
    pub payment_date: chrono::DateTime<chrono::Utc>,
    pub payment_ref: Option<String>,
    pub notes: Option<String>,
    // 凭证附件句柄（提交创建时写入，随提交删除）
    pub file_token: String,
    pub status: SubmissionStatus,
    // 审核元数据：pending → 终态时一次性写入
    pub reviewer_id: Option<i64>,
    pub feedback: Option<String>,
    pub time_reviewed: Option<chrono::DateTime<chrono::Utc>>,
    // 最近一次提醒批次包含本提交的时间
    pub time_reminder: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Submission {
    /// 是否由自动转换（对账任务）定稿
    pub fn is_system_reviewed(&self) -> bool {
        self.reviewer_id == Some(SYSTEM_REVIEWER_ID)
    }
}
