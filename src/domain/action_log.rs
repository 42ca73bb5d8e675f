// ==========================================
// 血库管理系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入操作必须留痕 (可解释性)
// 用途: 审计追踪 (谁在何时对哪个请求/献血者做了什么)
// 对齐: action_log 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    // ===== 主键 =====
    pub action_id: String,
    pub action_type: String, // 操作类型 (存储为字符串)
    pub action_ts: DateTime<Utc>,
    pub actor: String, // 操作人 (临床医生/检验技师/血库管理员)

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)

    // ===== 扩展字段 =====
    pub detail: Option<String>, // 详细描述/操作原因
}

impl ActionLog {
    /// 构造一条操作日志
    pub fn new(
        action_type: &str,
        actor: &str,
        payload: Option<JsonValue>,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            action_ts: now,
            actor: actor.to_string(),
            payload_json: payload,
            detail,
        }
    }
}

// ==========================================
// ActionType - 操作类型常量
// ==========================================
pub mod action_types {
    pub const SUBMIT_REQUEST: &str = "SUBMIT_REQUEST";
    pub const CROSS_MATCH: &str = "CROSS_MATCH";
    pub const ISSUE_BLOOD: &str = "ISSUE_BLOOD";
    pub const CANCEL_REQUEST: &str = "CANCEL_REQUEST";
    pub const REGISTER_DONOR: &str = "REGISTER_DONOR";
    pub const RECORD_DONATION: &str = "RECORD_DONATION";
    pub const SET_DEFERRED: &str = "SET_DEFERRED";
    pub const DEACTIVATE_DONOR: &str = "DEACTIVATE_DONOR";
    pub const SWEEP_EXPIRATIONS: &str = "SWEEP_EXPIRATIONS";
}
