// ==========================================
// 血库管理系统 - 输血请求领域模型
// ==========================================
// 红线1: 未交叉配血禁止发血
// 红线3: 终态 (ISSUED/CANCELLED) 后禁止任何状态变更
// 对齐: transfusion_requests 表
// ==========================================

use crate::domain::types::{BloodComponent, BloodType, RequestStatus, Urgency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// TransfusionRequest - 输血请求
// ==========================================
// 状态仅允许通过 RequestLifecycle 定义的迁移变更;
// 履约协调器不得绕过状态机直接写 status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransfusionRequest {
    // ===== 主键与关联 =====
    pub request_id: String,
    pub patient_id: String,

    // ===== 请求内容 =====
    pub blood_type: BloodType,
    pub component: BloodComponent,
    pub units_requested: i64, // 正整数; 不支持部分发血 (无 units_issued 字段)
    pub urgency: Urgency,
    pub indication: Option<String>, // 输血指征（可解释性）

    // ===== 状态机 =====
    pub status: RequestStatus,

    // ===== 时间线 =====
    pub submitted_at: DateTime<Utc>,
    pub cross_matched_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>, // 升级通知时间（每个请求最多升级一次）

    // ===== 审计字段 =====
    pub updated_at: DateTime<Utc>,
}

impl TransfusionRequest {
    /// 是否已完成交叉配血（兼容前端 crossMatched 布尔口径）
    pub fn cross_matched(&self) -> bool {
        self.status.is_cross_matched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(status: RequestStatus) -> TransfusionRequest {
        TransfusionRequest {
            request_id: "R001".to_string(),
            patient_id: "P001".to_string(),
            blood_type: BloodType::APos,
            component: BloodComponent::PackedRbc,
            units_requested: 2,
            urgency: Urgency::Routine,
            indication: None,
            status,
            submitted_at: Utc::now(),
            cross_matched_at: None,
            issued_at: None,
            cancelled_at: None,
            escalated_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cross_matched_derived_from_status() {
        assert!(!sample_request(RequestStatus::Pending).cross_matched());
        assert!(sample_request(RequestStatus::CrossMatched).cross_matched());
        assert!(sample_request(RequestStatus::Issued).cross_matched());
    }
}
