// ==========================================
// 血库管理系统 - 待办队列优先级
// ==========================================
// 口径: 紧急等级降序 → 提交时间升序 (先到先处理) → 请求ID
// 说明: 只影响人工处理顺序, 不做自动分配
// ==========================================

use crate::domain::request::TransfusionRequest;
use std::cmp::Ordering;

/// 待办队列排序器
pub struct PrioritySorter;

impl PrioritySorter {
    /// 比较两个请求的处理优先级
    pub fn compare(a: &TransfusionRequest, b: &TransfusionRequest) -> Ordering {
        b.urgency
            .cmp(&a.urgency)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.request_id.cmp(&b.request_id))
    }

    /// 按优先级原地排序 (稳定排序)
    pub fn sort(requests: &mut [TransfusionRequest]) {
        requests.sort_by(Self::compare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BloodComponent, BloodType, RequestStatus, Urgency};
    use chrono::{Duration, Utc};

    fn request(id: &str, urgency: Urgency, minutes_ago: i64) -> TransfusionRequest {
        let submitted = Utc::now() - Duration::minutes(minutes_ago);
        TransfusionRequest {
            request_id: id.to_string(),
            patient_id: "P001".to_string(),
            blood_type: BloodType::APos,
            component: BloodComponent::PackedRbc,
            units_requested: 1,
            urgency,
            indication: None,
            status: RequestStatus::Pending,
            submitted_at: submitted,
            cross_matched_at: None,
            issued_at: None,
            cancelled_at: None,
            escalated_at: None,
            updated_at: submitted,
        }
    }

    #[test]
    fn test_emergency_first() {
        let mut queue = vec![
            request("R1", Urgency::Routine, 120),
            request("R2", Urgency::Emergency, 5),
            request("R3", Urgency::Urgent, 60),
        ];
        PrioritySorter::sort(&mut queue);
        let ids: Vec<&str> = queue.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["R2", "R3", "R1"]);
    }

    #[test]
    fn test_same_urgency_fifo() {
        // 同级按提交时间先到先处理, 不受提交顺序影响
        let mut queue = vec![
            request("R1", Urgency::Urgent, 10),
            request("R2", Urgency::Urgent, 30),
        ];
        PrioritySorter::sort(&mut queue);
        let ids: Vec<&str> = queue.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["R2", "R1"]);
    }
}
