// ==========================================
// 血库管理系统 - 请求状态机
// ==========================================
// 红线1: 未交叉配血禁止发血
// 红线3: 终态 (ISSUED/CANCELLED) 不可变更
// 状态机: PENDING → CROSS_MATCHED → ISSUED
//                 ↘ CANCELLED    ↙
// ==========================================

use crate::domain::types::RequestStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 请求状态机
///
/// 迁移表的唯一口径在 RequestStatus::can_transition_to,
/// 这里提供引擎层的校验入口与可达状态查询 (供界面置灰)
pub struct RequestLifecycle;

impl RequestLifecycle {
    /// 校验一次状态迁移
    ///
    /// # 返回
    /// - Ok(()): 迁移合法
    /// - Err(InvalidStateTransition): 迁移非法 (含终态变更与跳步发血)
    pub fn validate(from: RequestStatus, to: RequestStatus) -> RepositoryResult<()> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// 列出当前状态的全部可达状态
    pub fn allowed_transitions(from: RequestStatus) -> Vec<RequestStatus> {
        [
            RequestStatus::Pending,
            RequestStatus::CrossMatched,
            RequestStatus::Issued,
            RequestStatus::Cancelled,
        ]
        .into_iter()
        .filter(|to| from.can_transition_to(*to))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_legal_path() {
        assert!(RequestLifecycle::validate(RequestStatus::Pending, RequestStatus::CrossMatched).is_ok());
        assert!(RequestLifecycle::validate(RequestStatus::CrossMatched, RequestStatus::Issued).is_ok());
    }

    #[test]
    fn test_validate_skip_cross_match_rejected() {
        // 红线1: PENDING 直接发血必须被拒绝
        let err = RequestLifecycle::validate(RequestStatus::Pending, RequestStatus::Issued);
        assert!(matches!(
            err,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        assert!(RequestLifecycle::allowed_transitions(RequestStatus::Issued).is_empty());
        assert!(RequestLifecycle::allowed_transitions(RequestStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_pending_transitions() {
        let allowed = RequestLifecycle::allowed_transitions(RequestStatus::Pending);
        assert_eq!(
            allowed,
            vec![RequestStatus::CrossMatched, RequestStatus::Cancelled]
        );
    }
}
