// ==========================================
// 血库管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 红线合规: 可解释性 (所有错误信息必须包含显式原因)
// 说明: code() 返回稳定错误码, 供前端/调用方按码分支, 不解析消息文本
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 红线违反错误
    // ==========================================
    /// 红线2: 库存不可透支
    #[error("库存不足: {key} 请求{requested}单位, 可用{available}单位")]
    InsufficientStock {
        key: String,
        requested: i64,
        available: i64,
    },

    /// 红线1/红线3: 状态机违反 (含未配血发血与终态变更)
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 预约泄漏防护: 无未决预约时发血
    #[error("预约不存在或已消费: request_id={request_id}")]
    UnknownReservation { request_id: String },

    /// 预约单位被过期清扫判废后发血
    #[error("预约单位已过期判废: reservation_id={reservation_id}")]
    ReservedUnitExpired { reservation_id: String },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    /// 献血者当前不合格 (原因见 reasons)
    #[error("献血者不合格: donor_id={donor_id}, 原因: {}", reasons.join("; "))]
    NotEligible {
        donor_id: String,
        reasons: Vec<String>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码 (调用方按码分支, 不解析消息文本)
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ApiError::InvalidStateTransition { .. } => "INVALID_TRANSITION",
            ApiError::UnknownReservation { .. } => "UNKNOWN_RESERVATION",
            ApiError::ReservedUnitExpired { .. } => "RESERVED_UNIT_EXPIRED",
            ApiError::InvalidInput(_) => "INVALID_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "INVALID_REQUEST",
            ApiError::NotEligible { .. } => "NOT_ELIGIBLE",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DB_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 红线错误原样透传 (错误码稳定)
            RepositoryError::InsufficientStock {
                key,
                requested,
                available,
            } => ApiError::InsufficientStock {
                key,
                requested,
                available,
            },
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::UnknownReservation { request_id } => {
                ApiError::UnknownReservation { request_id }
            }
            RepositoryError::ReservedUnitExpired { reservation_id } => {
                ApiError::ReservedUnitExpired { reservation_id }
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_line_errors_keep_stable_codes() {
        let err: ApiError = RepositoryError::InsufficientStock {
            key: "O-/PACKED_RBC".to_string(),
            requested: 4,
            available: 2,
        }
        .into();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err: ApiError = RepositoryError::InvalidStateTransition {
            from: "PENDING".to_string(),
            to: "ISSUED".to_string(),
        }
        .into();
        assert_eq!(err.code(), "INVALID_TRANSITION");

        let err: ApiError = RepositoryError::ReservedUnitExpired {
            reservation_id: "RS001".to_string(),
        }
        .into();
        assert_eq!(err.code(), "RESERVED_UNIT_EXPIRED");
    }

    #[test]
    fn test_not_found_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "TransfusionRequest".to_string(),
            id: "R001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        assert_eq!(api_err.code(), "NOT_FOUND");
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("TransfusionRequest"));
                assert!(msg.contains("R001"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_validation_error_is_invalid_request() {
        let err: ApiError = RepositoryError::ValidationError("请求单位数必须为正: 0".to_string()).into();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }
}
