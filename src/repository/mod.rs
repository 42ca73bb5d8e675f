// ==========================================
// 血库管理系统 - 仓储层模块
// ==========================================
// 红线: Repository 不含业务判断 (状态机迁移表来自 domain);
//       跨表写入必须在单个 SQLite 事务中完成
// ==========================================

pub mod action_log_repo;
pub mod donor_repo;
pub mod error;
pub mod fulfillment_repo;
pub mod inventory_repo;
pub mod request_repo;
pub mod reservation_repo;

pub use action_log_repo::ActionLogRepository;
pub use donor_repo::DonorRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use fulfillment_repo::FulfillmentRepository;
pub use inventory_repo::{InventoryRepository, SweepReport};
pub use request_repo::{RequestFilter, RequestRepository};
pub use reservation_repo::ReservationRepository;

/// 行映射中枚举列解析失败时的统一错误
///
/// 说明: rusqlite 的 row 闭包只能返回 rusqlite::Error,
/// 这里把非法枚举值包装为列转换失败, 由外层 From 转为仓储错误。
pub(crate) fn enum_column_error(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("非法枚举值: {}", value).into(),
    )
}
